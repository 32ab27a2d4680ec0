//! Turns a [`Message`] into the transactions sent over the wire.
//!
//! A message without merge data becomes a single transaction addressed to
//! every recipient. A merge message becomes one transaction per recipient,
//! each carrying that recipient's expanded content.

use bytes::{BufMut, Bytes, BytesMut};

use super::command::MailParams;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::recipient::Recipient;
use crate::types::{Address, Notify};

/// Header carrying the virtual MTA name.
pub const VIRTUAL_MTA_HEADER: &str = "x-virtual-mta";
/// Header carrying the job id.
pub const JOB_HEADER: &str = "x-job";

/// Envelope recipient of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeRecipient {
    /// Recipient address.
    pub address: Address,
    /// Delivery status notification flags.
    pub notify: Option<Notify>,
}

impl From<&Recipient> for EnvelopeRecipient {
    fn from(recipient: &Recipient) -> Self {
        Self {
            address: recipient.address().clone(),
            notify: recipient.notify(),
        }
    }
}

/// One `MAIL FROM` .. `DATA` exchange, fully rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Envelope sender.
    pub sender: Address,
    /// `MAIL FROM` parameters.
    pub params: MailParams,
    /// Envelope recipients.
    pub recipients: Vec<EnvelopeRecipient>,
    /// Dot-stuffed DATA payload including the terminating `.` line.
    pub data: Bytes,
}

/// Renders `message` into the transactions to send, in recipient order.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the message has no recipients or no
/// content, or if a header directive or the envelope id cannot be framed.
pub fn plan(message: &Message) -> Result<Vec<Transaction>> {
    if message.recipients().is_empty() {
        return Err(Error::invalid("message has no recipients"));
    }
    if !message.has_content() {
        return Err(Error::invalid("message has no content"));
    }

    let params = mail_params(message)?;
    let headers = header_block(message)?;
    let render = |content: &str| {
        let mut data = String::with_capacity(headers.len() + content.len());
        data.push_str(&headers);
        data.push_str(content);
        frame_data(data.as_bytes()).freeze()
    };

    if message.is_merge() {
        return Ok(message
            .recipients()
            .iter()
            .map(|recipient| Transaction {
                sender: message.sender().clone(),
                params: params.clone(),
                recipients: vec![recipient.into()],
                data: render(&message.content_for(recipient)),
            })
            .collect());
    }

    Ok(vec![Transaction {
        sender: message.sender().clone(),
        params,
        recipients: message.recipients().iter().map(Into::into).collect(),
        data: render(&message.literal_content()),
    }])
}

/// Frames content for DATA: line endings become CRLF, lines starting with
/// `.` are stuffed, and the terminating `.` line is appended.
#[must_use]
pub fn frame_data(content: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(content.len() + content.len() / 32 + 5);

    if !content.is_empty() {
        let body = content.strip_suffix(b"\n").unwrap_or(content);
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                buf.put_u8(b'.');
            }
            buf.put_slice(line);
            buf.put_slice(b"\r\n");
        }
    }

    buf.put_slice(b".\r\n");
    buf
}

fn mail_params(message: &Message) -> Result<MailParams> {
    if let Some(id) = message.envelope_id() {
        // xtext without the escape characters
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_graphic() && b != b'+' && b != b'=') {
            return Err(Error::invalid(format!("envelope id cannot be framed: {id:?}")));
        }
    }

    Ok(MailParams {
        encoding: message.encoding(),
        return_mode: message.return_mode(),
        envelope_id: message.envelope_id().map(str::to_string),
        verp: message.verp(),
    })
}

fn header_block(message: &Message) -> Result<String> {
    let mut block = String::new();
    let mut push = |name: &str, value: &str| -> Result<()> {
        if value.contains(['\r', '\n']) {
            return Err(Error::invalid(format!("{name} contains a line break")));
        }
        block.push_str(name);
        block.push_str(": ");
        block.push_str(value);
        block.push_str("\r\n");
        Ok(())
    };

    if let Some(vmta) = message.virtual_mta() {
        push(VIRTUAL_MTA_HEADER, vmta)?;
    }
    if let Some(job) = message.job_id() {
        push(JOB_HEADER, job)?;
    }
    for header in message.headers() {
        push(&header.name, &header.value)?;
    }

    Ok(block)
}
