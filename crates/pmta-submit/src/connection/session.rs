//! Type-state submission session.
//!
//! ```text
//! from_stream() ──→ Session<Connected> ── ehlo() ──→ Session<Ready>
//!                         ↑                               │
//!                         └────────── starttls() ─────────┤
//!                                                         ├── auth_plain()
//!                                                         ├── transact() (repeatable)
//!                                                         └── quit()
//! ```

use std::marker::PhantomData;
use std::time::Duration;

use base64::Engine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use super::config::Credentials;
use super::outcome::{Rejection, SubmitResult};
use super::stream::MailStream;
use crate::error::{Error, Result, Stage};
use crate::protocol::{Command, Transaction, is_last_reply_line, parse_reply};
use crate::types::{Reply, ReplyCode};

/// Maximum reply line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum number of lines in one multi-line reply.
const MAX_REPLY_LINES: usize = 512;

/// Type-state marker: greeting received, EHLO not yet sent.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: EHLO accepted, transactions may run.
#[derive(Debug)]
pub struct Ready;

/// What the server announced about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from the greeting.
    pub hostname: String,
    /// EHLO capability lines (keyword plus arguments).
    pub capabilities: Vec<String>,
}

impl ServerInfo {
    /// Checks if the server announced a capability keyword (case-insensitive).
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.capabilities.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|k| k.eq_ignore_ascii_case(keyword))
        })
    }
}

/// Submission session over any async byte stream.
#[derive(Debug)]
pub struct Session<S, State> {
    reader: BufReader<S>,
    io_timeout: Duration,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl<S> Session<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerRejected`] if the greeting is not 2xx, or a
    /// transport error if it cannot be read within `io_timeout`.
    pub async fn from_stream(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut session = Self {
            reader: BufReader::new(stream),
            io_timeout,
            server_info: ServerInfo::default(),
            _state: PhantomData,
        };

        let greeting = session.read_reply().await?;
        if !greeting.is_success() {
            return Err(Error::rejected(
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }

        session.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(session)
    }

    /// Sends EHLO and records the announced capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerRejected`] if EHLO is refused.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Session<S, Ready>> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        ensure_success(&reply)?;

        // First line echoes the server name.
        self.server_info.capabilities = reply.message.into_iter().skip(1).collect();
        Ok(self.into_state())
    }
}

impl Session<MailStream, Ready> {
    /// Upgrades the session to TLS; EHLO must be sent again afterwards.
    ///
    /// The handshake is bounded by `handshake_timeout` and reported as
    /// [`Stage::Connect`] when it expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server did not offer STARTTLS, refused it, or
    /// the handshake fails.
    pub async fn starttls(
        mut self,
        host: &str,
        handshake_timeout: Duration,
    ) -> Result<Session<MailStream, Connected>> {
        if !self.server_info.supports("STARTTLS") {
            return Err(Error::Protocol("Server does not offer STARTTLS".into()));
        }

        let reply = self.send_command(&Command::StartTls).await?;
        ensure_success(&reply)?;

        let stream = timeout(
            handshake_timeout,
            self.reader.into_inner().upgrade_to_tls(host),
        )
        .await
        .map_err(|_| Error::Timeout(Stage::Connect))??;
        tracing::debug!(host, "session upgraded to TLS");

        Ok(Session {
            reader: BufReader::new(stream),
            io_timeout: self.io_timeout,
            server_info: ServerInfo {
                hostname: self.server_info.hostname,
                capabilities: Vec::new(),
            },
            _state: PhantomData,
        })
    }
}

impl<S> Session<S, Ready>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Authenticates with `AUTH PLAIN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerRejected`] if the credentials are refused.
    pub async fn auth_plain(&mut self, credentials: &Credentials) -> Result<()> {
        let plain = format!("\0{}\0{}", credentials.name, credentials.password);
        let initial_response = base64::engine::general_purpose::STANDARD.encode(plain.as_bytes());

        let reply = self
            .send_command(&Command::AuthPlain { initial_response })
            .await?;
        ensure_success(&reply)
    }

    /// Runs one transaction and reports which recipients were queued.
    ///
    /// Refusals of the sender, a recipient, DATA or the content are recorded
    /// in the returned result.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the exchange breaks down.
    pub async fn transact(&mut self, tx: &Transaction) -> Result<SubmitResult> {
        let mut result = SubmitResult::default();

        let reply = self
            .send_command(&Command::MailFrom {
                from: tx.sender.clone(),
                params: tx.params.clone(),
            })
            .await?;
        if !reply.is_success() {
            let recipients: Vec<_> = tx.recipients.iter().map(|r| r.address.as_str()).collect();
            self.reject_all(&mut result, &recipients, &reply);
            return Ok(result);
        }

        let mut accepted = Vec::with_capacity(tx.recipients.len());
        for rcpt in &tx.recipients {
            let reply = self
                .send_command(&Command::RcptTo {
                    to: rcpt.address.clone(),
                    notify: rcpt.notify,
                })
                .await?;

            if reply.is_success() {
                accepted.push(rcpt.address.as_str());
            } else {
                tracing::warn!(
                    recipient = %rcpt.address,
                    code = reply.code.as_u16(),
                    text = %reply.message_text(),
                    "recipient rejected"
                );
                result.reject(Rejection::new(rcpt.address.as_str(), &reply));
            }
        }

        if accepted.is_empty() {
            self.send_command(&Command::Rset).await?;
            return Ok(result);
        }

        let reply = self.send_command(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            self.reject_all(&mut result, &accepted, &reply);
            self.send_command(&Command::Rset).await?;
            return Ok(result);
        }

        self.write(&tx.data).await?;
        let ack = self.read_reply().await?;

        if ack.is_success() {
            let queue_id = ack.queue_id();
            tracing::debug!(
                queue_id = queue_id.as_deref(),
                recipients = accepted.len(),
                "transaction acknowledged"
            );
            for recipient in accepted {
                result.accept(recipient, queue_id.clone());
            }
        } else {
            self.reject_all(&mut result, &accepted, &ack);
        }

        Ok(result)
    }

    /// Sends QUIT and closes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT cannot be sent or is refused.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::rejected(reply.code.as_u16(), reply.message_text()));
        }
        Ok(())
    }

    fn reject_all(&self, result: &mut SubmitResult, recipients: &[&str], reply: &Reply) {
        tracing::warn!(
            code = reply.code.as_u16(),
            text = %reply.message_text(),
            recipients = recipients.len(),
            host = %self.server_info.hostname,
            "transaction rejected"
        );
        for recipient in recipients {
            result.reject(Rejection::new(*recipient, reply));
        }
    }
}

// Common implementation for all states
impl<S, State> Session<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn into_state<T>(self) -> Session<S, T> {
        Session {
            reader: self.reader,
            io_timeout: self.io_timeout,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::trace!(line = %cmd.log_line(), "sent");
        self.write(&cmd.serialize()).await?;
        self.read_reply().await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        timeout(self.io_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout(Stage::Write))??;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let reply = timeout(self.io_timeout, read_reply(&mut self.reader))
            .await
            .map_err(|_| Error::Timeout(Stage::Reply))??;
        tracing::trace!(code = reply.code.as_u16(), text = %reply.message_text(), "received");
        Ok(reply)
    }
}

fn ensure_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(Error::rejected(reply.code.as_u16(), reply.message_text()))
    }
}

async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(Error::Protocol("Reply has too many lines".into()));
        }
    }

    parse_reply(&lines)
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(Error::Protocol("Connection closed by server".into()));
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            reader.consume(pos + 1);
            break;
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol("Reply line too long".into()));
        }
    }

    Ok(String::from_utf8_lossy(&line).trim_end().to_string())
}
