//! Message construction.
//!
//! A [`Message`] gathers the envelope (sender, recipients, VERP, return mode,
//! envelope id), the header directives handed to the server (virtual MTA,
//! job id, explicit headers) and the content. Content is organised in parts;
//! each part is a sequence of literal chunks (`add_data`) and merge templates
//! (`add_merge_data`) that are expanded per recipient at submission.
//!
//! Setters are deliberately permissive: they do not cross-check fields, so a
//! message may declare [`Encoding::Base64`] while carrying plain text.

mod merge;

use chrono::Local;

use crate::error::{Error, Result};
use crate::recipient::Recipient;
use crate::types::{Address, Encoding, ReturnMode};
use merge::MergeContext;

/// Highest part number a message may declare.
pub const MAX_PARTS: usize = 65_535;

/// A header directive placed ahead of the message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Header field name.
    pub name: String,
    /// Header field value.
    pub value: String,
}

impl Header {
    /// Creates a header after checking it can be framed as one line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is empty or not a valid
    /// field name, or if either part contains a line break.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();

        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
            return Err(Error::invalid(format!("invalid header name: {name:?}")));
        }
        if value.contains(['\r', '\n']) {
            return Err(Error::invalid(format!(
                "header value for {name} contains a line break"
            )));
        }

        Ok(Self { name, value })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Literal(String),
    Merge(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Part {
    chunks: Vec<Chunk>,
}

/// An email message ready to be attached to a submission.
#[derive(Debug, Clone)]
pub struct Message {
    sender: Address,
    recipients: Vec<Recipient>,
    headers: Vec<Header>,
    encoding: Encoding,
    return_mode: Option<ReturnMode>,
    envelope_id: Option<String>,
    virtual_mta: Option<String>,
    job_id: Option<String>,
    verp: bool,
    parts: Vec<Part>,
    current_part: usize,
}

impl Message {
    /// Creates an empty message from `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the sender is empty or not an
    /// email address.
    pub fn new(sender: impl Into<String>) -> Result<Self> {
        Ok(Self {
            sender: Address::new(sender)?,
            recipients: Vec::new(),
            headers: Vec::new(),
            encoding: Encoding::default(),
            return_mode: None,
            envelope_id: None,
            virtual_mta: None,
            job_id: None,
            verp: false,
            parts: vec![Part::default()],
            current_part: 0,
        })
    }

    /// Returns the sender address.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Appends a recipient. Duplicate addresses are kept.
    ///
    /// The message owns its copy; later changes to a clone held by the caller
    /// do not reach the message.
    pub fn add_recipient(&mut self, recipient: Recipient) {
        self.recipients.push(recipient);
    }

    /// Returns the recipients in insertion order.
    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Adds a `Date` header carrying the current local time (RFC 5322).
    ///
    /// Each call adds another header; nothing deduplicates them.
    pub fn add_date_header(&mut self) {
        self.headers.push(Header {
            name: "Date".to_string(),
            value: Local::now().to_rfc2822(),
        });
    }

    /// Adds an explicit header directive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the header cannot be framed.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.headers.push(Header::new(name, value)?);
        Ok(())
    }

    /// Returns the header directives in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Appends literal content to the current part.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if `length` is not the byte length of
    /// `data`.
    pub fn add_data(&mut self, data: impl Into<String>, length: usize) -> Result<()> {
        let data = checked_length(data.into(), length)?;
        self.parts[self.current_part].chunks.push(Chunk::Literal(data));
        Ok(())
    }

    /// Appends a merge template to the current part.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if `length` is not the byte length of
    /// `template`.
    pub fn add_merge_data(&mut self, template: impl Into<String>, length: usize) -> Result<()> {
        let template = checked_length(template.into(), length)?;
        self.parts[self.current_part].chunks.push(Chunk::Merge(template));
        Ok(())
    }

    /// Starts part `part`; content added afterwards belongs to it.
    ///
    /// Part 1 is implicit, so `part` must be greater than 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `part` is 0, 1 or above
    /// [`MAX_PARTS`].
    pub fn begin_part(&mut self, part: usize) -> Result<()> {
        if !(2..=MAX_PARTS).contains(&part) {
            return Err(Error::invalid(format!(
                "part must be between 2 and {MAX_PARTS}, got {part}"
            )));
        }
        if self.parts.len() < part {
            self.parts.resize_with(part, Part::default);
        }
        self.current_part = part - 1;
        Ok(())
    }

    /// Returns the number of declared parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Sets the declared transfer encoding.
    pub const fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// Returns the declared transfer encoding.
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Sets how much of the message bounces return.
    pub const fn set_return_mode(&mut self, mode: ReturnMode) {
        self.return_mode = Some(mode);
    }

    /// Returns the bounce return mode, if set.
    #[must_use]
    pub const fn return_mode(&self) -> Option<ReturnMode> {
        self.return_mode
    }

    /// Sets the envelope id echoed back in delivery status notifications.
    pub fn set_envelope_id(&mut self, id: impl Into<String>) {
        self.envelope_id = Some(id.into());
    }

    /// Returns the envelope id, if set.
    #[must_use]
    pub fn envelope_id(&self) -> Option<&str> {
        self.envelope_id.as_deref()
    }

    /// Names the virtual MTA (outbound IP or pool) to send through.
    pub fn set_virtual_mta(&mut self, name: impl Into<String>) {
        self.virtual_mta = Some(name.into());
    }

    /// Returns the virtual MTA, if set.
    #[must_use]
    pub fn virtual_mta(&self) -> Option<&str> {
        self.virtual_mta.as_deref()
    }

    /// Sets the job id echoed back in delivery reports.
    pub fn set_job_id(&mut self, id: impl Into<String>) {
        self.job_id = Some(id.into());
    }

    /// Returns the job id, if set.
    #[must_use]
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Enables or disables per-recipient return path rewriting (VERP).
    pub const fn set_verp(&mut self, verp: bool) {
        self.verp = verp;
    }

    /// Returns true if VERP is requested.
    #[must_use]
    pub const fn verp(&self) -> bool {
        self.verp
    }

    /// Returns true if any content is a merge template.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.chunks().any(|chunk| matches!(chunk, Chunk::Merge(_)))
    }

    /// Returns true if any content has been added.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.chunks().next().is_some()
    }

    /// Renders the content once per recipient, in insertion order.
    ///
    /// Merge templates are expanded against each recipient's variables; the
    /// recipient's `*parts` variable, when present, selects which parts are
    /// included and in what order.
    #[must_use]
    pub fn expand(&self) -> Vec<String> {
        self.recipients
            .iter()
            .map(|recipient| self.content_for(recipient))
            .collect()
    }

    pub(crate) fn content_for(&self, recipient: &Recipient) -> String {
        let ctx = MergeContext {
            sender: self.sender.as_str(),
            recipient,
            part_count: self.parts.len(),
        };

        let mut content = String::new();
        for part in self.selected_parts(recipient) {
            for chunk in &part.chunks {
                match chunk {
                    Chunk::Literal(data) => content.push_str(data),
                    Chunk::Merge(template) => content.push_str(&merge::expand(template, &ctx)),
                }
            }
        }
        content
    }

    /// Renders content shared by all recipients (no merge expansion).
    pub(crate) fn literal_content(&self) -> String {
        self.chunks()
            .map(|chunk| match chunk {
                Chunk::Literal(data) | Chunk::Merge(data) => data.as_str(),
            })
            .collect()
    }

    fn selected_parts(&self, recipient: &Recipient) -> Vec<&Part> {
        match recipient.variable("*parts") {
            Some(list) => list
                .split(',')
                .filter_map(|n| n.trim().parse::<usize>().ok())
                .filter_map(|n| n.checked_sub(1).and_then(|i| self.parts.get(i)))
                .collect(),
            None => self.parts.iter().collect(),
        }
    }

    fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.parts.iter().flat_map(|part| part.chunks.iter())
    }
}

fn checked_length(data: String, declared: usize) -> Result<String> {
    if data.len() == declared {
        Ok(data)
    } else {
        Err(Error::SizeMismatch {
            declared,
            actual: data.len(),
        })
    }
}
