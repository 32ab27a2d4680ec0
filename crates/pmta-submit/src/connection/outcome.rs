//! Submission results.

use crate::error::{Error, Result};
use crate::types::Reply;

/// Overall status of a submission the server (at least partly) accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubmitStatus {
    /// Every recipient was accepted.
    Accepted,
    /// Some recipients were rejected.
    PartiallyAccepted,
}

/// A recipient the server queued.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Delivery {
    /// Recipient address.
    pub recipient: String,
    /// Queue id assigned by the server, if the acknowledgment carried one.
    pub queue_id: Option<String>,
}

/// A recipient the server refused.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rejection {
    /// Recipient address.
    pub recipient: String,
    /// Reply code of the refusal.
    pub code: u16,
    /// Reply text of the refusal.
    pub message: String,
}

impl Rejection {
    pub(crate) fn new(recipient: impl Into<String>, reply: &Reply) -> Self {
        Self {
            recipient: recipient.into(),
            code: reply.code.as_u16(),
            message: reply.message_text(),
        }
    }
}

/// Result of a submission the server accepted for at least one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubmitResult {
    accepted: Vec<Delivery>,
    rejected: Vec<Rejection>,
}

impl SubmitResult {
    /// Returns the overall status.
    #[must_use]
    pub fn status(&self) -> SubmitStatus {
        if self.rejected.is_empty() {
            SubmitStatus::Accepted
        } else {
            SubmitStatus::PartiallyAccepted
        }
    }

    /// Returns true if every recipient was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status() == SubmitStatus::Accepted
    }

    /// Returns the first queue id the server assigned.
    #[must_use]
    pub fn queue_id(&self) -> Option<&str> {
        self.accepted.iter().find_map(|d| d.queue_id.as_deref())
    }

    /// Returns the accepted recipients in submission order.
    #[must_use]
    pub fn accepted(&self) -> &[Delivery] {
        &self.accepted
    }

    /// Returns the rejected recipients in submission order.
    #[must_use]
    pub fn rejected(&self) -> &[Rejection] {
        &self.rejected
    }

    pub(crate) fn accept(&mut self, recipient: impl Into<String>, queue_id: Option<String>) {
        self.accepted.push(Delivery {
            recipient: recipient.into(),
            queue_id,
        });
    }

    pub(crate) fn reject(&mut self, rejection: Rejection) {
        self.rejected.push(rejection);
    }

    pub(crate) fn extend(&mut self, other: Self) {
        self.accepted.extend(other.accepted);
        self.rejected.extend(other.rejected);
    }

    /// Fails with the last refusal if nothing was accepted.
    pub(crate) fn finish(self) -> Result<Self> {
        if !self.accepted.is_empty() {
            return Ok(self);
        }
        match self.rejected.last() {
            Some(last) => Err(Error::rejected(last.code, last.message.clone())),
            None => Err(Error::Protocol("submission produced no outcome".into())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;

    fn refusal(code: u16, text: &str) -> Reply {
        Reply::new(ReplyCode::new(code), vec![text.to_string()])
    }

    #[test]
    fn test_all_accepted() {
        let mut result = SubmitResult::default();
        result.accept("a@domain.tld", Some("Q1".into()));
        result.accept("b@domain.tld", Some("Q2".into()));

        let result = result.finish().unwrap();
        assert_eq!(result.status(), SubmitStatus::Accepted);
        assert!(result.is_success());
        assert_eq!(result.queue_id(), Some("Q1"));
    }

    #[test]
    fn test_partially_accepted() {
        let mut result = SubmitResult::default();
        result.reject(Rejection::new("a@domain.tld", &refusal(550, "no such user")));
        result.accept("b@domain.tld", None);
        result.accept("c@domain.tld", Some("Q3".into()));

        let result = result.finish().unwrap();
        assert_eq!(result.status(), SubmitStatus::PartiallyAccepted);
        assert_eq!(result.queue_id(), Some("Q3"));
        assert_eq!(result.rejected()[0].code, 550);
    }

    #[test]
    fn test_nothing_accepted_is_rejection() {
        let mut result = SubmitResult::default();
        result.reject(Rejection::new("a@domain.tld", &refusal(550, "no such user")));
        result.reject(Rejection::new("b@domain.tld", &refusal(452, "too many recipients")));

        let err = result.finish().unwrap_err();
        assert!(matches!(err, Error::ServerRejected { code: 452, .. }));
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut first = SubmitResult::default();
        first.accept("a@domain.tld", Some("Q1".into()));
        let mut second = SubmitResult::default();
        second.accept("b@domain.tld", Some("Q2".into()));

        first.extend(second);
        let recipients: Vec<_> = first.accepted().iter().map(|d| d.recipient.as_str()).collect();
        assert_eq!(recipients, vec!["a@domain.tld", "b@domain.tld"]);
    }
}
