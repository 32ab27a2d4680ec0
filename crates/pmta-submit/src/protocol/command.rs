//! Submission command builder.

use crate::types::{Address, Encoding, Notify, ReturnMode};

/// Envelope parameters carried on `MAIL FROM`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MailParams {
    /// Declared transfer encoding (`BODY=`).
    pub encoding: Encoding,
    /// Bounce return mode (`RET=`).
    pub return_mode: Option<ReturnMode>,
    /// Envelope id (`ENVID=`).
    pub envelope_id: Option<String>,
    /// Per-recipient return path rewriting (`XVERP`).
    pub verp: bool,
}

/// Submission command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH PLAIN with an initial response
    AuthPlain {
        /// Base64 encoded `\0name\0password`
        initial_response: String,
    },
    /// MAIL FROM - Start a transaction
    MailFrom {
        /// Sender address
        from: Address,
        /// Envelope parameters
        params: MailParams,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
        /// Delivery status notification flags
        notify: Option<Notify>,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => {
                buf.extend_from_slice(b"STARTTLS");
            }
            Self::AuthPlain { initial_response } => {
                buf.extend_from_slice(b"AUTH PLAIN ");
                buf.extend_from_slice(initial_response.as_bytes());
            }
            Self::MailFrom { from, params } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.extend_from_slice(b"> BODY=");
                buf.extend_from_slice(params.encoding.body_keyword().as_bytes());
                if let Some(mode) = params.return_mode {
                    buf.extend_from_slice(b" RET=");
                    buf.extend_from_slice(mode.ret_keyword().as_bytes());
                }
                if let Some(id) = &params.envelope_id {
                    buf.extend_from_slice(b" ENVID=");
                    buf.extend_from_slice(id.as_bytes());
                }
                if params.verp {
                    buf.extend_from_slice(b" XVERP");
                }
            }
            Self::RcptTo { to, notify } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
                if let Some(flags) = notify {
                    buf.extend_from_slice(b" NOTIFY=");
                    buf.extend_from_slice(flags.notify_keyword().as_bytes());
                }
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns the command line for logs, with credentials redacted.
    #[must_use]
    pub fn log_line(&self) -> String {
        match self {
            Self::AuthPlain { .. } => "AUTH PLAIN <redacted>".to_string(),
            _ => String::from_utf8_lossy(&self.serialize())
                .trim_end()
                .to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.domain.tld".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.domain.tld\r\n");
    }

    #[test]
    fn test_auth_plain_redacted_in_logs() {
        let cmd = Command::AuthPlain {
            initial_response: "AHVzZXIAcGFzcw==".to_string(),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(cmd.log_line(), "AUTH PLAIN <redacted>");
    }

    #[test]
    fn test_mail_from_default_params() {
        let cmd = Command::MailFrom {
            from: addr("noreply@domain.tld"),
            params: MailParams::default(),
        };
        assert_eq!(
            cmd.serialize(),
            b"MAIL FROM:<noreply@domain.tld> BODY=7BIT\r\n"
        );
    }

    #[test]
    fn test_mail_from_all_params() {
        let cmd = Command::MailFrom {
            from: addr("noreply@domain.tld"),
            params: MailParams {
                encoding: Encoding::EightBit,
                return_mode: Some(ReturnMode::Headers),
                envelope_id: Some("env-42".to_string()),
                verp: true,
            },
        };
        assert_eq!(
            cmd.serialize(),
            b"MAIL FROM:<noreply@domain.tld> BODY=8BITMIME RET=HDRS ENVID=env-42 XVERP\r\n"
        );
    }

    #[test]
    fn test_rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: addr("jane@domain.tld"),
            notify: None,
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<jane@domain.tld>\r\n");
        assert_eq!(cmd.log_line(), "RCPT TO:<jane@domain.tld>");
    }

    #[test]
    fn test_rcpt_to_notify() {
        let cmd = Command::RcptTo {
            to: addr("jane@domain.tld"),
            notify: Some(Notify::FAILURE | Notify::DELAY),
        };
        assert_eq!(
            cmd.serialize(),
            b"RCPT TO:<jane@domain.tld> NOTIFY=FAILURE,DELAY\r\n"
        );

        let never = Command::RcptTo {
            to: addr("jane@domain.tld"),
            notify: Some(Notify::NEVER),
        };
        assert_eq!(
            never.serialize(),
            b"RCPT TO:<jane@domain.tld> NOTIFY=NEVER\r\n"
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
