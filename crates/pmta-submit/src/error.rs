//! Error types for message construction and submission.

use std::fmt;
use std::io;

use crate::connection::SubmitResult;

/// Result type alias for submission operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Point of a submission at which a timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Establishing the TCP (or TLS) session.
    Connect,
    /// Waiting for a server reply or acknowledgment.
    Reply,
    /// Writing a command or message data.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Connect => "connect",
            Self::Reply => "reply",
            Self::Write => "write",
        };
        f.write_str(stage)
    }
}

/// Submission error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad constructor or setter input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Declared data length does not match the data.
    #[error("Size mismatch: declared {declared} bytes, data is {actual} bytes")]
    SizeMismatch {
        /// Length passed by the caller.
        declared: usize,
        /// Actual byte length of the data.
        actual: usize,
    },

    /// The server refused the TCP connection.
    #[error("Connection refused by {host}:{port}")]
    ConnectionRefused {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
    },

    /// A connect, reply or write wait exceeded its bound.
    #[error("Timed out during {0}")]
    Timeout(Stage),

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server refused a well-formed submission.
    #[error("Server rejected submission {code}: {message}")]
    ServerRejected {
        /// Reply code (e.g., 550).
        code: u16,
        /// Reply text from the server.
        message: String,
    },

    /// The caller cancelled an asynchronous submission.
    #[error("Submission cancelled")]
    Cancelled,

    /// The session broke after the server had already queued some recipients.
    ///
    /// Resubmitting the whole message would deliver those recipients twice;
    /// [`Error::delivered`] lists them.
    #[error("Submission interrupted after {} deliveries: {source}", delivered.accepted().len())]
    Interrupted {
        /// What the server acknowledged before the failure.
        delivered: Box<SubmitResult>,
        /// The failure that ended the session.
        source: Box<Error>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}

impl Error {
    /// Creates a rejection error from a reply code and text.
    #[must_use]
    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self::ServerRejected {
            code,
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns true for infrastructure failures (as opposed to a refused message).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Interrupted { source, .. } => source.is_transport(),
            _ => matches!(
                self,
                Self::ConnectionRefused { .. }
                    | Self::Timeout(_)
                    | Self::Protocol(_)
                    | Self::Io(_)
                    | Self::Tls(_)
            ),
        }
    }

    /// Returns the deliveries acknowledged before an interrupted submission
    /// failed.
    #[must_use]
    pub fn delivered(&self) -> Option<&SubmitResult> {
        match self {
            Self::Interrupted { delivered, .. } => Some(delivered),
            _ => None,
        }
    }

    /// Returns true if this is a permanent rejection (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::ServerRejected { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient rejection (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ServerRejected { code, .. } if *code >= 400 && *code < 500)
    }
}
