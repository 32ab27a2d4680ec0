//! # pmta-submit
//!
//! A client for submitting messages to a PowerMTA server.
//!
//! ## Features
//!
//! - **Message model**: sender, ordered recipients, header directives,
//!   encoding, return mode, envelope id, virtual MTA, job id and VERP
//! - **Merge templating**: per-recipient `[name]` substitution with the
//!   system variables `[*from]`, `[*to]` and `[*parts]`
//! - **Multi-part content**: recipients select parts with their `*parts`
//!   variable
//! - **Blocking and async submission**: `submit`, `send` and cancellable
//!   `submit_async`
//! - **TLS and authentication**: STARTTLS, implicit TLS and `AUTH PLAIN`
//! - **Bounded waits**: independent connect and reply/write timeouts
//!
//! ## Quick Start
//!
//! ```ignore
//! use pmta_submit::{Connection, Encoding, Message, Recipient};
//!
//! fn main() -> pmta_submit::Result<()> {
//!     let mut recipient = Recipient::new("jane@domain.tld")?;
//!     recipient.define_variable("fname", "jane");
//!     recipient.define_variable("*parts", "1");
//!
//!     let mut message = Message::new("noreply@domain.tld")?;
//!     message.add_recipient(recipient);
//!     message.add_date_header();
//!     message.set_encoding(Encoding::SevenBit);
//!     message.set_virtual_mta("default");
//!     message.set_job_id("00000999");
//!     message.set_verp(true);
//!
//!     let body = "From: [*from]\nTo: [*to]\nSubject: Hello\n\nHi [fname]\n";
//!     message.add_merge_data(body, body.len())?;
//!
//!     let connection = Connection::new("pmta.domain.tld", 25);
//!     let result = connection.submit(&message)?;
//!     println!("queued as {:?}", result.queue_id());
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Idle ──→ Connecting ──→ Submitting ──┬──→ Completed
//!              │               │       │
//!              └───────────────┴───────┴──→ Failed
//! ```
//!
//! ## Modules
//!
//! - [`connection`]: Connection, configuration, sessions and results
//! - [`message`]: Message construction and merge expansion
//! - [`protocol`]: Command builders, reply parser and transaction planning
//! - [`types`]: Addresses, options and replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod connection;
mod error;
pub mod message;
pub mod protocol;
mod recipient;
pub mod types;

pub use connection::{
    Config, ConfigBuilder, Connection, Credentials, Delivery, Rejection, Security, State,
    Submission, SubmitResult, SubmitStatus,
};
pub use error::{Error, Result, Stage};
pub use message::{Header, Message};
pub use recipient::Recipient;
pub use types::{Address, Encoding, Notify, Reply, ReplyCode, ReturnMode};
