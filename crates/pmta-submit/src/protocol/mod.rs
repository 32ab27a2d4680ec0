//! Wire protocol: commands, reply parsing and transaction planning.

pub mod command;
pub mod parser;
pub mod transaction;

pub use command::{Command, MailParams};
pub use parser::{is_last_reply_line, parse_reply};
pub use transaction::{EnvelopeRecipient, Transaction, frame_data, plan};
