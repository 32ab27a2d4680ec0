//! Core submission types.

mod address;
mod options;
mod reply;

pub use address::Address;
pub use options::{Encoding, Notify, ReturnMode};
pub use reply::{Reply, ReplyCode};
