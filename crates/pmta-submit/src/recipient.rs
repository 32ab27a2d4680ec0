//! Message recipients and their merge variables.

use crate::error::Result;
use crate::types::{Address, Notify};

/// One destination address plus the variables substituted into merge data.
///
/// Variables keep their definition order; redefining a name replaces its
/// value in place. Names are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    address: Address,
    variables: Vec<(String, String)>,
    notify: Option<Notify>,
}

impl Recipient {
    /// Creates a recipient for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if the address is empty or
    /// not an email address.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            address: Address::new(address)?,
            variables: Vec::new(),
            notify: None,
        })
    }

    /// Returns the destination address.
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Defines (or redefines) a merge variable.
    pub fn define_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.variables.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.variables.push((name, value)),
        }
    }

    /// Returns the value of a merge variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns all variables in definition order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Sets the delivery status notification flags for this recipient.
    pub const fn set_notify(&mut self, notify: Notify) {
        self.notify = Some(notify);
    }

    /// Returns the notification flags, if any were set.
    #[must_use]
    pub const fn notify(&self) -> Option<Notify> {
        self.notify
    }
}
