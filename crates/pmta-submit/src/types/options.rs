//! Closed option types: transfer encoding, return mode and notification flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::Error;

/// Content transfer encoding declared for a message.
///
/// The declaration travels in the envelope; the body itself is sent as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoding {
    /// 7-bit clean content.
    #[default]
    SevenBit,
    /// 8-bit content (8BITMIME).
    EightBit,
    /// Base64 encoded content.
    Base64,
}

impl Encoding {
    /// Returns the caller-facing constant name (e.g. `ENCODING_7BIT`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "ENCODING_7BIT",
            Self::EightBit => "ENCODING_8BIT",
            Self::Base64 => "ENCODING_BASE64",
        }
    }

    /// Returns the envelope `BODY=` keyword.
    #[must_use]
    pub const fn body_keyword(self) -> &'static str {
        match self {
            Self::SevenBit => "7BIT",
            Self::EightBit => "8BITMIME",
            Self::Base64 => "BASE64",
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENCODING_7BIT" => Ok(Self::SevenBit),
            "ENCODING_8BIT" => Ok(Self::EightBit),
            "ENCODING_BASE64" => Ok(Self::Base64),
            _ => Err(Error::invalid(format!("unknown encoding: {s}"))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the original message a bounce should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReturnMode {
    /// Return the full message.
    Full,
    /// Return the headers only.
    Headers,
}

impl ReturnMode {
    /// Returns the caller-facing constant name (e.g. `RETURN_FULL`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "RETURN_FULL",
            Self::Headers => "RETURN_HEADERS",
        }
    }

    /// Returns the envelope `RET=` keyword.
    #[must_use]
    pub const fn ret_keyword(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Headers => "HDRS",
        }
    }
}

impl FromStr for ReturnMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RETURN_FULL" => Ok(Self::Full),
            "RETURN_HEADERS" => Ok(Self::Headers),
            _ => Err(Error::invalid(format!("unknown return mode: {s}"))),
        }
    }
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient delivery status notification flags.
///
/// Flags combine with `|`; [`Notify::NEVER`] is the empty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Notify(u8);

impl Notify {
    /// Never notify.
    pub const NEVER: Self = Self(0x00);
    /// Notify on successful delivery.
    pub const SUCCESS: Self = Self(0x01);
    /// Notify on delivery failure.
    pub const FAILURE: Self = Self(0x02);
    /// Notify on delayed delivery.
    pub const DELAY: Self = Self(0x04);

    const ALL: u8 = 0x07;

    /// Creates flags from raw bits, dropping unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no flag is set.
    #[must_use]
    pub const fn is_never(self) -> bool {
        self.0 == 0
    }

    /// Returns the envelope `NOTIFY=` value.
    #[must_use]
    pub fn notify_keyword(self) -> String {
        if self.is_never() {
            return "NEVER".to_string();
        }
        [
            (Self::SUCCESS, "SUCCESS"),
            (Self::FAILURE, "FAILURE"),
            (Self::DELAY, "DELAY"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",")
    }
}

impl BitOr for Notify {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Notify {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
