//! Record identifiers.
//!
//! Identifiers double as file stems inside every tier directory, so they are
//! restricted to ASCII alphanumerics, `-` and `_`. Anything else (path
//! separators, dots, whitespace) is rejected up front instead of being escaped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest identifier accepted. Keeps file names well under common limits.
pub const MAX_ID_LEN: usize = 128;

/// A validated, filesystem-safe record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_ID_LEN {
            return Err(Error::InvalidIdentifier(id));
        }
        if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(Error::InvalidIdentifier(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a billing identifier of the form `BILL-<digits>`, case-insensitively.
    ///
    /// The returned identifier is upper-cased (`bill-00001` -> `BILL-00001`).
    pub fn parse_billing(input: &str) -> Result<Self> {
        let normalized = input.trim().to_ascii_uppercase();
        match normalized.strip_prefix("BILL-") {
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                Self::new(normalized)
            }
            _ => Err(Error::InvalidIdentifier(input.to_string())),
        }
    }

    /// Billing identifier for a sequence number, zero-padded to five digits.
    pub fn billing(seq: u32) -> Self {
        Self(format!("BILL-{:05}", seq))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_safe_identifiers() {
        for id in ["BILL-00001", "abc_123", "X"] {
            assert!(RecordId::new(id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        for id in ["", "../etc", "a/b", "a.json", "has space", "é"] {
            assert!(RecordId::new(id).is_err(), "{id:?} should be rejected");
        }
        assert!(RecordId::new("x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_parse_billing_normalizes_case() {
        let id = RecordId::parse_billing(" bill-00042 ").unwrap();
        assert_eq!(id.as_str(), "BILL-00042");
    }

    #[test]
    fn test_parse_billing_rejects_other_shapes() {
        for input in ["BILL-", "BILL-12a", "INV-00001", "00001"] {
            assert!(RecordId::parse_billing(input).is_err(), "{input}");
        }
    }

    #[test]
    fn test_billing_zero_pads() {
        assert_eq!(RecordId::billing(7).as_str(), "BILL-00007");
        assert_eq!(RecordId::billing(123456).as_str(), "BILL-123456");
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: RecordId = serde_json::from_str("\"BILL-00001\"").unwrap();
        assert_eq!(ok.as_str(), "BILL-00001");
        assert!(serde_json::from_str::<RecordId>("\"a/b\"").is_err());
    }
}
