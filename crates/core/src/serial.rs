//! Serial numbers: the external identity of an item.
//!
//! Serials are case-insensitive. They are stored, compared and looked up in
//! upper-case canonical form, so `sn-001` and `SN-001` name the same item and
//! the duplicate check agrees with the format rule.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

pub const SERIAL_MAX_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Validate and canonicalize a serial number.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::field("serialNumber", "serial number is required"));
        }
        if trimmed.chars().count() > SERIAL_MAX_LEN {
            return Err(DomainError::field(
                "serialNumber",
                "serial number must be 50 characters or less",
            ));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::field(
                "serialNumber",
                "serial number can only contain letters, numbers, hyphens, and underscores",
            ));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Canonical key for a lookup. `None` when `raw` can never name an item.
    pub fn lookup(raw: &str) -> Option<Self> {
        Self::parse(raw).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SerialNumber> for String {
    fn from(value: SerialNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for SerialNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_uppercases_and_trims() {
        let s = SerialNumber::parse("  sn-001_a ").unwrap();
        assert_eq!(s.as_str(), "SN-001_A");
    }

    #[test]
    fn parse_rejects_bad_characters_and_lengths() {
        assert!(SerialNumber::parse("").is_err());
        assert!(SerialNumber::parse("SN 001").is_err());
        assert!(SerialNumber::parse("SN/001").is_err());
        assert!(SerialNumber::parse(&"A".repeat(51)).is_err());
        assert!(SerialNumber::parse(&"A".repeat(50)).is_ok());
    }

    #[test]
    fn lookup_is_none_for_invalid_input() {
        assert!(SerialNumber::lookup("not valid!").is_none());
        assert_eq!(SerialNumber::lookup("abc").unwrap().as_str(), "ABC");
    }

    proptest! {
        #[test]
        fn case_variants_share_one_canonical_form(raw in "[A-Za-z0-9_-]{1,50}") {
            let lower = SerialNumber::parse(&raw.to_ascii_lowercase()).unwrap();
            let upper = SerialNumber::parse(&raw.to_ascii_uppercase()).unwrap();
            prop_assert_eq!(lower, upper);
        }
    }
}
