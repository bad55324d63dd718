//! Subject and scanner identifiers.
//!
//! An identity is `PREFIX-NNN` with a fixed literal prefix and a zero-padded
//! serial in `001..=999`. Scanner identities double as ledger partition keys,
//! so nothing reaches the ledger without passing through [`IdentityRule`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix used when none is configured.
pub const DEFAULT_IDENTITY_PREFIX: &str = "ABC1";

/// Digits in the serial part.
const SERIAL_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid ID format {given:?}: use {prefix}-001 to {prefix}-999")]
pub struct IdentityError {
    pub given: String,
    pub prefix: String,
}

/// The identity-format rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRule {
    prefix: String,
}

impl IdentityRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
    
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
    
    /// Returns true if `s` is exactly `PREFIX-NNN` with `NNN` in 001..=999.
    pub fn matches(&self, s: &str) -> bool {
        let Some(rest) = s.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let Some(serial) = rest.strip_prefix('-') else {
            return false;
        };
        serial.len() == SERIAL_WIDTH
            && serial.bytes().all(|b| b.is_ascii_digit())
            && serial != "000"
    }
    
    /// Validates `s` and wraps it.
    pub fn parse(&self, s: &str) -> Result<Identity, IdentityError> {
        if self.matches(s) {
            Ok(Identity(s.to_string()))
        } else {
            Err(IdentityError {
                given: s.to_string(),
                prefix: self.prefix.clone(),
            })
        }
    }
    
    /// Validates operator-typed input, ignoring surrounding whitespace.
    pub fn parse_input(&self, input: &str) -> Result<Identity, IdentityError> {
        self.parse(input.trim())
    }
}

impl Default for IdentityRule {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_PREFIX)
    }
}

/// A validated subject or scanner identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_accepts_full_serial_range() {
        let rule = IdentityRule::default();
        assert!(rule.matches("ABC1-001"));
        assert!(rule.matches("ABC1-010"));
        assert!(rule.matches("ABC1-099"));
        assert!(rule.matches("ABC1-100"));
        assert!(rule.matches("ABC1-999"));
    }
    
    #[test]
    fn test_rejects_malformed() {
        let rule = IdentityRule::default();
        for bad in ["ABC1-000", "ABC1-1000", "abc1-001", "ABC1-1", "ABC1001", "ABC1-0a1", "", "ABC1-", " ABC1-001"] {
            assert!(!rule.matches(bad), "{bad:?} should be rejected");
        }
    }
    
    #[test]
    fn test_parse_input_trims() {
        let rule = IdentityRule::default();
        let id = rule.parse_input("  ABC1-042\n").unwrap();
        assert_eq!(id.as_str(), "ABC1-042");
    }
    
    #[test]
    fn test_custom_prefix() {
        let rule = IdentityRule::new("GATE");
        assert!(rule.matches("GATE-123"));
        assert!(!rule.matches("ABC1-123"));
        
        let err = rule.parse("ABC1-123").unwrap_err();
        assert_eq!(err.prefix, "GATE");
    }
}
