//! Session PIN handling.
//!
//! A PIN is the 6-digit numeric key binding one host attachment to its
//! viewers at the relay. The host generates a fresh PIN for every sharing
//! attempt; expired or disconnected PINs are never reused.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Number of digits in a PIN.
pub const PIN_LENGTH: usize = 6;

/// A validated 6-digit session PIN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin(String);

impl Pin {
    /// Parses and validates a PIN: exactly six ASCII digits.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let trimmed = input.trim();
        if trimmed.len() != PIN_LENGTH || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidPin(input.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generates a fresh random PIN in the 100000..=999999 range.
    ///
    /// The leading digit is never zero, so the string form is always six
    /// characters without padding.
    pub fn generate() -> Self {
        let value: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        Self(value.to_string())
    }

    /// The PIN digits as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Pin {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pin {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let pin = Pin::parse("482913").unwrap();
        assert_eq!(pin.as_str(), "482913");
        assert_eq!(pin.to_string(), "482913");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let pin = Pin::parse(" 482913\n").unwrap();
        assert_eq!(pin.as_str(), "482913");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Pin::parse("").is_err());
        assert!(Pin::parse("12345").is_err());
        assert!(Pin::parse("1234567").is_err());
        assert!(Pin::parse("12a456").is_err());
        assert!(Pin::parse("12 456").is_err());
        assert!(Pin::parse("½23456").is_err());
    }

    #[test]
    fn test_generate_is_six_digits() {
        for _ in 0..100 {
            let pin = Pin::generate();
            assert_eq!(pin.as_str().len(), PIN_LENGTH);
            assert!(pin.as_str().bytes().all(|b| b.is_ascii_digit()));
            assert_ne!(pin.as_str().as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let pin = Pin::parse("123456").unwrap();
        let json = serde_json::to_string(&pin).unwrap();
        assert_eq!(json, r#""123456""#);
        let back: Pin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pin);

        let bad: Result<Pin, _> = serde_json::from_str(r#""12345x""#);
        assert!(bad.is_err());
    }
}
