//! Chain identifiers
//!
//! Providers report chains as hex strings (`"0x2105"`); the session keeps
//! them as integers and echoes them back in hex on the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainIdError {
    #[error("Empty chain id")]
    Empty,
    #[error("Invalid chain id: {0}")]
    Invalid(String),
    #[error("Chain id must be positive")]
    Zero,
}

/// Numeric chain identifier (EIP-155). Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(u64);

/// Well-known chains: (id, name)
const KNOWN: &[(u64, &str)] = &[
    (1, "Ethereum"),
    (10, "Optimism"),
    (8453, "Base"),
    (42161, "Arbitrum One"),
    (84532, "Base Sepolia"),
    (11155111, "Sepolia"),
];

impl ChainId {
    pub const ETHEREUM: ChainId = ChainId(1);
    pub const OPTIMISM: ChainId = ChainId(10);
    pub const BASE: ChainId = ChainId(8453);
    pub const ARBITRUM_ONE: ChainId = ChainId(42161);

    pub fn new(id: u64) -> Result<Self, ChainIdError> {
        if id == 0 { return Err(ChainIdError::Zero); }
        Ok(Self(id))
    }

    /// Parse a base-16 chain id, with or without `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self, ChainIdError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ChainIdError::Empty);
        }
        // from_str_radix would also take a sign
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChainIdError::Invalid(value.to_string()));
        }
        let id = u64::from_str_radix(digits, 16).map_err(|_| ChainIdError::Invalid(value.to_string()))?;
        Self::new(id)
    }

    pub fn value(&self) -> u64 { self.0 }

    /// Lowercase `0x`-prefixed hex, the form providers use on the wire.
    pub fn to_hex(&self) -> String { format!("{:#x}", self.0) }

    pub fn name(&self) -> Option<&'static str> {
        KNOWN.iter().find(|(id, _)| *id == self.0).map(|(_, name)| *name)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = ChainIdError;

    /// `0x…` is hex, anything else decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChainIdError::Empty);
        }
        if s.starts_with("0x") || s.starts_with("0X") {
            return Self::from_hex(s);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ChainIdError::Invalid(s.to_string()));
        }
        let id = s.parse::<u64>().map_err(|_| ChainIdError::Invalid(s.to_string()))?;
        Self::new(id)
    }
}

impl TryFrom<u64> for ChainId {
    type Error = ChainIdError;
    fn try_from(value: u64) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> u64 { id.0 }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(u64),
            Str(String),
        }
        let parsed = match Repr::deserialize(deserializer)? {
            Repr::Num(n) => ChainId::new(n),
            Repr::Str(s) => s.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_chain_ids() {
        assert_eq!(ChainId::from_hex("0x1").unwrap().value(), 1);
        assert_eq!(ChainId::from_hex("0x2105").unwrap().value(), 8453);
        assert_eq!(ChainId::from_hex("0XA4B1").unwrap(), ChainId::ARBITRUM_ONE);
        assert_eq!(ChainId::from_hex("a").unwrap(), ChainId::OPTIMISM);
    }

    #[test]
    fn hex_echo_matches_provider_format() {
        let base = ChainId::from_hex("0x2105").unwrap();
        assert_eq!(base.to_hex(), "0x2105");
        assert_eq!(base.to_string(), "8453");
        assert_eq!(ChainId::from_hex(&base.to_hex()).unwrap(), base);
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(ChainId::from_hex("0x"), Err(ChainIdError::Empty));
        assert_eq!(ChainId::from_hex(""), Err(ChainIdError::Empty));
        assert!(matches!(ChainId::from_hex("0xzz"), Err(ChainIdError::Invalid(_))));
        assert!(matches!(ChainId::from_hex("0x1ffffffffffffffff"), Err(ChainIdError::Invalid(_))));
        assert_eq!(ChainId::from_hex("0x0"), Err(ChainIdError::Zero));
    }

    #[test]
    fn rejects_signed_hex() {
        assert!(matches!(ChainId::from_hex("0x+1"), Err(ChainIdError::Invalid(_))));
        assert!(matches!(ChainId::from_hex("-1"), Err(ChainIdError::Invalid(_))));
        assert!(matches!("0x+2105".parse::<ChainId>(), Err(ChainIdError::Invalid(_))));
        assert!(matches!("+8453".parse::<ChainId>(), Err(ChainIdError::Invalid(_))));
    }

    #[test]
    fn from_str_accepts_decimal_and_hex() {
        assert_eq!("8453".parse::<ChainId>().unwrap(), ChainId::BASE);
        assert_eq!("0x2105".parse::<ChainId>().unwrap(), ChainId::BASE);
        assert!("base".parse::<ChainId>().is_err());
    }

    #[test]
    fn known_names() {
        assert_eq!(ChainId::BASE.name(), Some("Base"));
        assert_eq!(ChainId::new(999_999).unwrap().name(), None);
    }

    #[test]
    fn serde_integer_or_hex() {
        assert_eq!(serde_json::to_string(&ChainId::BASE).unwrap(), "8453");
        let a: ChainId = serde_json::from_str("8453").unwrap();
        let b: ChainId = serde_json::from_str("\"0x2105\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<ChainId>("0").is_err());
    }
}
