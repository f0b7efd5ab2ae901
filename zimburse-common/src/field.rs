//! Field elements and addresses as they travel between the client and the ledger.
//!
//! Both are opaque 32-byte big-endian values. Arithmetic happens inside the
//! ledger and the circuits; the client only compares, hashes and serializes
//! them, so no curve library is pulled in here.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A 32-byte big-endian field element.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Field(pub [u8; 32]);

impl Field {
    /// The zero element. Also used as the padding sentinel in fixed-width calls.
    pub const ZERO: Field = Field([0u8; 32]);

    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_u128(value as u128)
    }

    /// Parse `0x`-prefixed (or bare) hex, left-padding short values.
    pub fn from_hex(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(Error::InvalidHex(format!("empty value: {text:?}")));
        }
        if digits.len() > 64 {
            return Err(Error::InvalidHex(format!(
                "{} hex digits exceed 32 bytes",
                digits.len()
            )));
        }

        let padded = format!("{digits:0>64}");
        let decoded = hex::decode(&padded).map_err(|e| Error::InvalidHex(format!("{text:?}: {e}")))?;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Low 128 bits, if the element fits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }
}

impl From<u8> for Field {
    fn from(value: u8) -> Self {
        Self::from_u128(value as u128)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.to_hex())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Field::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Contract or account address on the ledger.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub Field);

impl Address {
    pub const ZERO: Address = Address(Field::ZERO);

    pub fn from_hex(text: &str) -> Result<Self> {
        Field::from_hex(text).map(Self)
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Shortened form for logs and listings, e.g. `0x15b5...55ca`.
    pub fn truncated(&self) -> String {
        truncate_address(&self.to_hex(), 6, 4)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Keep `start_len` leading and `end_len` trailing characters of an address string.
pub fn truncate_address(address: &str, start_len: usize, end_len: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= start_len + end_len {
        return address.to_string();
    }
    let head: String = chars[..start_len].iter().collect();
    let tail: String = chars[chars.len() - end_len..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_left_pads() {
        let field = Field::from_hex("0x2a").unwrap();
        assert_eq!(field, Field::from_u64(42));
        assert_eq!(field.to_u128(), Some(42));
        assert!(Field::from_hex("0x").is_err());
        assert!(Field::from_hex(&"f".repeat(65)).is_err());
        assert!(Field::from_hex("0xnothex").is_err());
    }

    #[test]
    fn test_high_bits_do_not_fit_u128() {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        assert_eq!(Field(bytes).to_u128(), None);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let address = Address::from_hex(
            "0x15b5a0621c0ea5d3b84cc6e5b0f217332cb099f94486b056fcde40e3f0eb55ca",
        )
        .unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(
            json,
            "\"0x15b5a0621c0ea5d3b84cc6e5b0f217332cb099f94486b056fcde40e3f0eb55ca\""
        );
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
        assert_eq!(address.truncated(), "0x15b5...55ca");
    }

    #[test]
    fn test_truncate_short_address_untouched() {
        assert_eq!(truncate_address("0x1234", 6, 4), "0x1234");
    }
}
