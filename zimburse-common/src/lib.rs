//! Shared domain types for the z-imburse client.
//!
//! Everything the receipt, reconciliation and claim crates pass between each
//! other lives here: field elements and addresses, exact micro-unit amounts,
//! notes, nullification events and entitlements.

pub mod amount;
pub mod error;
pub mod field;
pub mod types;

pub use amount::{format_micro_units, is_valid_amount_input, parse_micro_units, MICRO_DECIMALS, MICRO_PER_UNIT};
pub use error::{Error, LedgerError, Result};
pub use field::{truncate_address, Address, Field};
pub use types::{
    ByteRange, ClaimRecord, DateRange, EncryptedNote, Entitlement, NoteTypeId,
    NullificationEvent, RawEntitlement, TokenBalance, TxReceipt, U128Limbs,
};

/// Decode a NUL-terminated byte string as stored in fixed-width contract fields.
pub fn parse_string_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_bytes() {
        assert_eq!(parse_string_bytes(b"USDC\0\0\0"), "USDC");
        assert_eq!(parse_string_bytes(b"no terminator"), "no terminator");
        assert_eq!(parse_string_bytes(b""), "");
    }
}
