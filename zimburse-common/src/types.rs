//! Core domain types shared by extraction, reconciliation and claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::format_micro_units;
use crate::field::{Address, Field};

// ═══════════════════════════════════════════════════════════════════════════════
// CLAIMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Canonical record extracted from a verified receipt email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Amount paid, in micro-units.
    pub amount: u128,
    /// Date the payment happened.
    pub date: DateTime<Utc>,
    /// Sender address as it appears in the signed header.
    pub from: String,
    /// Recipient address as it appears in the signed header.
    pub to: String,
}

impl ClaimRecord {
    pub fn amount_display(&self) -> String {
        format_micro_units(self.amount)
    }
}

/// `(index, length)` slice into a byte sequence, as reported by the email verifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub index: usize,
    pub length: usize,
}

impl ByteRange {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    /// End offset, or `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        self.index.checked_add(self.length)
    }

    /// Borrow the covered bytes, or `None` if the range runs past `bytes`.
    pub fn slice<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        let end = self.end()?;
        bytes.get(self.index..end)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOTES & EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Note type discriminant assigned by the contract artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteTypeId(pub u32);

/// A private note held by the local private-state store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedNote {
    /// Contract that emitted (and can nullify) the note.
    pub owning_contract: Address,
    pub note_type_id: NoteTypeId,
    /// Decrypted note items in contract-defined order.
    pub fields: Vec<Field>,
}

impl EncryptedNote {
    /// Read the field at a fixed note position.
    pub fn field_at(&self, index: usize) -> Option<Field> {
        self.fields.get(index).copied()
    }
}

/// Entitlement-nullified event emitted by a counterparty's escrow contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullificationEvent {
    /// Randomness of the entitlement note that was nullified.
    pub entropy: Field,
    pub block_number: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTITLEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Unsigned 128-bit integer as the ledger stores it: two 64-bit limbs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct U128Limbs {
    pub lo: u64,
    pub hi: u64,
}

impl U128Limbs {
    pub fn from_u128(value: u128) -> Self {
        Self {
            lo: value as u64,
            hi: (value >> 64) as u64,
        }
    }

    pub fn to_u128(self) -> u128 {
        ((self.hi as u128) << 64) | self.lo as u128
    }
}

/// Inclusive window of dates a spot entitlement can be claimed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        *date >= self.start && *date <= self.end
    }
}

/// Entitlement as the escrow contract returns it from a view call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntitlement {
    pub max_value: U128Limbs,
    pub verifier_id: u32,
    pub spot: bool,
    #[serde(default)]
    pub date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_end: Option<DateTime<Utc>>,
}

/// Ledger-enforced permission to claim up to `max_value` against one escrow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Escrow contract holding the funds.
    pub escrow: Address,
    /// Position in the escrow's entitlement listing.
    pub index: usize,
    /// Maximum claimable, in micro-units.
    pub max_value: u128,
    /// Receipt verifier this entitlement accepts.
    pub verifier_id: u32,
    /// One-time (spot) rather than recurring.
    pub spot: bool,
    pub date_range: Option<DateRange>,
}

impl Entitlement {
    pub fn from_raw(escrow: Address, index: usize, raw: RawEntitlement) -> Self {
        let date_range = match (raw.date_start, raw.date_end) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };
        Self {
            escrow,
            index,
            max_value: raw.max_value.to_u128(),
            verifier_id: raw.verifier_id,
            spot: raw.spot,
            date_range,
        }
    }

    /// Whether a record fits this entitlement as far as the client can tell.
    /// The escrow contract remains the authority.
    pub fn covers(&self, record: &ClaimRecord) -> bool {
        record.amount <= self.max_value
            && self
                .date_range
                .as_ref()
                .map_or(true, |range| range.contains(&record.date))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Confirmation for a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: Field,
    pub block_number: u64,
}

/// Token balances of one account, in micro-units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub private: u128,
    pub public: u128,
}

impl TokenBalance {
    pub fn total(&self) -> u128 {
        self.private.saturating_add(self.public)
    }
}
