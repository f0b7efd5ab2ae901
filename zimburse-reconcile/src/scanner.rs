//! Note inventory scanner.
//!
//! Matches the holder's entitlement notes against counterparty nullification
//! events. Reads only; running it twice without a nullification in between
//! yields the same [`MatchedGroup`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zimburse_common::{Address, EncryptedNote, Field, NoteTypeId, NullificationEvent};

use crate::error::{ReconcileError, Result};
use crate::ledger::{EventKind, NoteLedger};

/// Default upper bound of the event scan window.
pub const EVENT_BLOCK_LIMIT: u64 = 100_000;

/// Position of the entropy (randomness) item inside an entitlement note.
pub const ENTITLEMENT_ENTROPY_INDEX: usize = 7;

/// Scanner settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Note type id of the escrow's entitlement note.
    pub entitlement_note_type: NoteTypeId,
    #[serde(default = "default_entropy_index")]
    pub entropy_index: usize,
    /// Events are read over `[1, event_block_limit]`.
    #[serde(default = "default_event_block_limit")]
    pub event_block_limit: u64,
}

fn default_entropy_index() -> usize {
    ENTITLEMENT_ENTROPY_INDEX
}

fn default_event_block_limit() -> u64 {
    EVENT_BLOCK_LIMIT
}

impl ScannerConfig {
    pub fn new(entitlement_note_type: NoteTypeId) -> Self {
        Self {
            entitlement_note_type,
            entropy_index: ENTITLEMENT_ENTROPY_INDEX,
            event_block_limit: EVENT_BLOCK_LIMIT,
        }
    }
}

/// Entropies to nullify, grouped by owning escrow contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedGroup {
    groups: BTreeMap<Address, Vec<Field>>,
}

impl MatchedGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, contract: Address, entropy: Field) {
        self.groups.entry(contract).or_default().push(entropy);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of contracts with at least one match.
    pub fn contract_count(&self) -> usize {
        self.groups.len()
    }

    /// Total matched entropies across contracts.
    pub fn entropy_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn get(&self, contract: &Address) -> Option<&[Field]> {
        self.groups.get(contract).map(Vec::as_slice)
    }

    /// Contracts in ascending address order with their entropies in note order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &[Field])> {
        self.groups.iter().map(|(contract, entropies)| (contract, entropies.as_slice()))
    }
}

impl FromIterator<(Address, Field)> for MatchedGroup {
    fn from_iter<I: IntoIterator<Item = (Address, Field)>>(iter: I) -> Self {
        let mut group = MatchedGroup::new();
        for (contract, entropy) in iter {
            group.push(contract, entropy);
        }
        group
    }
}

/// Pure matching step: entitlement notes whose entropy appears in `events`.
///
/// Each note is visited once, so it contributes at most one entry.
pub fn match_notes(
    notes: &[EncryptedNote],
    events: &[NullificationEvent],
    config: &ScannerConfig,
) -> MatchedGroup {
    let nullified: HashSet<Field> = events.iter().map(|event| event.entropy).collect();
    let mut group = MatchedGroup::new();

    for note in notes {
        if note.note_type_id != config.entitlement_note_type {
            continue;
        }
        let Some(entropy) = note.field_at(config.entropy_index) else {
            warn!(
                contract = %note.owning_contract.truncated(),
                fields = note.fields.len(),
                "entitlement note shorter than entropy index, skipping"
            );
            continue;
        };
        if nullified.contains(&entropy) {
            group.push(note.owning_contract, entropy);
        }
    }

    group
}

/// Scanner bound to a ledger and a holder.
#[derive(Clone)]
pub struct NoteInventoryScanner {
    ledger: Arc<dyn NoteLedger>,
    holder: Address,
    config: ScannerConfig,
}

impl NoteInventoryScanner {
    pub fn new(ledger: Arc<dyn NoteLedger>, holder: Address, config: ScannerConfig) -> Self {
        Self {
            ledger,
            holder,
            config,
        }
    }

    pub fn holder(&self) -> &Address {
        &self.holder
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Fetch events and notes and compute the matched group.
    pub async fn scan(&self) -> Result<MatchedGroup> {
        let events = self
            .ledger
            .events(EventKind::EntitlementNullified, 1, self.config.event_block_limit)
            .await
            .map_err(ReconcileError::Scan)?;
        let notes = self
            .ledger
            .incoming_notes(&self.holder)
            .await
            .map_err(ReconcileError::Scan)?;

        debug!(
            events = events.len(),
            notes = notes.len(),
            block_limit = self.config.event_block_limit,
            "inventory fetched"
        );

        let group = match_notes(&notes, &events, &self.config);
        if !group.is_empty() {
            info!(
                contracts = group.contract_count(),
                entropies = group.entropy_count(),
                "nullified entitlements matched"
            );
        }
        Ok(group)
    }
}
