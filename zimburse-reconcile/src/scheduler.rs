//! Nullification batch scheduler.
//!
//! Two call-shape limits apply: every `nullify_entitlements` call carries
//! exactly [`NULLIFY_SLOTS`] entropies, and one submission carries at most
//! [`MAX_CALLS_PER_WAVE`] calls. Requests are sliced per contract, flattened,
//! chunked into waves, and the waves are submitted strictly one after another.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use zimburse_common::{Address, Field, TxReceipt};

use crate::error::ReconciliationError;
use crate::ledger::{NullifyRequest, NullifySubmitter, MAX_CALLS_PER_WAVE, NULLIFY_SLOTS};
use crate::locks::ContractLocks;
use crate::scanner::MatchedGroup;

/// Calls submitted together in one atomic batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Wave {
    pub index: usize,
    pub requests: Vec<NullifyRequest>,
}

impl Wave {
    /// Contracts addressed by this wave, first-seen order, deduplicated.
    pub fn contracts(&self) -> Vec<Address> {
        let mut contracts: Vec<Address> = Vec::new();
        for request in &self.requests {
            if !contracts.contains(&request.contract) {
                contracts.push(request.contract);
            }
        }
        contracts
    }
}

/// Slice one contract's entropies into zero-padded requests.
pub fn slice_entropies(contract: Address, entropies: &[Field]) -> Vec<NullifyRequest> {
    entropies
        .chunks(NULLIFY_SLOTS)
        .map(|chunk| {
            let mut slots = [Field::ZERO; NULLIFY_SLOTS];
            slots[..chunk.len()].copy_from_slice(chunk);
            NullifyRequest {
                contract,
                entropies: slots,
            }
        })
        .collect()
}

/// Requests for every contract in the group, flattened in contract order with
/// each contract's slices kept in order.
pub fn build_requests(group: &MatchedGroup) -> Vec<NullifyRequest> {
    group
        .iter()
        .flat_map(|(contract, entropies)| slice_entropies(*contract, entropies))
        .collect()
}

/// Chunk requests into waves of at most [`MAX_CALLS_PER_WAVE`].
pub fn plan_waves(requests: Vec<NullifyRequest>) -> Vec<Wave> {
    requests
        .chunks(MAX_CALLS_PER_WAVE)
        .enumerate()
        .map(|(index, chunk)| Wave {
            index,
            requests: chunk.to_vec(),
        })
        .collect()
}

/// Result of a completed schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleOutcome {
    pub requests: usize,
    pub waves: usize,
    pub receipts: Vec<TxReceipt>,
}

/// Submits planned waves through an injected submitter.
#[derive(Clone)]
pub struct BatchScheduler {
    submitter: Arc<dyn NullifySubmitter>,
    locks: ContractLocks,
}

impl BatchScheduler {
    pub fn new(submitter: Arc<dyn NullifySubmitter>, locks: ContractLocks) -> Self {
        Self { submitter, locks }
    }

    /// Nullify everything in `group`. Stops at the first failed wave; earlier
    /// waves stay confirmed.
    pub async fn run(&self, group: &MatchedGroup) -> Result<ScheduleOutcome, ReconciliationError> {
        if group.is_empty() {
            return Ok(ScheduleOutcome::default());
        }

        let requests = build_requests(group);
        let request_count = requests.len();
        let waves = plan_waves(requests);
        info!(requests = request_count, waves = waves.len(), "scheduling nullification waves");

        let mut receipts = Vec::with_capacity(waves.len());
        for wave in &waves {
            receipts.push(self.submit(wave).await?);
        }

        Ok(ScheduleOutcome {
            requests: request_count,
            waves: waves.len(),
            receipts,
        })
    }

    async fn submit(&self, wave: &Wave) -> Result<TxReceipt, ReconciliationError> {
        let contracts = wave.contracts();
        let _guard = self.locks.acquire(contracts.iter().copied()).await;

        debug!(wave = wave.index, calls = wave.requests.len(), contracts = contracts.len(), "submitting wave");
        match self.submitter.submit_wave(&wave.requests).await {
            Ok(receipt) => {
                debug!(wave = wave.index, tx = %receipt.tx_hash, block = receipt.block_number, "wave confirmed");
                Ok(receipt)
            }
            Err(cause) => {
                warn!(wave = wave.index, error = %cause, "nullification wave failed");
                Err(ReconciliationError {
                    wave: wave.index,
                    contracts,
                    cause,
                })
            }
        }
    }
}
