//! Per-contract exclusion between nullification waves and claims.
//!
//! A claim against an escrow must not run while a wave is nullifying notes of
//! that same escrow, or it would act on stale note state. Both sides take the
//! lock for every contract they touch before talking to the ledger.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use zimburse_common::Address;

type LockTable = Arc<Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>>;

/// Shared registry of per-contract async locks. Entries exist only while a
/// caller holds or waits on them.
#[derive(Clone, Default)]
pub struct ContractLocks {
    locks: LockTable,
}

/// Held locks; released on drop.
pub struct ContractGuard {
    contracts: Vec<Address>,
    guards: Vec<OwnedMutexGuard<()>>,
    table: LockTable,
}

impl ContractGuard {
    pub fn contracts(&self) -> &[Address] {
        &self.contracts
    }
}

impl Drop for ContractGuard {
    fn drop(&mut self) {
        self.guards.clear();
        let mut locks = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for contract in &self.contracts {
            if locks.get(contract).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(contract);
            }
        }
    }
}

impl ContractLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every contract in `contracts`. Locks are taken in ascending
    /// address order, so two callers with overlapping sets cannot deadlock.
    pub async fn acquire<I>(&self, contracts: I) -> ContractGuard
    where
        I: IntoIterator<Item = Address>,
    {
        let ordered: BTreeSet<Address> = contracts.into_iter().collect();
        let handles: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            ordered
                .iter()
                .map(|contract| Arc::clone(locks.entry(*contract).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }

        ContractGuard {
            contracts: ordered.into_iter().collect(),
            guards,
            table: Arc::clone(&self.locks),
        }
    }

    /// Whether `contract` is currently held.
    pub fn is_locked(&self, contract: &Address) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .get(contract)
            .map_or(false, |lock| lock.try_lock().is_err())
    }
}
