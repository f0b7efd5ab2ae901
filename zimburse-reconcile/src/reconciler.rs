//! Reconciliation pass: scan, then schedule.
//!
//! Triggered explicitly, either once via [`Reconciler::reconcile`] or on a
//! timer via [`Reconciler::run_periodic`]. A failed pass changes nothing
//! locally, so the next tick is the retry.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use zimburse_common::TxReceipt;

use crate::error::Result;
use crate::scanner::{MatchedGroup, NoteInventoryScanner};
use crate::scheduler::BatchScheduler;

/// Summary of one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub matched: MatchedGroup,
    pub requests: usize,
    pub waves: usize,
    pub receipts: Vec<TxReceipt>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Scanner and scheduler wired together.
#[derive(Clone)]
pub struct Reconciler {
    scanner: NoteInventoryScanner,
    scheduler: BatchScheduler,
}

impl Reconciler {
    pub fn new(scanner: NoteInventoryScanner, scheduler: BatchScheduler) -> Self {
        Self { scanner, scheduler }
    }

    /// Scan only, without submitting anything.
    pub async fn scan(&self) -> Result<MatchedGroup> {
        self.scanner.scan().await
    }

    /// One full pass. An empty match is a no-op.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let matched = self.scanner.scan().await?;
        if matched.is_empty() {
            debug!("no nullified entitlements to reconcile");
            return Ok(ReconcileReport::default());
        }

        let outcome = self.scheduler.run(&matched).await?;
        info!(
            entropies = matched.entropy_count(),
            waves = outcome.waves,
            "reconciliation pass complete"
        );

        Ok(ReconcileReport {
            matched,
            requests: outcome.requests,
            waves: outcome.waves,
            receipts: outcome.receipts,
        })
    }

    /// Reconcile every `interval` until `shutdown` resolves. Pass failures are
    /// logged and the loop continues. Returns the number of passes attempted.
    pub async fn run_periodic<F>(&self, interval: Duration, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut passes = 0usize;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(passes, "reconciliation loop stopped");
                    return passes;
                }
                _ = ticker.tick() => {
                    passes += 1;
                    if let Err(err) = self.reconcile().await {
                        error!(
                            pass = passes,
                            code = err.error_code(),
                            retryable = err.is_retryable(),
                            error = %err,
                            "reconciliation pass failed"
                        );
                    }
                }
            }
        }
    }
}
