//! Claim orchestrator.
//!
//! Drives one claim through extraction, proof inputs, escrow submission and
//! shielded redemption. Only one claim per holder is in flight at a time, and
//! the escrow's contract lock is held while the claim transaction is pending
//! so it never overlaps a nullification wave on the same escrow.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zimburse_common::{Address, ClaimRecord, Entitlement, TxReceipt};
use zimburse_receipts::{deferred_capsules, Extraction, ReceiptEngine};
use zimburse_reconcile::ContractLocks;

use crate::backend::{ClaimSubmission, ClaimSubmitter, DeferredLengths, TokenLedger};
use crate::error::{ClaimError, Result};
use crate::secret::{generate_secret, ClaimSecret};
use crate::stage::{ClaimAttempt, ClaimStage};

/// A redeemed claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    pub record: ClaimRecord,
    pub claim_tx: TxReceipt,
    pub redeem_tx: TxReceipt,
}

/// Claim state machine bound to one holder.
#[derive(Clone)]
pub struct ClaimOrchestrator {
    holder: Address,
    engine: ReceiptEngine,
    submitter: Arc<dyn ClaimSubmitter>,
    token: Arc<dyn TokenLedger>,
    locks: ContractLocks,
    in_flight: Arc<Mutex<()>>,
    history: Arc<RwLock<Vec<ClaimAttempt>>>,
}

impl ClaimOrchestrator {
    pub fn new(
        holder: Address,
        engine: ReceiptEngine,
        submitter: Arc<dyn ClaimSubmitter>,
        token: Arc<dyn TokenLedger>,
        locks: ContractLocks,
    ) -> Self {
        Self {
            holder,
            engine,
            submitter,
            token,
            locks,
            in_flight: Arc::new(Mutex::new(())),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Claim against `entitlement` with the raw `.eml` bytes of a receipt.
    ///
    /// Waits if another claim for this holder is running. The attempt is
    /// appended to the history whether it succeeds or not.
    pub async fn claim(&self, entitlement: &Entitlement, raw_email: &[u8]) -> Result<ClaimReceipt> {
        let _in_flight = self.in_flight.lock().await;

        let mut attempt = ClaimAttempt::new(entitlement.escrow, entitlement.verifier_id);
        let result = self.drive(&mut attempt, entitlement, raw_email).await;

        if let Err(err) = &result {
            let stage = attempt.stage.name();
            attempt.fail(err.to_string());
            warn!(
                escrow = %entitlement.escrow.truncated(),
                stage,
                code = err.error_code(),
                unredeemed = attempt.has_unredeemed_secret(),
                error = %err,
                "claim failed"
            );
        }
        self.history.write().await.push(attempt);
        result
    }

    /// Every attempt so far, oldest first.
    pub async fn attempts(&self) -> Vec<ClaimAttempt> {
        self.history.read().await.clone()
    }

    /// Most recent attempt.
    pub async fn last_attempt(&self) -> Option<ClaimAttempt> {
        self.history.read().await.last().cloned()
    }

    async fn drive(
        &self,
        attempt: &mut ClaimAttempt,
        entitlement: &Entitlement,
        raw_email: &[u8],
    ) -> Result<ClaimReceipt> {
        let escrow = entitlement.escrow;

        attempt.advance(ClaimStage::Extracting)?;
        let Extraction { receipt, verified } = self.engine.extract(entitlement.verifier_id, raw_email).await?;
        if !entitlement.covers(&receipt.record) {
            // The escrow decides; submit anyway and let it reject.
            warn!(
                escrow = %escrow.truncated(),
                amount = %receipt.record.amount_display(),
                max = entitlement.max_value,
                "receipt is outside the entitlement"
            );
        }
        attempt.record = Some(receipt.record.clone());

        attempt.advance(ClaimStage::Verifying)?;
        let inputs = self
            .submitter
            .prepare_inputs(receipt.vendor, &verified)
            .await
            .map_err(|cause| ClaimError::Proving {
                vendor: receipt.vendor,
                cause,
            })?;

        attempt.advance(ClaimStage::Submitting)?;
        let secret = generate_secret();
        let secret_hash = self
            .token
            .secret_hash(&secret)
            .await
            .map_err(|cause| ClaimError::Submission { escrow, cause })?;
        let secret = ClaimSecret::new(secret, secret_hash);
        attempt.secret = Some(secret.clone());

        let amount = receipt.record.amount;
        let submission = ClaimSubmission {
            escrow,
            holder: self.holder,
            vendor: receipt.vendor,
            spot: entitlement.spot,
            record: receipt.record,
            inputs,
            secret_hash: *secret.hash(),
            capsules: receipt.deferred.as_ref().map(deferred_capsules).unwrap_or_default(),
            deferred: receipt.deferred.as_ref().map(DeferredLengths::from),
        };
        debug!(
            escrow = %escrow.truncated(),
            method = submission.method(),
            capsules = submission.capsules.len(),
            "submitting claim"
        );
        let record = submission.record.clone();
        let claim_tx = {
            let _escrow_lock = self.locks.acquire([escrow]).await;
            self.submitter
                .submit_claim(submission)
                .await
                .map_err(|cause| ClaimError::Submission { escrow, cause })?
        };
        attempt.claim_tx = Some(claim_tx.clone());
        info!(escrow = %escrow.truncated(), tx = %claim_tx.tx_hash, "claim confirmed");

        attempt.advance(ClaimStage::Committing)?;
        self.token
            .add_pending_shield_note(&self.holder, amount, secret.hash(), &claim_tx)
            .await
            .map_err(|cause| ClaimError::Redemption {
                claim_tx: claim_tx.tx_hash,
                stage: "commit",
                cause,
            })?;

        attempt.advance(ClaimStage::Redeeming)?;
        let redeem_tx = self
            .token
            .redeem_shield(&self.holder, amount, secret.secret())
            .await
            .map_err(|cause| ClaimError::Redemption {
                claim_tx: claim_tx.tx_hash,
                stage: "reveal",
                cause,
            })?;
        attempt.redeem_tx = Some(redeem_tx.clone());

        attempt.advance(ClaimStage::Done)?;
        info!(
            escrow = %escrow.truncated(),
            amount = %record.amount_display(),
            "claim redeemed to private balance"
        );

        Ok(ClaimReceipt {
            record,
            claim_tx,
            redeem_tx,
        })
    }
}
