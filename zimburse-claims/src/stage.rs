//! Claim lifecycle and per-attempt history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zimburse_common::{Address, ClaimRecord, TxReceipt};

use crate::error::ClaimError;
use crate::secret::ClaimSecret;

// ═══════════════════════════════════════════════════════════════════════════════
// STAGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Stage of a claim attempt.
///
/// ```text
/// Idle → Extracting → Verifying → Submitting → Committing → Redeeming → Done
///            └────────────┴────────────┴────────────┴────────────┴──► Failed
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStage {
    /// Created, nothing done yet.
    Idle,
    /// Verifying the email and running the vendor strategy.
    Extracting,
    /// Generating circuit inputs with the external prover.
    Verifying,
    /// Claim transaction with the secret hash sent to the escrow.
    Submitting,
    /// Pending shield note registered for the confirmed claim.
    Committing,
    /// Secret revealed to the token contract.
    Redeeming,
    /// Funds are in the private balance.
    Done,
    /// Stopped; the next attempt starts over from extraction.
    Failed { reason: String },
}

impl ClaimStage {
    pub fn description(&self) -> &str {
        match self {
            Self::Idle => "Waiting to start",
            Self::Extracting => "Extracting receipt",
            Self::Verifying => "Generating proof inputs",
            Self::Submitting => "Submitting claim",
            Self::Committing => "Registering shielded note",
            Self::Redeeming => "Redeeming to private balance",
            Self::Done => "Claim redeemed",
            Self::Failed { reason } => reason,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    /// Successor on the happy path.
    pub fn next(&self) -> Option<ClaimStage> {
        match self {
            Self::Idle => Some(Self::Extracting),
            Self::Extracting => Some(Self::Verifying),
            Self::Verifying => Some(Self::Submitting),
            Self::Submitting => Some(Self::Committing),
            Self::Committing => Some(Self::Redeeming),
            Self::Redeeming => Some(Self::Done),
            Self::Done | Self::Failed { .. } => None,
        }
    }

    /// Short stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Verifying => "verifying",
            Self::Submitting => "submitting",
            Self::Committing => "committing",
            Self::Redeeming => "redeeming",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for ClaimStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTEMPTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A stage entered at a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub stage: ClaimStage,
    pub at: DateTime<Utc>,
}

/// One run of the claim state machine.
///
/// The secret stays here from submission until redemption succeeds, so an
/// attempt that stops between commit and reveal can still be redeemed by hand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimAttempt {
    pub escrow: Address,
    pub verifier_id: u32,
    pub stage: ClaimStage,
    pub transitions: Vec<StageTransition>,
    pub record: Option<ClaimRecord>,
    pub secret: Option<ClaimSecret>,
    pub claim_tx: Option<TxReceipt>,
    pub redeem_tx: Option<TxReceipt>,
}

impl ClaimAttempt {
    pub fn new(escrow: Address, verifier_id: u32) -> Self {
        Self {
            escrow,
            verifier_id,
            stage: ClaimStage::Idle,
            transitions: vec![StageTransition {
                stage: ClaimStage::Idle,
                at: Utc::now(),
            }],
            record: None,
            secret: None,
            claim_tx: None,
            redeem_tx: None,
        }
    }

    /// Move to `next`, which must be the happy-path successor.
    pub fn advance(&mut self, next: ClaimStage) -> Result<(), ClaimError> {
        if self.stage.next().as_ref() != Some(&next) {
            return Err(ClaimError::InvalidTransition {
                from: self.stage.name(),
                to: next.name(),
            });
        }
        if next == ClaimStage::Done {
            self.secret = None;
        }
        self.enter(next);
        Ok(())
    }

    /// Stop the attempt. No-op once terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.stage.is_terminal() {
            return;
        }
        self.enter(ClaimStage::Failed {
            reason: reason.into(),
        });
    }

    /// Stage the attempt was in before failing, if it failed.
    pub fn failed_at(&self) -> Option<&ClaimStage> {
        if !matches!(self.stage, ClaimStage::Failed { .. }) {
            return None;
        }
        self.transitions
            .iter()
            .rev()
            .nth(1)
            .map(|transition| &transition.stage)
    }

    /// Committed but never revealed.
    pub fn has_unredeemed_secret(&self) -> bool {
        self.claim_tx.is_some() && self.secret.is_some()
    }

    fn enter(&mut self, stage: ClaimStage) {
        self.transitions.push(StageTransition {
            stage: stage.clone(),
            at: Utc::now(),
        });
        self.stage = stage;
    }
}
