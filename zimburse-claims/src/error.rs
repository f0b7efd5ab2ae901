//! Error types for the claim orchestrator.

use thiserror::Error;
use zimburse_common::{Address, Field, LedgerError};
use zimburse_receipts::{ExtractError, ParseError, Vendor, VerificationError};

/// Result type alias for claim operations.
pub type Result<T> = std::result::Result<T, ClaimError>;

/// Why a claim attempt stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The receipt is missing something its vendor strategy needs.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The email failed external verification.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// No strategy exists for the entitlement's verifier.
    #[error("no receipt vendor for verifier id {0}")]
    UnknownVerifier(u32),

    /// The prover could not produce circuit inputs.
    #[error("{vendor} proof inputs failed: {cause}")]
    Proving { vendor: Vendor, cause: LedgerError },

    /// The escrow rejected or never confirmed the claim transaction.
    #[error("claim against escrow {escrow} failed: {cause}")]
    Submission { escrow: Address, cause: LedgerError },

    /// The claim confirmed but the shielded amount was not redeemed.
    #[error("redemption after claim tx {claim_tx} failed at {stage}: {cause}")]
    Redemption {
        claim_tx: Field,
        stage: &'static str,
        cause: LedgerError,
    },

    /// Listing escrows, entitlements or balances failed.
    #[error("ledger query failed: {0}")]
    Query(LedgerError),

    /// The state machine was driven out of order.
    #[error("invalid claim transition {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl From<ExtractError> for ClaimError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnknownVerifier(id) => ClaimError::UnknownVerifier(id),
            ExtractError::Verification(err) => ClaimError::Verification(err),
            ExtractError::Parse(err) => ClaimError::Parse(err),
        }
    }
}

impl ClaimError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClaimError::Parse(_) => "RECEIPT_PARSE",
            ClaimError::Verification(_) => "VERIFICATION_FAILED",
            ClaimError::UnknownVerifier(_) => "UNKNOWN_VERIFIER",
            ClaimError::Proving { .. } => "PROVING_FAILED",
            ClaimError::Submission { .. } => "SUBMISSION_FAILED",
            ClaimError::Redemption { .. } => "REDEMPTION_FAILED",
            ClaimError::Query(_) => "QUERY_FAILED",
            ClaimError::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    /// Whether a fresh attempt with the same email could succeed. Receipt and
    /// verification failures need a different email.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClaimError::Parse(_)
            | ClaimError::Verification(_)
            | ClaimError::UnknownVerifier(_)
            | ClaimError::InvalidTransition { .. } => false,
            ClaimError::Proving { cause, .. } | ClaimError::Query(cause) => cause.is_transient(),
            ClaimError::Submission { .. } | ClaimError::Redemption { .. } => true,
        }
    }
}
