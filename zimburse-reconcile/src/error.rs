//! Error types for the reconciliation pass.

use thiserror::Error;
use zimburse_common::{Address, LedgerError};

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// A nullification wave was rejected or never confirmed.
///
/// Non-terminal: the notes stay un-nullified and the next scan picks them up
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("nullification wave {wave} failed for {} contract(s): {cause}", contracts.len())]
pub struct ReconciliationError {
    /// Position of the failed wave in the pass.
    pub wave: usize,
    /// Contracts addressed by the failed wave, in request order, deduplicated.
    pub contracts: Vec<Address>,
    pub cause: LedgerError,
}

/// Failure of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Events or notes could not be read.
    #[error("inventory scan failed: {0}")]
    Scan(LedgerError),

    #[error(transparent)]
    Wave(#[from] ReconciliationError),
}

impl ReconcileError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::Scan(_) => "SCAN_FAILED",
            ReconcileError::Wave(_) => "WAVE_FAILED",
        }
    }

    /// Whether re-running the pass might succeed. Every failure leaves state
    /// untouched, so this only reflects whether the ledger cause looks transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Scan(cause) => cause.is_transient(),
            ReconcileError::Wave(err) => err.cause.is_transient(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let scan = ReconcileError::Scan(LedgerError::Rpc("down".into()));
        assert_eq!(scan.error_code(), "SCAN_FAILED");
        assert!(scan.is_retryable());

        let wave: ReconcileError = ReconciliationError {
            wave: 1,
            contracts: vec![Address::ZERO],
            cause: LedgerError::Rejected("nonce".into()),
        }
        .into();
        assert_eq!(wave.error_code(), "WAVE_FAILED");
        assert!(!wave.is_retryable());
        assert!(wave.to_string().contains("wave 1"));
    }
}
