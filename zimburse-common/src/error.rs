//! Error types shared across the z-imburse crates.

use thiserror::Error;

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding shared domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Monetary text could not be normalized to micro-units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount does not fit the target integer width.
    #[error("amount overflow: {0}")]
    AmountOverflow(String),

    /// Hex text is not a valid 32-byte value.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// Failure reported by an external ledger (PXE, node, token contract).
///
/// The ledger owns its own error taxonomy; this only keeps enough shape to
/// tell transport problems apart from rejected calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport or RPC failure reaching the ledger.
    #[error("ledger rpc error: {0}")]
    Rpc(String),

    /// The ledger executed the call and rejected it (assertion, limit, nonce).
    #[error("ledger rejected call: {0}")]
    Rejected(String),

    /// The ledger answered with data this client cannot decode.
    #[error("ledger decode error: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::Rpc(_) => "LEDGER_RPC",
            LedgerError::Rejected(_) => "LEDGER_REJECTED",
            LedgerError::Decode(_) => "LEDGER_DECODE",
        }
    }

    /// Transport failures may succeed when the caller tries again; rejections will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Rpc(_))
    }
}

impl From<Error> for LedgerError {
    fn from(err: Error) -> Self {
        LedgerError::Decode(err.to_string())
    }
}
