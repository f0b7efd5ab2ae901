//! Error types for receipt extraction.

use thiserror::Error;

use crate::vendor::Vendor;

/// A receipt did not contain what its vendor strategy needs.
///
/// Every extraction failure is normalized into this one shape: which vendor
/// was being parsed and which anchor (or anchored value) was missing. It is
/// terminal for the claim attempt; the user has to supply a different email.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{vendor} receipt is missing {missing_anchor}")]
pub struct ParseError {
    pub vendor: Vendor,
    pub missing_anchor: String,
}

impl ParseError {
    pub fn new(vendor: Vendor, missing_anchor: impl Into<String>) -> Self {
        Self {
            vendor,
            missing_anchor: missing_anchor.into(),
        }
    }
}

/// The external signature verifier refused the email.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// DKIM signature or key lookup failed.
    #[error("dkim verification failed: {0}")]
    Signature(String),

    /// Circuit inputs could not be generated from a verified email.
    #[error("verifier inputs unavailable: {0}")]
    Inputs(String),

    /// The verifier service could not be reached.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Failure of one pass through the extraction engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// No vendor strategy is registered for the verifier id.
    #[error("no receipt vendor for verifier id {0}")]
    UnknownVerifier(u32),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ExtractError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExtractError::UnknownVerifier(_) => "UNKNOWN_VERIFIER",
            ExtractError::Verification(_) => "VERIFICATION_FAILED",
            ExtractError::Parse(_) => "RECEIPT_PARSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(Vendor::Linode, "anchor `date:`");
        assert_eq!(err.to_string(), "Linode receipt is missing anchor `date:`");
    }

    #[test]
    fn test_extract_error_codes() {
        assert_eq!(ExtractError::UnknownVerifier(9).error_code(), "UNKNOWN_VERIFIER");
        let parse: ExtractError = ParseError::new(Vendor::United, "anchor `Total:`").into();
        assert_eq!(parse.error_code(), "RECEIPT_PARSE");
    }
}
