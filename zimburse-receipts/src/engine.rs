//! Receipt extraction engine.
//!
//! Resolves the vendor strategy from the verifier id, runs the external
//! verifier once, and hands its output to the strategy. Nothing is retried:
//! any failure is terminal for the claim attempt.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ExtractError, ParseError};
use crate::vendor::{ExtractedReceipt, Vendor};
use crate::verifier::{EmailVerifier, VerifiedEmail, VerifyOptions};

/// Everything a successful extraction produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub receipt: ExtractedReceipt,
    /// Verifier output, kept for proof generation.
    pub verified: VerifiedEmail,
}

/// Engine bound to one verifier service.
#[derive(Clone)]
pub struct ReceiptEngine {
    verifier: Arc<dyn EmailVerifier>,
}

impl ReceiptEngine {
    pub fn new(verifier: Arc<dyn EmailVerifier>) -> Self {
        Self { verifier }
    }

    /// Verify `raw_email` and extract it with the strategy for `verifier_id`.
    pub async fn extract(&self, verifier_id: u32, raw_email: &[u8]) -> Result<Extraction, ExtractError> {
        let vendor = Vendor::from_verifier_id(verifier_id).ok_or(ExtractError::UnknownVerifier(verifier_id))?;

        debug!(%vendor, bytes = raw_email.len(), "verifying receipt email");
        let verified = self
            .verifier
            .verify(raw_email, VerifyOptions::for_vendor(vendor))
            .await
            .map_err(|err| {
                warn!(%vendor, error = %err, "receipt verification failed");
                err
            })?;

        let receipt = extract_verified(vendor, &verified).map_err(|err| {
            warn!(%vendor, missing = %err.missing_anchor, "receipt extraction failed");
            err
        })?;

        info!(
            %vendor,
            amount = %receipt.record.amount_display(),
            date = %receipt.record.date,
            "receipt extracted"
        );
        Ok(Extraction { receipt, verified })
    }
}

/// Pure extraction over already-verified inputs.
pub fn extract_verified(vendor: Vendor, verified: &VerifiedEmail) -> Result<ExtractedReceipt, ParseError> {
    vendor.extract_receipt(
        &verified.decoded_body,
        &verified.header,
        verified.from_range,
        verified.to_range,
    )
}
