//! Seam to the external DKIM verifier.
//!
//! Signature checking and circuit-input generation are owned by an external
//! library or service; this crate only consumes its output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zimburse_common::ByteRange;

use crate::error::VerificationError;
use crate::vendor::Vendor;

/// Options forwarded to the verifier's input generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOptions {
    pub max_body_length: usize,
    pub remove_soft_line_breaks: bool,
    pub extract_from: bool,
    pub extract_to: bool,
}

impl VerifyOptions {
    pub fn for_vendor(vendor: Vendor) -> Self {
        Self {
            max_body_length: vendor.max_body_length(),
            remove_soft_line_breaks: true,
            extract_from: true,
            extract_to: true,
        }
    }
}

/// Verified email, ready for extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedEmail {
    /// Body with soft line breaks removed.
    pub decoded_body: Vec<u8>,
    /// Canonicalized signed header.
    pub header: Vec<u8>,
    #[serde(default)]
    pub from_range: Option<ByteRange>,
    #[serde(default)]
    pub to_range: Option<ByteRange>,
}

/// External email signature verifier.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    /// Verify the raw `.eml` bytes and prepare extraction inputs.
    async fn verify(
        &self,
        raw_email: &[u8],
        options: VerifyOptions,
    ) -> Result<VerifiedEmail, VerificationError>;
}
