//! Receipt vendors and their extraction strategies.

use std::fmt;

use serde::{Deserialize, Serialize};
use zimburse_common::{ByteRange, ClaimRecord};

use crate::error::ParseError;
use crate::united::DeferredBody;
use crate::{linode, united};

/// Closed set of receipt vendors with an on-chain verifier.
///
/// Adding a vendor means adding a variant here and its strategy module; every
/// dispatch below is an exhaustive match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    /// Linode billing receipt, recurring entitlements.
    Linode,
    /// United Airlines e-ticket receipt, spot entitlements.
    United,
}

impl Vendor {
    pub const ALL: [Vendor; 2] = [Vendor::Linode, Vendor::United];

    /// Verifier id registered with the escrow registry.
    pub fn verifier_id(self) -> u32 {
        match self {
            Vendor::Linode => 2,
            Vendor::United => 5,
        }
    }

    pub fn from_verifier_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|vendor| vendor.verifier_id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Vendor::Linode => "Linode",
            Vendor::United => "United",
        }
    }

    /// Title shown for entitlements bound to this vendor's verifier.
    pub fn entitlement_title(self) -> &'static str {
        match self {
            Vendor::Linode => "Linode Billing",
            Vendor::United => "United Flight",
        }
    }

    /// Largest decoded body the vendor's circuit accepts, in bytes.
    pub fn max_body_length(self) -> usize {
        match self {
            Vendor::Linode => 832,
            Vendor::United => 58_560,
        }
    }

    /// Extract the canonical claim record.
    pub fn extract(
        self,
        body: &[u8],
        header: &[u8],
        from_range: Option<ByteRange>,
        to_range: Option<ByteRange>,
    ) -> Result<ClaimRecord, ParseError> {
        match self {
            Vendor::Linode => linode::extract(body, header, from_range, to_range),
            Vendor::United => united::extract(body, header, from_range, to_range),
        }
    }

    /// Extract the record together with any vendor-specific prover inputs.
    pub fn extract_receipt(
        self,
        body: &[u8],
        header: &[u8],
        from_range: Option<ByteRange>,
        to_range: Option<ByteRange>,
    ) -> Result<ExtractedReceipt, ParseError> {
        match self {
            Vendor::Linode => Ok(ExtractedReceipt {
                vendor: self,
                record: linode::extract(body, header, from_range, to_range)?,
                deferred: None,
            }),
            Vendor::United => {
                let receipt = united::extract_with_deferred(body, header, from_range, to_range)?;
                Ok(ExtractedReceipt {
                    vendor: self,
                    record: receipt.record,
                    deferred: Some(receipt.deferred),
                })
            }
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of one successful extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedReceipt {
    pub vendor: Vendor,
    pub record: ClaimRecord,
    /// Deferred body segments, for vendors whose circuit reads the body in pieces.
    pub deferred: Option<DeferredBody>,
}
