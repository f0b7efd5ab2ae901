//! Seams to the prover, escrow registry and token contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zimburse_common::{Address, ClaimRecord, Field, LedgerError, RawEntitlement, TxReceipt};
use zimburse_receipts::{DeferredBody, Vendor, VerifiedEmail};

/// Circuit inputs in the prover's own JSON shape.
pub type CircuitInputs = serde_json::Value;

/// Body segment lengths passed alongside a deferred-body claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredLengths {
    pub amount_to_date: usize,
    pub remaining: usize,
    pub actual: usize,
}

impl From<&DeferredBody> for DeferredLengths {
    fn from(body: &DeferredBody) -> Self {
        Self {
            amount_to_date: body.amount_to_date.len(),
            remaining: body.remaining.len(),
            actual: body.actual_length,
        }
    }
}

/// Everything the escrow needs to pay out one claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub escrow: Address,
    pub holder: Address,
    pub vendor: Vendor,
    pub spot: bool,
    pub record: ClaimRecord,
    pub inputs: CircuitInputs,
    /// Commitment the pending shield note is minted under.
    pub secret_hash: Field,
    /// Deferred body capsules, in insertion order.
    pub capsules: Vec<Vec<Field>>,
    pub deferred: Option<DeferredLengths>,
}

impl ClaimSubmission {
    /// Escrow entry point for this vendor and entitlement kind.
    pub fn method(&self) -> &'static str {
        match (self.vendor, self.spot) {
            (Vendor::Linode, false) => "reimburse_linode_recurring",
            (Vendor::Linode, true) => "reimburse_linode_spot",
            (Vendor::United, false) => "reimburse_united_recurring",
            (Vendor::United, true) => "reimburse_united_spot",
        }
    }
}

/// External prover plus escrow transaction submission.
#[async_trait]
pub trait ClaimSubmitter: Send + Sync {
    /// Turn a verified email into circuit inputs for `vendor`.
    async fn prepare_inputs(
        &self,
        vendor: Vendor,
        verified: &VerifiedEmail,
    ) -> Result<CircuitInputs, LedgerError>;

    /// Send the claim transaction and wait for it to be mined.
    async fn submit_claim(&self, submission: ClaimSubmission) -> Result<TxReceipt, LedgerError>;
}

/// Token contract operations used after a claim and for balance views.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Commitment to `secret` as the token contract computes it on reveal.
    async fn secret_hash(&self, secret: &Field) -> Result<Field, LedgerError>;

    /// Make the pending shield note minted by `claim_tx` visible to `owner`.
    async fn add_pending_shield_note(
        &self,
        owner: &Address,
        amount: u128,
        secret_hash: &Field,
        claim_tx: &TxReceipt,
    ) -> Result<(), LedgerError>;

    /// Reveal `secret` and move `amount` into `owner`'s private balance.
    async fn redeem_shield(
        &self,
        owner: &Address,
        amount: u128,
        secret: &Field,
    ) -> Result<TxReceipt, LedgerError>;

    async fn balance_of_public(&self, owner: &Address) -> Result<u128, LedgerError>;

    async fn balance_of_private(&self, owner: &Address) -> Result<u128, LedgerError>;
}

/// Escrow registry and escrow view calls.
#[async_trait]
pub trait RegistryLedger: Send + Sync {
    /// Escrows `participant` holds entitlements in.
    async fn participant_escrows(&self, participant: &Address) -> Result<Vec<Address>, LedgerError>;

    /// Entitlements of `escrow` visible to `holder`.
    async fn entitlements(
        &self,
        escrow: &Address,
        holder: &Address,
    ) -> Result<Vec<RawEntitlement>, LedgerError>;

    /// Escrow title as stored on chain, NUL padded.
    async fn escrow_title(&self, escrow: &Address) -> Result<Vec<u8>, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn submission(vendor: Vendor, spot: bool) -> ClaimSubmission {
        ClaimSubmission {
            escrow: Address::ZERO,
            holder: Address::ZERO,
            vendor,
            spot,
            record: ClaimRecord {
                amount: 1,
                date: Utc::now(),
                from: String::new(),
                to: String::new(),
            },
            inputs: serde_json::Value::Null,
            secret_hash: Field::ZERO,
            capsules: Vec::new(),
            deferred: None,
        }
    }

    #[test]
    fn test_method_names() {
        assert_eq!(submission(Vendor::Linode, false).method(), "reimburse_linode_recurring");
        assert_eq!(submission(Vendor::United, true).method(), "reimburse_united_spot");
    }

    #[test]
    fn test_deferred_lengths() {
        let body = DeferredBody {
            amount_to_date: vec![0; 12],
            remaining: vec![0; 30],
            actual_length: 50,
        };
        assert_eq!(
            DeferredLengths::from(&body),
            DeferredLengths {
                amount_to_date: 12,
                remaining: 30,
                actual: 50
            }
        );
    }
}
