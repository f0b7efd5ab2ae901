//! End-to-end claim tests against in-memory escrow and token contracts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use zimburse_common::{
    Address, ByteRange, Entitlement, Field, LedgerError, RawEntitlement, TokenBalance, TxReceipt, U128Limbs,
};
use zimburse_claims::{
    CircuitInputs, ClaimError, ClaimOrchestrator, ClaimStage, ClaimSubmission,
    ClaimSubmitter, EntitlementDirectory, RegistryLedger, TokenLedger,
};
use zimburse_receipts::{EmailVerifier, ReceiptEngine, Vendor, VerificationError, VerifiedEmail, VerifyOptions};
use zimburse_reconcile::ContractLocks;

// ═══════════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

const LINODE_HEADER: &str = "from:Linode <billing@linode.com>\r\nto:holder@example.com\r\ndate:Fri, 06 Sep 2024 18:03:12 +0000\r\nsubject:Linode.com: Payment Receipt";
const TOKEN_HASH_DOMAIN: &[u8] = b"memory_token_secret_hash";
const UNITED_HEADER: &str = "from:United Airlines <receipts@united.com>\r\nto:holder@example.com\r\n";

fn linode_email(amount: &str) -> Vec<u8> {
    format!(
        "This is your receipt of payment against your credit card in the amount of ${amount}.\r\n\r\nThank you."
    )
    .into_bytes()
}

fn united_email() -> Vec<u8> {
    concat!(
        "<table><tr><td>Total:</td><td>1,717.85 USD</td></tr>",
        "<tr><td>2nd bag weight and dimensions</td>",
        "<td>Tue, Sep 03, 2024<br/>Denver, CO, US (DEN)<br/></td></tr></table>"
    )
    .as_bytes()
    .to_vec()
}

fn holder() -> Address {
    Address(Field::from_u64(0xabcd))
}

fn escrow() -> Address {
    Address(Field::from_u64(0xe5c0))
}

fn entitlement(vendor: Vendor, max_value: u128, spot: bool) -> Entitlement {
    Entitlement::from_raw(
        escrow(),
        0,
        RawEntitlement {
            max_value: U128Limbs::from_u128(max_value),
            verifier_id: vendor.verifier_id(),
            spot,
            date_start: None,
            date_end: None,
        },
    )
}

/// Treats the raw email as the decoded body and picks the vendor header from
/// the body limit it is asked for.
struct PassthroughVerifier;

#[async_trait]
impl EmailVerifier for PassthroughVerifier {
    async fn verify(
        &self,
        raw_email: &[u8],
        options: VerifyOptions,
    ) -> Result<VerifiedEmail, VerificationError> {
        let (header, from_range) = if options.max_body_length == Vendor::Linode.max_body_length() {
            (LINODE_HEADER, ByteRange::new(13, 18))
        } else {
            (UNITED_HEADER, ByteRange::new(22, 19))
        };
        Ok(VerifiedEmail {
            decoded_body: raw_email.to_vec(),
            header: header.as_bytes().to_vec(),
            from_range: Some(from_range),
            to_range: Some(ByteRange::new(if header == LINODE_HEADER { 37 } else { 47 }, 18)),
        })
    }
}

/// Escrow, token and registry in one place.
#[derive(Default)]
struct MemoryChain {
    max_values: Mutex<HashMap<Address, u128>>,
    submissions: Mutex<Vec<ClaimSubmission>>,
    pending_notes: Mutex<Vec<(Address, u128, Field)>>,
    private_balances: Mutex<HashMap<Address, u128>>,
    fail_reveal: Mutex<bool>,
    fail_hash: Mutex<bool>,
    block: Mutex<u64>,
}

impl MemoryChain {
    fn new(max_value: u128) -> Arc<Self> {
        let chain = Arc::new(Self::default());
        chain.max_values.lock().unwrap().insert(escrow(), max_value);
        chain
    }

    fn mine(&self) -> TxReceipt {
        let mut block = self.block.lock().unwrap();
        *block += 1;
        TxReceipt {
            tx_hash: Field::from_u64(0x1000 + *block),
            block_number: *block,
        }
    }

    /// The token contract's own commitment scheme.
    fn hash_secret(secret: &Field) -> Field {
        let mut hasher = blake3::Hasher::new();
        hasher.update(TOKEN_HASH_DOMAIN);
        hasher.update(secret.as_bytes());
        let mut bytes = *hasher.finalize().as_bytes();
        bytes[0] = 0;
        Field(bytes)
    }

    fn private_balance(&self) -> u128 {
        self.private_balances.lock().unwrap().get(&holder()).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ClaimSubmitter for MemoryChain {
    async fn prepare_inputs(
        &self,
        vendor: Vendor,
        verified: &VerifiedEmail,
    ) -> Result<CircuitInputs, LedgerError> {
        Ok(serde_json::json!({
            "vendor": vendor.name(),
            "body_length": verified.decoded_body.len(),
        }))
    }

    async fn submit_claim(&self, submission: ClaimSubmission) -> Result<TxReceipt, LedgerError> {
        let max = self.max_values.lock().unwrap().get(&submission.escrow).copied();
        match max {
            None => return Err(LedgerError::Rejected("unknown escrow".into())),
            Some(max) if submission.record.amount > max => {
                return Err(LedgerError::Rejected("amount exceeds max_value".into()))
            }
            Some(_) => {}
        }
        self.submissions.lock().unwrap().push(submission);
        Ok(self.mine())
    }
}

#[async_trait]
impl TokenLedger for MemoryChain {
    async fn secret_hash(&self, secret: &Field) -> Result<Field, LedgerError> {
        if *self.fail_hash.lock().unwrap() {
            return Err(LedgerError::Rpc("token unavailable".into()));
        }
        Ok(Self::hash_secret(secret))
    }

    async fn add_pending_shield_note(
        &self,
        owner: &Address,
        amount: u128,
        secret_hash: &Field,
        _claim_tx: &TxReceipt,
    ) -> Result<(), LedgerError> {
        self.pending_notes.lock().unwrap().push((*owner, amount, *secret_hash));
        Ok(())
    }

    async fn redeem_shield(
        &self,
        owner: &Address,
        amount: u128,
        secret: &Field,
    ) -> Result<TxReceipt, LedgerError> {
        if *self.fail_reveal.lock().unwrap() {
            return Err(LedgerError::Rpc("connection reset".into()));
        }
        let hash = Self::hash_secret(secret);
        let mut notes = self.pending_notes.lock().unwrap();
        let position = notes
            .iter()
            .position(|note| *note == (*owner, amount, hash))
            .ok_or_else(|| LedgerError::Rejected("no pending shield note".into()))?;
        notes.remove(position);
        drop(notes);

        *self.private_balances.lock().unwrap().entry(*owner).or_default() += amount;
        Ok(self.mine())
    }

    async fn balance_of_public(&self, _owner: &Address) -> Result<u128, LedgerError> {
        Ok(5_000_000)
    }

    async fn balance_of_private(&self, owner: &Address) -> Result<u128, LedgerError> {
        Ok(self.private_balances.lock().unwrap().get(owner).copied().unwrap_or(0))
    }
}

#[async_trait]
impl RegistryLedger for MemoryChain {
    async fn participant_escrows(&self, _participant: &Address) -> Result<Vec<Address>, LedgerError> {
        let mut escrows: Vec<Address> = self.max_values.lock().unwrap().keys().copied().collect();
        escrows.sort();
        Ok(escrows)
    }

    async fn entitlements(
        &self,
        escrow: &Address,
        _holder: &Address,
    ) -> Result<Vec<RawEntitlement>, LedgerError> {
        let max = self.max_values.lock().unwrap().get(escrow).copied().unwrap_or(0);
        Ok(vec![
            RawEntitlement {
                max_value: U128Limbs::from_u128(max),
                verifier_id: Vendor::Linode.verifier_id(),
                spot: false,
                date_start: None,
                date_end: None,
            },
            RawEntitlement {
                max_value: U128Limbs { lo: 0, hi: 1 },
                verifier_id: 99,
                spot: true,
                date_start: None,
                date_end: None,
            },
        ])
    }

    async fn escrow_title(&self, _escrow: &Address) -> Result<Vec<u8>, LedgerError> {
        Ok(b"Team travel\0\0\0\0\0".to_vec())
    }
}

fn orchestrator(chain: &Arc<MemoryChain>, locks: ContractLocks) -> ClaimOrchestrator {
    ClaimOrchestrator::new(
        holder(),
        ReceiptEngine::new(Arc::new(PassthroughVerifier)),
        chain.clone(),
        chain.clone(),
        locks,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLAIMS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_linode_claim_reaches_done() {
    let chain = MemoryChain::new(100_000_000);
    let orchestrator = orchestrator(&chain, ContractLocks::new());

    let receipt = orchestrator
        .claim(&entitlement(Vendor::Linode, 100_000_000, false), &linode_email("42.10"))
        .await
        .unwrap();

    assert_eq!(receipt.record.amount, 42_100_000);
    assert_eq!(chain.private_balance(), 42_100_000);
    assert!(chain.pending_notes.lock().unwrap().is_empty());

    let submissions = chain.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].method(), "reimburse_linode_recurring");
    assert!(submissions[0].capsules.is_empty());
    assert_eq!(submissions[0].holder, holder());
    drop(submissions);

    let attempt = orchestrator.last_attempt().await.unwrap();
    assert_eq!(attempt.stage, ClaimStage::Done);
    let stages: Vec<&'static str> = attempt.transitions.iter().map(|t| t.stage.name()).collect();
    assert_eq!(
        stages,
        vec!["idle", "extracting", "verifying", "submitting", "committing", "redeeming", "done"]
    );
    assert!(attempt.secret.is_none());
    assert_eq!(attempt.redeem_tx, Some(receipt.redeem_tx));
}

#[tokio::test]
async fn test_commitment_comes_from_token_ledger() {
    let chain = MemoryChain::new(100_000_000);
    *chain.fail_reveal.lock().unwrap() = true;
    let orchestrator = orchestrator(&chain, ContractLocks::new());

    orchestrator
        .claim(&entitlement(Vendor::Linode, 100_000_000, false), &linode_email("42.10"))
        .await
        .unwrap_err();

    let attempt = orchestrator.last_attempt().await.unwrap();
    let secret = attempt.secret.unwrap();
    assert_eq!(secret.hash(), &MemoryChain::hash_secret(secret.secret()));
    assert_eq!(chain.submissions.lock().unwrap()[0].secret_hash, *secret.hash());
    assert_eq!(
        chain.pending_notes.lock().unwrap()[0],
        (holder(), 42_100_000, *secret.hash())
    );
}

#[tokio::test]
async fn test_secret_hash_failure_stops_before_submission() {
    let chain = MemoryChain::new(100_000_000);
    *chain.fail_hash.lock().unwrap() = true;
    let orchestrator = orchestrator(&chain, ContractLocks::new());

    let err = orchestrator
        .claim(&entitlement(Vendor::Linode, 100_000_000, false), &linode_email("42.10"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClaimError::Submission { .. }));
    assert!(chain.submissions.lock().unwrap().is_empty());
    let attempt = orchestrator.last_attempt().await.unwrap();
    assert_eq!(attempt.failed_at(), Some(&ClaimStage::Submitting));
    assert!(attempt.secret.is_none());
}

#[tokio::test]
async fn test_claim_over_max_value_is_submission_error() {
    let chain = MemoryChain::new(10_000_000);
    let orchestrator = orchestrator(&chain, ContractLocks::new());

    let err = orchestrator
        .claim(&entitlement(Vendor::Linode, 10_000_000, false), &linode_email("42.10"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClaimError::Submission { escrow: e, .. } if e == escrow()));
    assert_eq!(err.error_code(), "SUBMISSION_FAILED");
    assert_eq!(chain.private_balance(), 0);

    let attempt = orchestrator.last_attempt().await.unwrap();
    assert!(matches!(attempt.stage, ClaimStage::Failed { .. }));
    assert_eq!(attempt.failed_at(), Some(&ClaimStage::Submitting));
    assert!(attempt.claim_tx.is_none());
    assert!(!attempt.has_unredeemed_secret());
}

#[tokio::test]
async fn test_missing_anchor_fails_in_extraction() {
    let chain = MemoryChain::new(100_000_000);
    let orchestrator = orchestrator(&chain, ContractLocks::new());

    let err = orchestrator
        .claim(&entitlement(Vendor::Linode, 100_000_000, false), b"Thanks for your payment of $42.10.")
        .await
        .unwrap_err();

    let ClaimError::Parse(parse) = &err else {
        panic!("expected parse error, got {err:?}");
    };
    assert_eq!(parse.vendor, Vendor::Linode);
    assert!(!err.is_retryable());
    assert!(chain.submissions.lock().unwrap().is_empty());
    assert_eq!(
        orchestrator.last_attempt().await.unwrap().failed_at(),
        Some(&ClaimStage::Extracting)
    );
}

#[tokio::test]
async fn test_unknown_verifier_is_rejected() {
    let chain = MemoryChain::new(100_000_000);
    let orchestrator = orchestrator(&chain, ContractLocks::new());
    let mut target = entitlement(Vendor::Linode, 100_000_000, false);
    target.verifier_id = 99;

    let err = orchestrator.claim(&target, &linode_email("1.00")).await.unwrap_err();
    assert_eq!(err, ClaimError::UnknownVerifier(99));
}

#[tokio::test]
async fn test_united_claim_carries_capsules() {
    let chain = MemoryChain::new(2_000_000_000);
    let orchestrator = orchestrator(&chain, ContractLocks::new());

    let receipt = orchestrator
        .claim(&entitlement(Vendor::United, 2_000_000_000, true), &united_email())
        .await
        .unwrap();
    assert_eq!(receipt.record.amount, 1_717_850_000);

    let submissions = chain.submissions.lock().unwrap();
    let submission = &submissions[0];
    assert_eq!(submission.method(), "reimburse_united_spot");
    assert_eq!(submission.capsules.len(), 2);
    let lengths = submission.deferred.unwrap();
    assert_eq!(lengths.actual, united_email().len());
    assert!(lengths.amount_to_date + lengths.remaining <= lengths.actual);
}

#[tokio::test]
async fn test_failed_reveal_keeps_secret() {
    let chain = MemoryChain::new(100_000_000);
    *chain.fail_reveal.lock().unwrap() = true;
    let orchestrator = orchestrator(&chain, ContractLocks::new());

    let err = orchestrator
        .claim(&entitlement(Vendor::Linode, 100_000_000, false), &linode_email("42.10"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Redemption { stage: "reveal", .. }));
    assert!(err.is_retryable());

    let attempt = orchestrator.last_attempt().await.unwrap();
    assert_eq!(attempt.failed_at(), Some(&ClaimStage::Redeeming));
    assert!(attempt.has_unredeemed_secret());

    // The kept secret is enough to finish by hand.
    *chain.fail_reveal.lock().unwrap() = false;
    let secret = attempt.secret.unwrap();
    chain.redeem_shield(&holder(), 42_100_000, secret.secret()).await.unwrap();
    assert_eq!(chain.private_balance(), 42_100_000);
}

#[tokio::test]
async fn test_claim_waits_for_escrow_lock() {
    let chain = MemoryChain::new(100_000_000);
    let locks = ContractLocks::new();
    let orchestrator = orchestrator(&chain, locks.clone());

    let wave = locks.acquire([escrow()]).await;
    let claim = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .claim(&entitlement(Vendor::Linode, 100_000_000, false), &linode_email("42.10"))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!claim.is_finished());
    assert!(chain.submissions.lock().unwrap().is_empty());

    drop(wave);
    claim.await.unwrap().unwrap();
    assert_eq!(chain.submissions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_one_claim_in_flight_per_holder() {
    let chain = MemoryChain::new(100_000_000);
    let orchestrator = orchestrator(&chain, ContractLocks::new());
    let target = entitlement(Vendor::Linode, 100_000_000, false);
    let first_email = linode_email("12.00");
    let second_email = linode_email("30.00");

    let (first, second) = tokio::join!(
        orchestrator.claim(&target, &first_email),
        orchestrator.claim(&target, &second_email),
    );
    first.unwrap();
    second.unwrap();

    let attempts = orchestrator.attempts().await;
    assert_eq!(attempts.len(), 2);
    let first_end = attempts[0].transitions.last().unwrap().at;
    let second_start = attempts[1].transitions.first().unwrap().at;
    assert!(first_end <= second_start);
    assert_eq!(chain.private_balance(), 42_000_000);
}

#[tokio::test]
async fn test_history_keeps_every_attempt() {
    let chain = MemoryChain::new(50_000_000);
    let orchestrator = orchestrator(&chain, ContractLocks::new());
    let target = entitlement(Vendor::Linode, 50_000_000, false);

    orchestrator.claim(&target, &linode_email("60.00")).await.unwrap_err();
    orchestrator.claim(&target, &linode_email("42.10")).await.unwrap();

    let attempts = orchestrator.attempts().await;
    assert_eq!(attempts.len(), 2);
    assert!(matches!(attempts[0].stage, ClaimStage::Failed { .. }));
    assert_eq!(attempts[1].stage, ClaimStage::Done);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTORY
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_directory_lists_entitlements_with_titles() {
    let chain = MemoryChain::new(25_000_000);
    let directory = EntitlementDirectory::new(chain.clone(), chain.clone(), holder());

    let views = directory.entitlements().await.unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].title, Some("Linode Billing"));
    assert_eq!(views[0].entitlement.max_value, 25_000_000);
    assert_eq!(views[0].vendor(), Some(Vendor::Linode));
    assert_eq!(views[1].title, None);
    assert_eq!(views[1].entitlement.max_value, 1u128 << 64);
    assert_eq!(views[1].entitlement.index, 1);
    assert!(views[1].id().ends_with("-1"));
}

#[tokio::test]
async fn test_directory_balances() {
    let chain = MemoryChain::new(25_000_000);
    chain.private_balances.lock().unwrap().insert(holder(), 7);
    let directory = EntitlementDirectory::new(chain.clone(), chain.clone(), holder());

    assert_eq!(
        directory.balance().await.unwrap(),
        TokenBalance {
            private: 7,
            public: 5_000_000
        }
    );

    let summary = directory.escrow_summary(&escrow()).await.unwrap();
    assert_eq!(summary.title, "Team travel");
    assert_eq!(summary.escrowed, 5_000_000);
}
