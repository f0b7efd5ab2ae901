//! JSON-RPC adapter for a PXE-style endpoint.
//!
//! One client implements every ledger seam the library crates define: note and
//! event reads, batched nullification, claim submission, token operations,
//! registry views and the external email verifier.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use zimburse_claims::{CircuitInputs, ClaimSubmission, ClaimSubmitter, RegistryLedger, TokenLedger};
use zimburse_common::{
    Address, ByteRange, EncryptedNote, Field, LedgerError, NoteTypeId, NullificationEvent, RawEntitlement, TxReceipt,
    U128Limbs,
};
use zimburse_receipts::{EmailVerifier, VerificationError, VerifiedEmail, VerifyOptions, Vendor};
use zimburse_reconcile::{EventKind, NoteLedger, NullifyRequest, NullifySubmitter};

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON-RPC client bound to one holder account.
pub struct PxeClient {
    http: reqwest::Client,
    pxe_url: String,
    verifier_url: String,
    holder: Address,
    registry: Option<Address>,
    token: Option<Address>,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Where an RPC call failed.
enum CallError {
    Transport(String),
    Remote(String),
    Decode(String),
}

impl From<CallError> for LedgerError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(msg) => LedgerError::Rpc(msg),
            CallError::Remote(msg) => LedgerError::Rejected(msg),
            CallError::Decode(msg) => LedgerError::Decode(msg),
        }
    }
}

impl From<CallError> for VerificationError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(msg) => VerificationError::Unavailable(msg),
            CallError::Remote(msg) => VerificationError::Signature(msg),
            CallError::Decode(msg) => VerificationError::Inputs(msg),
        }
    }
}

impl PxeClient {
    pub fn new(
        pxe_url: impl Into<String>,
        verifier_url: impl Into<String>,
        holder: Address,
        registry: Option<Address>,
        token: Option<Address>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            pxe_url: pxe_url.into(),
            verifier_url: verifier_url.into(),
            holder,
            registry,
            token,
            next_id: AtomicU64::new(1),
        }
    }

    /// Node reachability check.
    pub async fn block_number(&self) -> Result<u64, LedgerError> {
        let value = self.call("node_getBlockNumber", json!([])).await?;
        decode(value, "block number")
    }

    async fn call_at(&self, url: &str, method: &str, params: Value) -> Result<Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc call");

        let response = self
            .http
            .post(url)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::Transport(format!("{method}: HTTP {status}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| CallError::Decode(format!("{method}: {e}")))?;

        if let Some(error) = body.error {
            return Err(CallError::Remote(format!("{method}: {} ({})", error.message, error.code)));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        Ok(self.call_at(&self.pxe_url, method, params).await?)
    }

    /// Run a view function without sending a transaction.
    async fn simulate(&self, contract: &Address, function: &str, args: Value) -> Result<Value, LedgerError> {
        self.call(
            "pxe_simulateTx",
            json!({
                "from": self.holder,
                "to": contract,
                "function": function,
                "args": args,
            }),
        )
        .await
    }

    /// Send `calls` as one transaction from the holder and wait for it to be mined.
    async fn send(&self, calls: Vec<Value>) -> Result<TxReceipt, LedgerError> {
        let value = self
            .call(
                "pxe_sendTx",
                json!({
                    "from": self.holder,
                    "calls": calls,
                    "wait": true,
                }),
            )
            .await?;
        let receipt: WireReceipt = decode(value, "tx receipt")?;
        Ok(receipt.into())
    }

    fn token(&self) -> Result<&Address, LedgerError> {
        self.token
            .as_ref()
            .ok_or_else(|| LedgerError::Rejected("token contract address is not configured".into()))
    }

    fn registry(&self) -> Result<&Address, LedgerError> {
        self.registry
            .as_ref()
            .ok_or_else(|| LedgerError::Rejected("registry contract address is not configured".into()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE FORMATS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    entropy: Field,
    block_number: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNote {
    contract_address: Address,
    note_type_id: u32,
    items: Vec<Field>,
}

impl From<WireNote> for EncryptedNote {
    fn from(note: WireNote) -> Self {
        EncryptedNote {
            owning_contract: note.contract_address,
            note_type_id: NoteTypeId(note.note_type_id),
            fields: note.items,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceipt {
    tx_hash: Field,
    block_number: u64,
}

impl From<WireReceipt> for TxReceipt {
    fn from(receipt: WireReceipt) -> Self {
        TxReceipt {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        }
    }
}

/// Fixed-capacity contract array: only the first `len` entries are live.
#[derive(Deserialize)]
struct BoundedVec<T> {
    len: usize,
    storage: Vec<T>,
}

impl<T> BoundedVec<T> {
    fn into_vec(mut self) -> Vec<T> {
        self.storage.truncate(self.len);
        self.storage
    }
}

/// Contract `Option<T>` as the ABI encodes it.
#[derive(Deserialize)]
struct WireOption<T> {
    #[serde(rename = "_is_some")]
    is_some: bool,
    #[serde(rename = "_value")]
    value: T,
}

impl<T> WireOption<T> {
    fn into_option(self) -> Option<T> {
        self.is_some.then_some(self.value)
    }
}

#[derive(Deserialize)]
struct WireEntitlement {
    max_value: U128Limbs,
    verifier_id: u32,
    spot: bool,
    #[serde(default)]
    date_start: Option<WireOption<i64>>,
    #[serde(default)]
    date_end: Option<WireOption<i64>>,
}

impl WireEntitlement {
    fn into_raw(self) -> Result<RawEntitlement, LedgerError> {
        Ok(RawEntitlement {
            max_value: self.max_value,
            verifier_id: self.verifier_id,
            spot: self.spot,
            date_start: self.date_start.and_then(WireOption::into_option).map(timestamp).transpose()?,
            date_end: self.date_end.and_then(WireOption::into_option).map(timestamp).transpose()?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVerifiedEmail {
    decoded_body: String,
    header: String,
    #[serde(default)]
    from_range: Option<ByteRange>,
    #[serde(default)]
    to_range: Option<ByteRange>,
}

impl WireVerifiedEmail {
    fn into_verified(self) -> Result<VerifiedEmail, VerificationError> {
        Ok(VerifiedEmail {
            decoded_body: decode_hex_bytes(&self.decoded_body)
                .map_err(|e| VerificationError::Inputs(format!("decoded body: {e}")))?,
            header: decode_hex_bytes(&self.header).map_err(|e| VerificationError::Inputs(format!("header: {e}")))?,
            from_range: self.from_range,
            to_range: self.to_range,
        })
    }
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, LedgerError> {
    serde_json::from_value(value).map_err(|e| LedgerError::Decode(format!("{what}: {e}")))
}

/// View functions return a tuple; the value of interest is its first element.
fn first_return(value: Value) -> Value {
    match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

/// Token amounts arrive as decimal strings, hex strings or small numbers.
fn parse_amount(value: &Value) -> Result<u128, LedgerError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| LedgerError::Decode(format!("amount {n} is not an unsigned integer"))),
        Value::String(s) if s.starts_with("0x") => Field::from_hex(s)?
            .to_u128()
            .ok_or_else(|| LedgerError::Decode(format!("amount {s} exceeds u128"))),
        Value::String(s) => s
            .parse::<u128>()
            .map_err(|e| LedgerError::Decode(format!("amount {s:?}: {e}"))),
        other => Err(LedgerError::Decode(format!("unexpected amount {other}"))),
    }
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| LedgerError::Decode(format!("timestamp {seconds} out of range")))
}

fn decode_hex_bytes(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(text.strip_prefix("0x").unwrap_or(text))
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER SEAMS
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl NoteLedger for PxeClient {
    async fn events(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<NullificationEvent>, LedgerError> {
        let value = self
            .call(
                "pxe_getEncryptedEvents",
                json!({
                    "event": kind.as_str(),
                    "from": from_block,
                    "limit": to_block,
                }),
            )
            .await?;
        let events: Vec<WireEvent> = decode(value, "events")?;
        Ok(events
            .into_iter()
            .map(|event| NullificationEvent {
                entropy: event.entropy,
                block_number: event.block_number,
            })
            .collect())
    }

    async fn incoming_notes(&self, scope: &Address) -> Result<Vec<EncryptedNote>, LedgerError> {
        let value = self
            .call("pxe_getIncomingNotes", json!({ "scopes": [scope] }))
            .await?;
        let notes: Vec<WireNote> = decode(value, "incoming notes")?;
        Ok(notes.into_iter().map(EncryptedNote::from).collect())
    }
}

#[async_trait]
impl NullifySubmitter for PxeClient {
    async fn submit_wave(&self, calls: &[NullifyRequest]) -> Result<TxReceipt, LedgerError> {
        let calls = calls
            .iter()
            .map(|request| {
                json!({
                    "to": request.contract,
                    "function": "nullify_entitlements",
                    "args": [request.entropies],
                })
            })
            .collect();
        self.send(calls).await
    }
}

#[async_trait]
impl ClaimSubmitter for PxeClient {
    async fn prepare_inputs(
        &self,
        vendor: Vendor,
        verified: &VerifiedEmail,
    ) -> Result<CircuitInputs, LedgerError> {
        let params = json!({
            "verifierId": vendor.verifier_id(),
            "maxBodyLength": vendor.max_body_length(),
            "decodedBody": hex::encode(&verified.decoded_body),
            "header": hex::encode(&verified.header),
        });
        Ok(self
            .call_at(&self.verifier_url, "zimburse_generateCircuitInputs", params)
            .await?)
    }

    async fn submit_claim(&self, submission: ClaimSubmission) -> Result<TxReceipt, LedgerError> {
        for capsule in &submission.capsules {
            self.call("pxe_addCapsule", json!({ "capsule": capsule })).await?;
        }

        let mut args = vec![submission.inputs.clone()];
        if let Some(lengths) = submission.deferred {
            args.extend([json!(lengths.amount_to_date), json!(lengths.remaining), json!(lengths.actual)]);
        }
        args.push(json!(submission.secret_hash));

        self.send(vec![json!({
            "to": submission.escrow,
            "function": submission.method(),
            "args": args,
        })])
        .await
    }
}

#[async_trait]
impl TokenLedger for PxeClient {
    /// Computed by the toolkit service with the token contract's own hash, so
    /// `redeem_shield` can open the commitment on chain.
    async fn secret_hash(&self, secret: &Field) -> Result<Field, LedgerError> {
        let value = self
            .call_at(&self.verifier_url, "zimburse_computeSecretHash", json!({ "secret": secret }))
            .await?;
        decode(value, "secret hash")
    }

    async fn add_pending_shield_note(
        &self,
        owner: &Address,
        amount: u128,
        secret_hash: &Field,
        claim_tx: &TxReceipt,
    ) -> Result<(), LedgerError> {
        let token = self.token()?;
        self.call(
            "pxe_addNote",
            json!({
                "owner": owner,
                "contract": token,
                "storageSlot": "pending_shields",
                "note": {
                    "amount": amount.to_string(),
                    "secretHash": secret_hash,
                },
                "txHash": claim_tx.tx_hash,
            }),
        )
        .await?;
        Ok(())
    }

    async fn redeem_shield(&self, owner: &Address, amount: u128, secret: &Field) -> Result<TxReceipt, LedgerError> {
        let token = self.token()?;
        self.send(vec![json!({
            "to": token,
            "function": "redeem_shield",
            "args": [owner, amount.to_string(), secret],
        })])
        .await
    }

    async fn balance_of_public(&self, owner: &Address) -> Result<u128, LedgerError> {
        let token = self.token()?;
        let value = self.simulate(token, "balance_of_public", json!([owner])).await?;
        parse_amount(&first_return(value))
    }

    async fn balance_of_private(&self, owner: &Address) -> Result<u128, LedgerError> {
        let token = self.token()?;
        let value = self.simulate(token, "balance_of_private", json!([owner])).await?;
        parse_amount(&first_return(value))
    }
}

#[async_trait]
impl RegistryLedger for PxeClient {
    async fn participant_escrows(&self, participant: &Address) -> Result<Vec<Address>, LedgerError> {
        let registry = self.registry()?;
        let value = self
            .simulate(registry, "get_participant_escrows", json!([participant, 0]))
            .await?;
        let escrows: BoundedVec<Address> = decode(first_return(value), "participant escrows")?;
        Ok(escrows.into_vec())
    }

    async fn entitlements(&self, escrow: &Address, holder: &Address) -> Result<Vec<RawEntitlement>, LedgerError> {
        let none_address = json!({ "_is_some": false, "_value": Address::ZERO });
        let none_u32 = json!({ "_is_some": false, "_value": 0 });
        let none_bool = json!({ "_is_some": false, "_value": false });
        let value = self
            .simulate(
                escrow,
                "view_entitlements",
                json!([0, holder, none_address, none_u32, none_bool]),
            )
            .await?;
        let entitlements: BoundedVec<WireEntitlement> = decode(first_return(value), "entitlements")?;
        entitlements.into_vec().into_iter().map(WireEntitlement::into_raw).collect()
    }

    async fn escrow_title(&self, escrow: &Address) -> Result<Vec<u8>, LedgerError> {
        let value = self.simulate(escrow, "get_title", json!([])).await?;
        decode(value, "escrow title")
    }
}

#[async_trait]
impl EmailVerifier for PxeClient {
    async fn verify(&self, raw_email: &[u8], options: VerifyOptions) -> Result<VerifiedEmail, VerificationError> {
        let params = json!({
            "email": hex::encode(raw_email),
            "maxBodyLength": options.max_body_length,
            "removeSoftLineBreaks": options.remove_soft_line_breaks,
            "extractFrom": options.extract_from,
            "extractTo": options.extract_to,
        });
        let value = self
            .call_at(&self.verifier_url, "zimburse_verifyEmail", params)
            .await?;
        let wire: WireVerifiedEmail =
            serde_json::from_value(value).map_err(|e| VerificationError::Inputs(format!("verifier output: {e}")))?;
        wire.into_verified()
    }
}
