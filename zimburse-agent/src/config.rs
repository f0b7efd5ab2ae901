//! Agent configuration.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use zimburse_common::{Address, NoteTypeId};
use zimburse_reconcile::{ScannerConfig, ENTITLEMENT_ENTROPY_INDEX, EVENT_BLOCK_LIMIT};

/// Default PXE endpoint.
pub const DEFAULT_PXE_URL: &str = "http://localhost:8080";

const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;

/// Agent configuration.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// PXE JSON-RPC endpoint.
    pub pxe_url: String,
    /// Email verifier endpoint. Defaults to the PXE endpoint.
    pub verifier_url: String,
    /// Account the agent acts for.
    pub holder: Address,
    /// Escrow registry contract.
    pub registry: Option<Address>,
    /// USDC token contract.
    pub usdc: Option<Address>,
    /// Upper bound of the nullification event window.
    pub event_block_limit: u64,
    /// Seconds between reconciliation passes in `watch`.
    pub scan_interval_secs: u64,
    /// Note type id of escrow entitlement notes.
    pub entitlement_note_type: Option<NoteTypeId>,
}

impl AgentConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pxe_url = lookup("ZIMBURSE_PXE_URL").unwrap_or_else(|| DEFAULT_PXE_URL.to_string());
        let verifier_url = lookup("ZIMBURSE_VERIFIER_URL").unwrap_or_else(|| pxe_url.clone());

        let holder = lookup("ZIMBURSE_HOLDER_ADDRESS").context("ZIMBURSE_HOLDER_ADDRESS must be set")?;
        let holder = Address::from_hex(&holder).context("ZIMBURSE_HOLDER_ADDRESS is not a valid address")?;

        let registry = optional_address(&lookup, "ZIMBURSE_REGISTRY_ADDRESS")?;
        let usdc = optional_address(&lookup, "ZIMBURSE_USDC_ADDRESS")?;

        let event_block_limit = optional_number(&lookup, "ZIMBURSE_EVENT_BLOCK_LIMIT")?.unwrap_or(EVENT_BLOCK_LIMIT);
        let scan_interval_secs =
            optional_number(&lookup, "ZIMBURSE_SCAN_INTERVAL_SECS")?.unwrap_or(DEFAULT_SCAN_INTERVAL_SECS);
        if scan_interval_secs == 0 {
            anyhow::bail!("ZIMBURSE_SCAN_INTERVAL_SECS must be positive");
        }

        let entitlement_note_type = optional_number(&lookup, "ZIMBURSE_ENTITLEMENT_NOTE_TYPE_ID")?
            .map(|id| u32::try_from(id).context("ZIMBURSE_ENTITLEMENT_NOTE_TYPE_ID does not fit in u32"))
            .transpose()?
            .map(NoteTypeId);

        Ok(Self {
            pxe_url,
            verifier_url,
            holder,
            registry,
            usdc,
            event_block_limit,
            scan_interval_secs,
            entitlement_note_type,
        })
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Scanner settings; the entitlement note type is required for scanning.
    pub fn scanner(&self) -> Result<ScannerConfig> {
        let entitlement_note_type = self
            .entitlement_note_type
            .context("ZIMBURSE_ENTITLEMENT_NOTE_TYPE_ID must be set to scan entitlement notes")?;
        Ok(ScannerConfig {
            entitlement_note_type,
            entropy_index: ENTITLEMENT_ENTROPY_INDEX,
            event_block_limit: self.event_block_limit,
        })
    }
}

fn optional_address(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Address>> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .map(|value| Address::from_hex(value.trim()).with_context(|| format!("{key} is not a valid address")))
        .transpose()
}

fn optional_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a non-negative integer"))
        })
        .transpose()
}
