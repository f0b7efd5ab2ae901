//! zimburse-agent
//!
//! Holder-side agent for z-imburse escrows.
//!
//! Commands:
//! 1. `watch`: reconcile nullified entitlements on a timer until Ctrl-C
//! 2. `reconcile`: one reconciliation pass
//! 3. `claim`: redeem a receipt email against an entitlement
//! 4. `extract`: offline extraction of an already-verified body and header
//! 5. `entitlements` / `balance`: read-only views

mod config;
mod output;
mod rpc;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use zimburse_claims::{ClaimOrchestrator, EntitlementDirectory, EntitlementView};
use zimburse_common::{Address, ByteRange};
use zimburse_receipts::{extract_verified, ReceiptEngine, Vendor, VerifiedEmail};
use zimburse_reconcile::{BatchScheduler, ContractLocks, NoteInventoryScanner, Reconciler};

use crate::config::AgentConfig;
use crate::output::{
    output_summary, BalanceSummary, ClaimSummary, EntitlementList, ExtractSummary, ReconcileSummary,
};
use crate::rpc::PxeClient;

const DEFAULT_LOG_FILTER: &str = "zimburse_agent=info,zimburse_reconcile=info,zimburse_claims=info";

#[derive(Parser)]
#[command(
    name = "zimburse-agent",
    about = "Reconcile entitlements and redeem receipt claims for a z-imburse holder"
)]
struct Cli {
    /// JSON logs and JSON command output.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile on an interval until interrupted.
    Watch,
    /// Run a single reconciliation pass.
    Reconcile,
    /// Claim an entitlement with a receipt email.
    Claim(ClaimArgs),
    /// Extract a claim record from a verified body and header, without a ledger.
    Extract(ExtractArgs),
    /// List claimable entitlements.
    Entitlements,
    /// Show the holder's token balances.
    Balance,
}

#[derive(Args)]
struct ClaimArgs {
    /// Verifier id of the entitlement (2 = Linode, 5 = United).
    #[arg(long)]
    verifier_id: u32,
    /// Escrow contract address.
    #[arg(long)]
    escrow: String,
    /// Entitlement index within the escrow; required when more than one
    /// entitlement matches the verifier.
    #[arg(long)]
    index: Option<usize>,
    /// Path to the raw `.eml` file.
    #[arg(long)]
    email: PathBuf,
}

#[derive(Args)]
struct ExtractArgs {
    #[arg(long)]
    verifier_id: u32,
    /// Decoded body bytes.
    #[arg(long)]
    body: PathBuf,
    /// Canonicalized header bytes.
    #[arg(long)]
    header: PathBuf,
    /// Sender range in the header, `index:length`.
    #[arg(long, value_parser = parse_range)]
    from_range: Option<ByteRange>,
    /// Recipient range in the header, `index:length`.
    #[arg(long, value_parser = parse_range)]
    to_range: Option<ByteRange>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Commands::Watch => watch().await,
        Commands::Reconcile => reconcile(cli.json).await,
        Commands::Claim(args) => claim(args, cli.json).await,
        Commands::Extract(args) => extract(args, cli.json),
        Commands::Entitlements => entitlements(cli.json).await,
        Commands::Balance => balance(cli.json).await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRING
// ═══════════════════════════════════════════════════════════════════════════════

/// Services built from configuration, sharing one client and one lock table.
///
/// The lock table keeps claims and nullification waves on the same escrow
/// apart only within this process. A `claim` run alongside a separate `watch`
/// process is not excluded.
struct Agent {
    config: AgentConfig,
    client: Arc<PxeClient>,
    locks: ContractLocks,
}

impl Agent {
    fn from_env() -> Result<Self> {
        let config = AgentConfig::from_env()?;
        info!(
            pxe = %config.pxe_url,
            holder = %config.holder.truncated(),
            "zimburse-agent configured"
        );
        let client = Arc::new(PxeClient::new(
            config.pxe_url.clone(),
            config.verifier_url.clone(),
            config.holder,
            config.registry,
            config.usdc,
        ));
        Ok(Self {
            config,
            client,
            locks: ContractLocks::new(),
        })
    }

    fn reconciler(&self) -> Result<Reconciler> {
        let scanner = NoteInventoryScanner::new(self.client.clone(), self.config.holder, self.config.scanner()?);
        let scheduler = BatchScheduler::new(self.client.clone(), self.locks.clone());
        Ok(Reconciler::new(scanner, scheduler))
    }

    fn directory(&self) -> Result<EntitlementDirectory> {
        self.require_contracts()?;
        Ok(EntitlementDirectory::new(
            self.client.clone(),
            self.client.clone(),
            self.config.holder,
        ))
    }

    fn orchestrator(&self) -> Result<ClaimOrchestrator> {
        self.require_contracts()?;
        Ok(ClaimOrchestrator::new(
            self.config.holder,
            ReceiptEngine::new(self.client.clone()),
            self.client.clone(),
            self.client.clone(),
            self.locks.clone(),
        ))
    }

    fn require_contracts(&self) -> Result<()> {
        if self.config.registry.is_none() {
            bail!("ZIMBURSE_REGISTRY_ADDRESS must be set");
        }
        if self.config.usdc.is_none() {
            bail!("ZIMBURSE_USDC_ADDRESS must be set");
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

async fn watch() -> Result<()> {
    let agent = Agent::from_env()?;
    let reconciler = agent.reconciler()?;

    let block = agent
        .client
        .block_number()
        .await
        .with_context(|| format!("PXE at {} is not reachable", agent.config.pxe_url))?;
    info!(
        block,
        interval_secs = agent.config.scan_interval_secs,
        "watching for nullified entitlements"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
        }
    };
    reconciler.run_periodic(agent.config.scan_interval(), shutdown).await;
    info!("shutting down zimburse-agent");
    Ok(())
}

async fn reconcile(json: bool) -> Result<()> {
    let agent = Agent::from_env()?;
    let report = agent
        .reconciler()?
        .reconcile()
        .await
        .context("reconciliation pass failed")?;
    output_summary(&ReconcileSummary::from(&report), json)
}

async fn claim(args: ClaimArgs, json: bool) -> Result<()> {
    let agent = Agent::from_env()?;
    let escrow = Address::from_hex(&args.escrow).context("--escrow is not a valid address")?;
    let raw_email = fs::read(&args.email).with_context(|| format!("failed to read {}", args.email.display()))?;

    let views = agent.directory()?.entitlements().await.context("failed to list entitlements")?;
    let view = select_entitlement(views, &escrow, args.verifier_id, args.index)?;

    let orchestrator = agent.orchestrator()?;
    let result = orchestrator.claim(&view.entitlement, &raw_email).await;
    if let Some(attempt) = orchestrator.last_attempt().await {
        if attempt.has_unredeemed_secret() {
            warn!(
                attempt = %serde_json::to_string(&attempt)?,
                "claim confirmed but not redeemed; keep this attempt to redeem manually"
            );
        }
    }
    let receipt = result.context("claim failed")?;
    output_summary(&ClaimSummary::from(receipt), json)
}

fn extract(args: ExtractArgs, json: bool) -> Result<()> {
    let vendor = Vendor::from_verifier_id(args.verifier_id)
        .with_context(|| format!("no receipt vendor for verifier id {}", args.verifier_id))?;
    let verified = VerifiedEmail {
        decoded_body: fs::read(&args.body).with_context(|| format!("failed to read {}", args.body.display()))?,
        header: fs::read(&args.header).with_context(|| format!("failed to read {}", args.header.display()))?,
        from_range: args.from_range,
        to_range: args.to_range,
    };
    let receipt = extract_verified(vendor, &verified)?;
    output_summary(&ExtractSummary::from(receipt), json)
}

async fn entitlements(json: bool) -> Result<()> {
    let agent = Agent::from_env()?;
    let views = agent.directory()?.entitlements().await?;
    output_summary(&EntitlementList(views), json)
}

async fn balance(json: bool) -> Result<()> {
    let agent = Agent::from_env()?;
    let balance = agent.directory()?.balance().await?;
    output_summary(&BalanceSummary::from(balance), json)
}

/// The one entitlement a claim targets. Without `index`, the verifier must
/// match exactly one entitlement in the escrow.
fn select_entitlement(
    views: Vec<EntitlementView>,
    escrow: &Address,
    verifier_id: u32,
    index: Option<usize>,
) -> Result<EntitlementView> {
    let mut candidates: Vec<EntitlementView> = views
        .into_iter()
        .filter(|view| {
            let entitlement = &view.entitlement;
            entitlement.escrow == *escrow
                && entitlement.verifier_id == verifier_id
                && index.map_or(true, |index| entitlement.index == index)
        })
        .collect();

    match candidates.len() {
        0 => bail!("no entitlement with verifier {verifier_id} in escrow {escrow}"),
        1 => Ok(candidates.remove(0)),
        _ => {
            let indices: Vec<String> = candidates
                .iter()
                .map(|view| {
                    let kind = if view.entitlement.spot { "spot" } else { "recurring" };
                    format!("{} ({kind})", view.entitlement.index)
                })
                .collect();
            bail!(
                "verifier {verifier_id} matches several entitlements in escrow {escrow}; pass --index with one of: {}",
                indices.join(", ")
            )
        }
    }
}

fn parse_range(text: &str) -> std::result::Result<ByteRange, String> {
    let (index, length) = text
        .split_once(':')
        .ok_or_else(|| format!("expected index:length, got {text:?}"))?;
    let index = index.trim().parse().map_err(|e| format!("bad index {index:?}: {e}"))?;
    let length = length.trim().parse().map_err(|e| format!("bad length {length:?}: {e}"))?;
    Ok(ByteRange::new(index, length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zimburse_common::{Entitlement, Field, RawEntitlement, U128Limbs};

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("13:18").unwrap(), ByteRange::new(13, 18));
        assert!(parse_range("13").is_err());
        assert!(parse_range("a:1").is_err());
    }

    fn view(escrow: u64, index: usize, verifier_id: u32, spot: bool) -> EntitlementView {
        EntitlementView {
            entitlement: Entitlement::from_raw(
                Address(Field::from_u64(escrow)),
                index,
                RawEntitlement {
                    max_value: U128Limbs::from_u128(100),
                    verifier_id,
                    spot,
                    date_start: None,
                    date_end: None,
                },
            ),
            title: None,
        }
    }

    #[test]
    fn test_select_entitlement_requires_index_when_ambiguous() {
        let escrow = Address(Field::from_u64(0xe5c0));
        let views = vec![view(0xe5c0, 0, 2, false), view(0xe5c0, 1, 2, true), view(0xe1, 0, 2, false)];

        let err = select_entitlement(views.clone(), &escrow, 2, None).unwrap_err();
        assert!(err.to_string().contains("--index"));

        let spot = select_entitlement(views.clone(), &escrow, 2, Some(1)).unwrap();
        assert!(spot.entitlement.spot);
        assert_eq!(spot.entitlement.index, 1);

        assert!(select_entitlement(views.clone(), &escrow, 5, None).is_err());
        assert!(select_entitlement(views, &escrow, 2, Some(7)).is_err());
    }

    #[test]
    fn test_select_entitlement_single_match() {
        let escrow = Address(Field::from_u64(0xe5c0));
        let views = vec![view(0xe5c0, 0, 2, false), view(0xe5c0, 1, 5, true)];
        let chosen = select_entitlement(views, &escrow, 5, None).unwrap();
        assert_eq!(chosen.entitlement.index, 1);
    }

    #[test]
    fn test_cli_parses_claim() {
        let cli = Cli::try_parse_from([
            "zimburse-agent",
            "--json",
            "claim",
            "--verifier-id",
            "2",
            "--escrow",
            "0xe5c0",
            "--index",
            "1",
            "--email",
            "receipt.eml",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Claim(args) = cli.command else {
            panic!("expected claim");
        };
        assert_eq!(args.verifier_id, 2);
        assert_eq!(args.index, Some(1));
        assert_eq!(args.email, PathBuf::from("receipt.eml"));
    }

    #[test]
    fn test_cli_extract_ranges() {
        let cli = Cli::try_parse_from([
            "zimburse-agent",
            "extract",
            "--verifier-id",
            "5",
            "--body",
            "body.html",
            "--header",
            "header.txt",
            "--from-range",
            "22:19",
        ])
        .unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.from_range, Some(ByteRange::new(22, 19)));
        assert_eq!(args.to_range, None);
    }
}
