//! Command output: JSON with `--json`, plain text otherwise.

use std::fmt;

use anyhow::Result;
use serde::Serialize;
use zimburse_claims::{ClaimReceipt, EntitlementView};
use zimburse_common::{format_micro_units, ClaimRecord, TokenBalance, TxReceipt};
use zimburse_receipts::ExtractedReceipt;
use zimburse_reconcile::ReconcileReport;

pub fn output_summary<T>(summary: &T, json: bool) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

#[derive(Serialize)]
pub struct ExtractSummary {
    pub vendor: String,
    pub record: ClaimRecord,
    pub amount_display: String,
    pub deferred_bytes: Option<(usize, usize)>,
}

impl From<ExtractedReceipt> for ExtractSummary {
    fn from(receipt: ExtractedReceipt) -> Self {
        Self {
            vendor: receipt.vendor.to_string(),
            amount_display: receipt.record.amount_display(),
            deferred_bytes: receipt
                .deferred
                .as_ref()
                .map(|body| (body.amount_to_date.len(), body.remaining.len())),
            record: receipt.record,
        }
    }
}

impl fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vendor: {}", self.vendor)?;
        writeln!(f, "amount: {} ({} micro-units)", self.amount_display, self.record.amount)?;
        writeln!(f, "date: {}", self.record.date.to_rfc3339())?;
        writeln!(f, "from: {}", self.record.from)?;
        writeln!(f, "to: {}", self.record.to)?;
        if let Some((amount_to_date, remaining)) = self.deferred_bytes {
            writeln!(f, "deferred: {amount_to_date} + {remaining} bytes")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct ReconcileSummary {
    pub contracts: usize,
    pub entropies: usize,
    pub requests: usize,
    pub waves: usize,
    pub receipts: Vec<TxReceipt>,
}

impl From<&ReconcileReport> for ReconcileSummary {
    fn from(report: &ReconcileReport) -> Self {
        Self {
            contracts: report.matched.contract_count(),
            entropies: report.matched.entropy_count(),
            requests: report.requests,
            waves: report.waves,
            receipts: report.receipts.clone(),
        }
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entropies == 0 {
            return writeln!(f, "nothing to reconcile");
        }
        writeln!(
            f,
            "nullified {} entitlement(s) across {} escrow(s) in {} call(s), {} wave(s)",
            self.entropies, self.contracts, self.requests, self.waves
        )?;
        for receipt in &self.receipts {
            writeln!(f, "  tx {} @ block {}", receipt.tx_hash, receipt.block_number)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct ClaimSummary {
    pub amount: String,
    pub record: ClaimRecord,
    pub claim_tx: TxReceipt,
    pub redeem_tx: TxReceipt,
}

impl From<ClaimReceipt> for ClaimSummary {
    fn from(receipt: ClaimReceipt) -> Self {
        Self {
            amount: receipt.record.amount_display(),
            record: receipt.record,
            claim_tx: receipt.claim_tx,
            redeem_tx: receipt.redeem_tx,
        }
    }
}

impl fmt::Display for ClaimSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "redeemed {} to private balance", self.amount)?;
        writeln!(f, "claim tx: {}", self.claim_tx.tx_hash)?;
        writeln!(f, "redeem tx: {}", self.redeem_tx.tx_hash)
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct EntitlementList(pub Vec<EntitlementView>);

impl fmt::Display for EntitlementList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "no claimable entitlements");
        }
        for view in &self.0 {
            let entitlement = &view.entitlement;
            writeln!(
                f,
                "{} #{}  {}  up to {}  verifier {}{}",
                entitlement.escrow.truncated(),
                entitlement.index,
                view.title.unwrap_or("Unknown"),
                format_micro_units(entitlement.max_value),
                entitlement.verifier_id,
                if entitlement.spot { "  (spot)" } else { "" },
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct BalanceSummary {
    pub private: String,
    pub public: String,
    pub total: String,
}

impl From<TokenBalance> for BalanceSummary {
    fn from(balance: TokenBalance) -> Self {
        Self {
            private: format_micro_units(balance.private),
            public: format_micro_units(balance.public),
            total: format_micro_units(balance.total()),
        }
    }
}

impl fmt::Display for BalanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "private: {}", self.private)?;
        writeln!(f, "public: {}", self.public)?;
        writeln!(f, "total: {}", self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_summary_formats_micro_units() {
        let summary = BalanceSummary::from(TokenBalance {
            private: 42_100_000,
            public: 1_234_560_000,
        });
        assert_eq!(summary.private, "42.10");
        assert_eq!(summary.total, "1,276.66");
        assert!(summary.to_string().contains("public: 1,234.56"));
    }

    #[test]
    fn test_empty_reconcile_summary() {
        let summary = ReconcileSummary::from(&ReconcileReport::default());
        assert_eq!(summary.to_string(), "nothing to reconcile\n");
    }
}
