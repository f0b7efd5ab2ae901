//! Read-only views of the holder's entitlements and balances.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;
use zimburse_common::{parse_string_bytes, Address, Entitlement, TokenBalance};
use zimburse_receipts::Vendor;

use crate::backend::{RegistryLedger, TokenLedger};
use crate::error::{ClaimError, Result};

/// An entitlement with its display title.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntitlementView {
    pub entitlement: Entitlement,
    /// Vendor title, `None` for verifiers this client has no strategy for.
    pub title: Option<&'static str>,
}

impl EntitlementView {
    /// Stable id, `<escrow>-<index>`.
    pub fn id(&self) -> String {
        format!("{}-{}", self.entitlement.escrow, self.entitlement.index)
    }

    pub fn vendor(&self) -> Option<Vendor> {
        Vendor::from_verifier_id(self.entitlement.verifier_id)
    }
}

/// Title and public balance of one escrow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EscrowSummary {
    pub escrow: Address,
    pub title: String,
    pub escrowed: u128,
}

/// Registry and token views for one holder.
#[derive(Clone)]
pub struct EntitlementDirectory {
    registry: Arc<dyn RegistryLedger>,
    token: Arc<dyn TokenLedger>,
    holder: Address,
}

impl EntitlementDirectory {
    pub fn new(registry: Arc<dyn RegistryLedger>, token: Arc<dyn TokenLedger>, holder: Address) -> Self {
        Self {
            registry,
            token,
            holder,
        }
    }

    /// Every entitlement the holder has across its escrows, escrow by escrow.
    pub async fn entitlements(&self) -> Result<Vec<EntitlementView>> {
        let escrows = self
            .registry
            .participant_escrows(&self.holder)
            .await
            .map_err(ClaimError::Query)?;

        let per_escrow = try_join_all(escrows.iter().map(|escrow| async move {
            let raw = self.registry.entitlements(escrow, &self.holder).await?;
            Ok::<_, zimburse_common::LedgerError>((*escrow, raw))
        }))
        .await
        .map_err(ClaimError::Query)?;

        let views: Vec<EntitlementView> = per_escrow
            .into_iter()
            .flat_map(|(escrow, raw)| {
                raw.into_iter().enumerate().map(move |(index, raw)| {
                    let entitlement = Entitlement::from_raw(escrow, index, raw);
                    let title = Vendor::from_verifier_id(entitlement.verifier_id).map(Vendor::entitlement_title);
                    EntitlementView { entitlement, title }
                })
            })
            .collect();

        debug!(escrows = escrows.len(), entitlements = views.len(), "entitlements fetched");
        Ok(views)
    }

    /// Holder's public and private token balances.
    pub async fn balance(&self) -> Result<TokenBalance> {
        let (public, private) = futures::try_join!(
            self.token.balance_of_public(&self.holder),
            self.token.balance_of_private(&self.holder),
        )
        .map_err(ClaimError::Query)?;
        Ok(TokenBalance { private, public })
    }

    pub async fn escrow_summary(&self, escrow: &Address) -> Result<EscrowSummary> {
        let (title, escrowed) = futures::try_join!(
            self.registry.escrow_title(escrow),
            self.token.balance_of_public(escrow),
        )
        .map_err(ClaimError::Query)?;
        Ok(EscrowSummary {
            escrow: *escrow,
            title: parse_string_bytes(&title),
            escrowed,
        })
    }
}
