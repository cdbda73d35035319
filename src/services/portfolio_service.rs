//! Portfolio Service
//!
//! Holdings read model plus the derived portfolio summary. Holdings are
//! produced by the external execution process; this client only reads
//! them and recomputes the aggregate after invalidation.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::QueryKey;
use crate::error::Result;
use crate::models::Holding;
use crate::state::AppState;

/// Aggregate over every holding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub gain_loss_percent: f64,
    pub position_count: usize,
}

impl PortfolioSummary {
    fn from_holdings(holdings: &[Holding]) -> Self {
        let total_value: f64 = holdings.iter().map(|h| h.market_value()).sum();
        let total_cost: f64 = holdings.iter().map(|h| h.cost_basis()).sum();
        let total_gain_loss = total_value - total_cost;
        let gain_loss_percent = if total_cost == 0.0 {
            0.0
        } else {
            total_gain_loss / total_cost * 100.0
        };
        Self {
            total_value,
            total_cost,
            total_gain_loss,
            gain_loss_percent,
            position_count: holdings.len(),
        }
    }
}

/// Portfolio service for business logic
pub struct PortfolioService;

impl PortfolioService {
    /// List holdings, newest first. Reads through the cache.
    pub async fn list_holdings(state: &AppState) -> Result<Vec<Holding>> {
        let store = state.store.clone();
        let holdings = state
            .cache
            .get_or_fetch(QueryKey::Holdings, || async move {
                store.list_holdings().await
            })
            .await?;
        Ok((*holdings).clone())
    }

    /// Derived summary, cached under its own key. A holdings change
    /// invalidates both, so the next read recomputes from fresh rows.
    pub async fn portfolio_summary(state: &AppState) -> Result<PortfolioSummary> {
        info!("PortfolioService::portfolio_summary");

        if let Some(summary) = state.cache.get::<PortfolioSummary>(&QueryKey::Portfolio) {
            return Ok((*summary).clone());
        }

        let holdings = Self::list_holdings(state).await?;
        let summary = state
            .cache
            .get_or_fetch(QueryKey::Portfolio, || async move {
                Ok(PortfolioSummary::from_holdings(&holdings))
            })
            .await?;
        Ok((*summary).clone())
    }
}
