//! Watchlist Service
//!
//! CRUD for named watchlists and their member symbols. The store
//! enforces `(watchlist_id, symbol)` uniqueness; a violation surfaces as
//! `AppError::Duplicate` with its own toast so the UI can phrase it
//! differently from generic failures.

use tracing::{error, info};

use crate::cache::QueryKey;
use crate::error::{AppError, Result};
use crate::models::{NewWatchlist, NewWatchlistItem, Watchlist, WatchlistItem};
use crate::notifier::Toast;
use crate::state::AppState;

/// Watchlist service for business logic
pub struct WatchlistService;

impl WatchlistService {
    /// List watchlists, newest first. Reads through the cache.
    pub async fn list_watchlists(state: &AppState) -> Result<Vec<Watchlist>> {
        let store = state.store.clone();
        let watchlists = state
            .cache
            .get_or_fetch(QueryKey::Watchlists, || async move {
                store.list_watchlists().await
            })
            .await?;
        Ok((*watchlists).clone())
    }

    pub async fn create_watchlist(state: &AppState, name: &str) -> Result<Watchlist> {
        info!("WatchlistService::create_watchlist - {}", name);

        let name = name.trim();
        if name.is_empty() {
            state.toast(Toast::error(
                "Missing information",
                "Please enter a watchlist name",
            ));
            return Err(AppError::Validation(
                "Watchlist name is required".to_string(),
            ));
        }

        let new = NewWatchlist {
            user_id: state.user_id.clone(),
            name: name.to_string(),
        };

        match state.store.insert_watchlist(new).await {
            Ok(watchlist) => {
                state.cache.invalidate(&QueryKey::Watchlists);
                state.toast(Toast::success("Watchlist created successfully"));
                Ok(watchlist)
            }
            Err(e) => {
                error!("Failed to create watchlist: {}", e);
                state.toast(Toast::error("Failed to create watchlist", &e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete a watchlist; its items cascade with it
    pub async fn delete_watchlist(state: &AppState, watchlist_id: &str) -> Result<()> {
        info!("WatchlistService::delete_watchlist - {}", watchlist_id);

        match state.store.delete_watchlist(watchlist_id).await {
            Ok(()) => {
                state.cache.invalidate(&QueryKey::Watchlists);
                state
                    .cache
                    .invalidate(&QueryKey::WatchlistItems(watchlist_id.to_string()));
                state.toast(Toast::success("Watchlist deleted successfully"));
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete watchlist {}: {}", watchlist_id, e);
                state.toast(Toast::error("Failed to delete watchlist", &e.to_string()));
                Err(e)
            }
        }
    }

    /// List one watchlist's items, newest first. Cached per watchlist.
    pub async fn list_items(state: &AppState, watchlist_id: &str) -> Result<Vec<WatchlistItem>> {
        let store = state.store.clone();
        let id = watchlist_id.to_string();
        let items = state
            .cache
            .get_or_fetch(QueryKey::WatchlistItems(watchlist_id.to_string()), || {
                async move { store.list_watchlist_items(&id).await }
            })
            .await?;
        Ok((*items).clone())
    }

    /// Add a symbol to a watchlist. Symbols are normalized to uppercase;
    /// a duplicate pair is rejected distinguishably.
    pub async fn add_item(
        state: &AppState,
        watchlist_id: &str,
        symbol: &str,
        notes: Option<String>,
    ) -> Result<WatchlistItem> {
        info!("WatchlistService::add_item - {} to {}", symbol, watchlist_id);

        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            state.toast(Toast::error(
                "Missing information",
                "Please enter a stock symbol",
            ));
            return Err(AppError::Validation("Symbol is required".to_string()));
        }

        let new = NewWatchlistItem {
            watchlist_id: watchlist_id.to_string(),
            symbol,
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        };

        match state.store.insert_watchlist_item(new).await {
            Ok(item) => {
                state
                    .cache
                    .invalidate(&QueryKey::WatchlistItems(watchlist_id.to_string()));
                state.toast(Toast::success("Stock added to watchlist"));
                Ok(item)
            }
            Err(e @ AppError::Duplicate(_)) => {
                state.toast(Toast::error(
                    "Stock already in watchlist",
                    &e.to_string(),
                ));
                Err(e)
            }
            Err(e) => {
                error!("Failed to add watchlist item: {}", e);
                state.toast(Toast::error("Failed to add stock", &e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn remove_item(state: &AppState, item_id: &str) -> Result<()> {
        info!("WatchlistService::remove_item - {}", item_id);

        match state.store.delete_watchlist_item(item_id).await {
            Ok(()) => {
                // Item rows are cached per watchlist; clear them all
                state.cache.invalidate_table(crate::store::Table::WatchlistItems);
                state.toast(Toast::success("Stock removed from watchlist"));
                Ok(())
            }
            Err(e) => {
                error!("Failed to remove watchlist item {}: {}", item_id, e);
                state.toast(Toast::error("Failed to remove stock", &e.to_string()));
                Err(e)
            }
        }
    }
}
