//! Data store boundary
//!
//! Typed query/mutation access to the remote relational tables
//! (accounts, orders, watchlists, watchlist_items, holdings) plus a
//! change-event feed for row-level subscriptions.
//!
//! Two backends implement the same traits:
//! - `RestStore` + `RealtimeFeed`: the hosted store (REST + websocket)
//! - `MemoryStore`: in-process backend with identical semantics, used by
//!   tests and offline mode

mod memory;
mod realtime;
mod rest;

pub use memory::MemoryStore;
pub use realtime::RealtimeFeed;
pub use rest::RestStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::Result;
use crate::models::{
    Account, AccountPatch, Holding, NewAccount, NewOrder, NewWatchlist, NewWatchlistItem, Order,
    OrderFilter, OrderPatch, OrderStatus, Watchlist, WatchlistItem,
};

/// Logical tables exposed by the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Accounts,
    Orders,
    Watchlists,
    WatchlistItems,
    Holdings,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Accounts => "accounts",
            Table::Orders => "orders",
            Table::Watchlists => "watchlists",
            Table::WatchlistItems => "watchlist_items",
            Table::Holdings => "holdings",
        }
    }
}

/// Row change kinds surfaced by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

/// Which event kinds a subscription wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Wildcard: every insert/update/delete
    All,
    Only(EventKind),
}

impl EventFilter {
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(k) => *k == kind,
        }
    }
}

/// A single row change. Payloads are not carried; consumers refetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: EventKind,
    pub row_id: Option<String>,
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Live handle onto one table's change stream. Dropping it tears the
/// subscription down; nothing dangles past the drop.
pub struct Subscription {
    table: Table,
    filter: EventFilter,
    rx: broadcast::Receiver<ChangeEvent>,
    teardown: Option<Teardown>,
}

impl Subscription {
    pub fn new(table: Table, filter: EventFilter, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            table,
            filter,
            rx,
            teardown: None,
        }
    }

    /// Attach transport-specific cleanup to run when the handle drops
    pub fn with_teardown(mut self, teardown: Teardown) -> Self {
        self.teardown = Some(teardown);
        self
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Next matching change event. Lagged gaps are skipped with a warning
    /// (consumers only invalidate, so missed events are safe to coalesce).
    /// Returns `None` once the feed closes.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if event.table == self.table && self.filter.matches(event.kind) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "Subscription on {} lagged, skipped {} events",
                        self.table.as_str(),
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

/// Change-event feed keyed by table. One subscription per table per
/// consumer; the wildcard filter mirrors the hosted store's `*` binding.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, table: Table, filter: EventFilter) -> Result<Subscription>;
}

/// Typed filter-and-project operations over the remote tables.
///
/// Reads return rows newest-first (creation order). Mutations are
/// single-row and atomic on the server; nothing here retries.
#[async_trait]
pub trait DataStore: Send + Sync {
    // ----- accounts -----

    async fn list_accounts(&self) -> Result<Vec<Account>>;

    async fn insert_account(&self, new: NewAccount) -> Result<Account>;

    async fn update_account(&self, id: &str, patch: AccountPatch) -> Result<Account>;

    async fn delete_account(&self, id: &str) -> Result<()>;

    // ----- orders -----

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>>;

    async fn insert_order(&self, new: NewOrder) -> Result<Order>;

    /// Conditional update: applies `patch` only WHERE the row's current
    /// status equals `expected`. Returns `None` when no row matched the
    /// predicate (wrong status or unknown id); the row is left untouched.
    async fn update_order_where_status(
        &self,
        id: &str,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Option<Order>>;

    // ----- watchlists -----

    async fn list_watchlists(&self) -> Result<Vec<Watchlist>>;

    async fn insert_watchlist(&self, new: NewWatchlist) -> Result<Watchlist>;

    /// Cascades to the watchlist's items
    async fn delete_watchlist(&self, id: &str) -> Result<()>;

    async fn list_watchlist_items(&self, watchlist_id: &str) -> Result<Vec<WatchlistItem>>;

    /// Duplicate `(watchlist_id, symbol)` pairs are rejected with
    /// `AppError::Duplicate`, distinguishable from other failures.
    async fn insert_watchlist_item(&self, new: NewWatchlistItem) -> Result<WatchlistItem>;

    async fn delete_watchlist_item(&self, item_id: &str) -> Result<()>;

    // ----- holdings (read model) -----

    async fn list_holdings(&self) -> Result<Vec<Holding>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_filter() {
        assert!(EventFilter::All.matches(EventKind::Insert));
        assert!(EventFilter::All.matches(EventKind::Delete));
        assert!(EventFilter::Only(EventKind::Update).matches(EventKind::Update));
        assert!(!EventFilter::Only(EventKind::Update).matches(EventKind::Delete));
    }

    #[tokio::test]
    async fn test_subscription_filters_by_table_and_kind() {
        let (tx, rx) = broadcast::channel(16);
        let mut sub = Subscription::new(Table::Orders, EventFilter::Only(EventKind::Insert), rx);

        tx.send(ChangeEvent {
            table: Table::Accounts,
            kind: EventKind::Insert,
            row_id: Some("a1".to_string()),
        })
        .unwrap();
        tx.send(ChangeEvent {
            table: Table::Orders,
            kind: EventKind::Update,
            row_id: Some("o1".to_string()),
        })
        .unwrap();
        tx.send(ChangeEvent {
            table: Table::Orders,
            kind: EventKind::Insert,
            row_id: Some("o2".to_string()),
        })
        .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.table, Table::Orders);
        assert_eq!(event.kind, EventKind::Insert);
        assert_eq!(event.row_id.as_deref(), Some("o2"));
    }

    #[tokio::test]
    async fn test_subscription_ends_when_feed_closes() {
        let (tx, rx) = broadcast::channel(16);
        let mut sub = Subscription::new(Table::Orders, EventFilter::All, rx);
        drop(tx);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_teardown_runs_on_drop() {
        let (_tx, rx) = broadcast::channel::<ChangeEvent>(16);
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let sub = Subscription::new(Table::Accounts, EventFilter::All, rx)
            .with_teardown(Box::new(move || {
                let _ = done_tx.send(());
            }));
        drop(sub);
        assert!(done_rx.try_recv().is_ok());
    }
}
