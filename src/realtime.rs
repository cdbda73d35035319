//! Realtime sync layer
//!
//! One change subscription per watched table. Each event only marks the
//! table's cached reads stale (`QueryCache::invalidate_table`) and
//! returns; the refetch happens lazily on the next service read, so
//! server-side changes show up whether or not this session caused them.
//!
//! Teardown is strict: `shutdown()` (or dropping the handle) stops every
//! listener task and releases its subscription.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::QueryCache;
use crate::error::Result;
use crate::store::{ChangeFeed, EventFilter, Table};

/// Tables whose server-side changes must reach this session
const WATCHED_TABLES: [Table; 3] = [Table::Accounts, Table::Orders, Table::Holdings];

/// Running set of per-table change listeners
pub struct RealtimeSync {
    tasks: Vec<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl RealtimeSync {
    /// Subscribe to every watched table and start one listener task per
    /// subscription
    pub async fn start(feed: Arc<dyn ChangeFeed>, cache: Arc<QueryCache>) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(WATCHED_TABLES.len());

        for table in WATCHED_TABLES {
            let mut subscription = feed.subscribe(table, EventFilter::All).await?;
            let cache = cache.clone();
            let mut shutdown = shutdown_rx.clone();

            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        event = subscription.next() => {
                            match event {
                                Some(event) => {
                                    debug!(
                                        "Change on {} ({:?}), invalidating",
                                        event.table.as_str(),
                                        event.kind
                                    );
                                    // Mark stale and return; never block the listener
                                    cache.invalidate_table(event.table);
                                }
                                None => {
                                    debug!("Feed closed for {}", table.as_str());
                                    break;
                                }
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        info!("Realtime sync listening on {} tables", tasks.len());
        Ok(Self {
            tasks,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Stop every listener and drop its subscription
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("Realtime sync stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for RealtimeSync {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        // Aborting drops each task's subscription, which tears it down
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryKey;
    use crate::models::{NewOrder, OrderSide, OrderStatus, OrderType};
    use crate::store::{DataStore, MemoryStore};
    use std::time::Duration;

    fn pending_order(symbol: &str) -> NewOrder {
        NewOrder {
            user_id: "u1".to_string(),
            account_id: "a1".to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: 1.0,
            price: None,
            stop_price: None,
            status: OrderStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_server_side_change_invalidates_cached_read() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(QueryCache::new());
        let mut sync = RealtimeSync::start(store.clone(), cache.clone())
            .await
            .unwrap();

        cache
            .get_or_fetch(QueryKey::Orders, || async { Ok(0u32) })
            .await
            .unwrap();
        assert!(cache.get::<u32>(&QueryKey::Orders).is_some());

        // A mutation this session did not make
        store.insert_order(pending_order("AAPL")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get::<u32>(&QueryKey::Orders).is_none());
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_holdings_change_invalidates_portfolio_aggregate() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(QueryCache::new());
        let mut sync = RealtimeSync::start(store.clone(), cache.clone())
            .await
            .unwrap();

        cache
            .get_or_fetch(QueryKey::Holdings, || async { Ok(1u32) })
            .await
            .unwrap();
        cache
            .get_or_fetch(QueryKey::Portfolio, || async { Ok(2u32) })
            .await
            .unwrap();

        store.record_holding("a1", "NVDA", 4.0, 500.0, 520.0);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get::<u32>(&QueryKey::Holdings).is_none());
        assert!(cache.get::<u32>(&QueryKey::Portfolio).is_none());
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_invalidation() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(QueryCache::new());
        let mut sync = RealtimeSync::start(store.clone(), cache.clone())
            .await
            .unwrap();
        sync.shutdown().await;
        assert!(!sync.is_running());

        cache
            .get_or_fetch(QueryKey::Orders, || async { Ok(7u32) })
            .await
            .unwrap();
        store.insert_order(pending_order("TSLA")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // No listener is left to invalidate the entry
        assert_eq!(cache.get::<u32>(&QueryKey::Orders).as_deref(), Some(&7));
    }
}
