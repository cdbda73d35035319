//! Process-scoped query cache
//!
//! Cached reads are keyed by logical query identity, never by ad-hoc
//! strings, so the invalidation surface stays enumerable. Invalidation
//! only removes entries; the next read through `get_or_fetch` refetches
//! lazily. Nothing here blocks.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::store::Table;

/// Logical identity of a cached read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Accounts,
    Orders,
    Watchlists,
    /// Items of one watchlist
    WatchlistItems(String),
    Holdings,
    /// Derived aggregate over holdings
    Portfolio,
}

/// Read-through cache with explicit invalidation
pub struct QueryCache {
    entries: DashMap<QueryKey, Arc<dyn Any + Send + Sync>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the cached value for `key`, fetching and storing it on a
    /// miss. The stored type must be consistent per key.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(entry) = self.entries.get(&key) {
            return entry
                .clone()
                .downcast::<T>()
                .map_err(|_| AppError::Internal(format!("Cache type mismatch for {:?}", key)));
        }

        let value = Arc::new(fetch().await?);
        self.entries
            .insert(key, value.clone() as Arc<dyn Any + Send + Sync>);
        Ok(value)
    }

    /// Peek without fetching
    pub fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.entries
            .get(key)
            .and_then(|entry| entry.clone().downcast::<T>().ok())
    }

    /// Drop one cached read
    pub fn invalidate(&self, key: &QueryKey) {
        self.entries.remove(key);
    }

    /// Drop every cached read that depends on `table`. Holdings feed the
    /// portfolio aggregate, so both fall together; watchlist item keys
    /// are per-watchlist and are cleared wholesale.
    pub fn invalidate_table(&self, table: Table) {
        debug!("Invalidating cached reads for table {}", table.as_str());
        match table {
            Table::Accounts => self.invalidate(&QueryKey::Accounts),
            Table::Orders => self.invalidate(&QueryKey::Orders),
            Table::Watchlists => self.invalidate(&QueryKey::Watchlists),
            Table::WatchlistItems => {
                self.entries
                    .retain(|key, _| !matches!(key, QueryKey::WatchlistItems(_)));
            }
            Table::Holdings => {
                self.invalidate(&QueryKey::Holdings);
                self.invalidate(&QueryKey::Portfolio);
            }
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_through_fetches_once() {
        let cache = QueryCache::new();

        let first = cache
            .get_or_fetch(QueryKey::Orders, || async { Ok(vec![1, 2, 3]) })
            .await
            .unwrap();
        assert_eq!(*first, vec![1, 2, 3]);

        // Second read must come from the cache, not the fetch closure
        let second = cache
            .get_or_fetch::<Vec<i32>, _, _>(QueryKey::Orders, || async {
                panic!("fetch ran on a cache hit")
            })
            .await
            .unwrap();
        assert_eq!(*second, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = QueryCache::new();

        cache
            .get_or_fetch(QueryKey::Accounts, || async { Ok(1u32) })
            .await
            .unwrap();
        cache.invalidate(&QueryKey::Accounts);

        let value = cache
            .get_or_fetch(QueryKey::Accounts, || async { Ok(2u32) })
            .await
            .unwrap();
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_holdings_invalidation_takes_portfolio_with_it() {
        let cache = QueryCache::new();
        cache
            .get_or_fetch(QueryKey::Holdings, || async { Ok(10u32) })
            .await
            .unwrap();
        cache
            .get_or_fetch(QueryKey::Portfolio, || async { Ok(20u32) })
            .await
            .unwrap();
        cache
            .get_or_fetch(QueryKey::Orders, || async { Ok(30u32) })
            .await
            .unwrap();

        cache.invalidate_table(Table::Holdings);

        assert!(cache.get::<u32>(&QueryKey::Holdings).is_none());
        assert!(cache.get::<u32>(&QueryKey::Portfolio).is_none());
        assert_eq!(cache.get::<u32>(&QueryKey::Orders).as_deref(), Some(&30));
    }

    #[tokio::test]
    async fn test_watchlist_items_cleared_wholesale() {
        let cache = QueryCache::new();
        cache
            .get_or_fetch(QueryKey::WatchlistItems("w1".to_string()), || async {
                Ok(1u32)
            })
            .await
            .unwrap();
        cache
            .get_or_fetch(QueryKey::WatchlistItems("w2".to_string()), || async {
                Ok(2u32)
            })
            .await
            .unwrap();
        cache
            .get_or_fetch(QueryKey::Watchlists, || async { Ok(3u32) })
            .await
            .unwrap();

        cache.invalidate_table(Table::WatchlistItems);

        assert!(cache
            .get::<u32>(&QueryKey::WatchlistItems("w1".to_string()))
            .is_none());
        assert!(cache
            .get::<u32>(&QueryKey::WatchlistItems("w2".to_string()))
            .is_none());
        assert!(cache.get::<u32>(&QueryKey::Watchlists).is_some());
    }
}
