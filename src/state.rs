//! Application state management

use std::sync::Arc;

use crate::cache::QueryCache;
use crate::config::SyncConfig;
use crate::notifier::{Notifier, Toast};
use crate::services::sync_tracker::SyncTracker;
use crate::store::{ChangeFeed, DataStore};

/// Shared state handed to every service call
pub struct AppState {
    /// The authenticated user owning this session's rows
    pub user_id: String,

    /// Remote (or in-process) data store
    pub store: Arc<dyn DataStore>,

    /// Row-change feed for the realtime sync layer
    pub feed: Arc<dyn ChangeFeed>,

    /// Read-through query cache
    pub cache: Arc<QueryCache>,

    /// Advisory in-flight set for account sync/reconnect
    pub sync_tracker: SyncTracker,

    /// Toast sink for user-facing outcomes
    pub notifier: Arc<dyn Notifier>,

    /// Simulated latencies for sync/reconnect
    pub sync: SyncConfig,
}

impl AppState {
    pub fn new(
        user_id: &str,
        store: Arc<dyn DataStore>,
        feed: Arc<dyn ChangeFeed>,
        notifier: Arc<dyn Notifier>,
        sync: SyncConfig,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            store,
            feed,
            cache: Arc::new(QueryCache::new()),
            sync_tracker: SyncTracker::new(),
            notifier,
            sync,
        }
    }

    /// Emit a toast; never fails the operation that produced it
    pub fn toast(&self, toast: Toast) {
        self.notifier.notify(toast);
    }
}
