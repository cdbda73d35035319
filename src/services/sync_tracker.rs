//! Advisory in-flight tracking for account sync/reconnect
//!
//! One operation per account at a time, tracked by an explicit set keyed
//! by account id so the UI can disable duplicate triggers. This is
//! advisory only: it is not a server-side lock, and bypassing it still
//! yields last-write-wins outcomes because store updates are single-row
//! and atomic.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{AppError, Result};

/// Which long-running account operation is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Sync,
    Reconnect,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Sync => "sync",
            SyncKind::Reconnect => "reconnect",
        }
    }
}

/// Session-scoped set of accounts with a sync or reconnect in flight
#[derive(Clone)]
pub struct SyncTracker {
    in_flight: Arc<DashMap<String, SyncKind>>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Claim the account for `kind`. Fails with `SyncInFlight` when any
    /// sync or reconnect is already running for it; the guard releases
    /// the claim on drop, on every exit path.
    pub fn begin(&self, account_id: &str, kind: SyncKind) -> Result<SyncGuard> {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(account_id.to_string()) {
            Entry::Occupied(entry) => Err(AppError::SyncInFlight(format!(
                "{} already running for account {}",
                entry.get().as_str(),
                account_id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(kind);
                Ok(SyncGuard {
                    in_flight: self.in_flight.clone(),
                    account_id: account_id.to_string(),
                })
            }
        }
    }

    /// Whether the account has an operation in flight (drives the UI's
    /// disabled states)
    pub fn is_in_flight(&self, account_id: &str) -> bool {
        self.in_flight.contains_key(account_id)
    }

    pub fn kind_for(&self, account_id: &str) -> Option<SyncKind> {
        self.in_flight.get(account_id).map(|entry| *entry)
    }
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the account's claim when dropped
#[derive(Debug)]
pub struct SyncGuard {
    in_flight: Arc<DashMap<String, SyncKind>>,
    account_id: String,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.account_id);
    }
}
