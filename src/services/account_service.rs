//! Account Service
//!
//! Linked-account CRUD plus the connect/sync/reconnect flows. Sync and
//! reconnect simulate broker latency and are guarded by the advisory
//! in-flight tracker so the UI cannot trigger duplicates for one account.

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::cache::QueryKey;
use crate::error::{AppError, Result};
use crate::models::{Account, AccountPatch, AccountType, NewAccount};
use crate::notifier::Toast;
use crate::services::sync_tracker::SyncKind;
use crate::state::AppState;

/// Parameters for linking a new account
#[derive(Debug, Clone)]
pub struct NewAccountRequest {
    pub name: String,
    pub broker_name: String,
    pub account_type: AccountType,
    /// Last 4 digits only
    pub account_number: Option<String>,
}

/// Account service for business logic
pub struct AccountService;

impl AccountService {
    /// List accounts, newest-created first. Reads through the cache.
    pub async fn list_accounts(state: &AppState) -> Result<Vec<Account>> {
        let store = state.store.clone();
        let accounts = state
            .cache
            .get_or_fetch(QueryKey::Accounts, || async move {
                store.list_accounts().await
            })
            .await?;
        Ok((*accounts).clone())
    }

    /// Link a new brokerage account. Starts connected with zero balances
    /// and a fresh sync timestamp.
    pub async fn create_account(state: &AppState, request: NewAccountRequest) -> Result<Account> {
        info!("AccountService::create_account - {}", request.name);

        let name = request.name.trim();
        let broker_name = request.broker_name.trim();
        if name.is_empty() || broker_name.is_empty() {
            state.toast(Toast::error(
                "Missing information",
                "Please fill in all required fields",
            ));
            let field = if name.is_empty() { "Account" } else { "Broker" };
            return Err(AppError::Validation(format!("{} name is required", field)));
        }

        let new = NewAccount {
            user_id: state.user_id.clone(),
            name: name.to_string(),
            account_type: request.account_type,
            broker_name: Some(broker_name.to_string()),
            account_number: request
                .account_number
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            is_connected: true,
            last_synced_at: Some(Utc::now()),
            balance: 0.0,
            buying_power: 0.0,
        };

        match state.store.insert_account(new).await {
            Ok(account) => {
                state.cache.invalidate(&QueryKey::Accounts);
                state.toast(Toast::success("Account created successfully"));
                Ok(account)
            }
            Err(e) => {
                error!("Failed to create account: {}", e);
                state.toast(Toast::error("Failed to create account", &e.to_string()));
                Err(e)
            }
        }
    }

    /// Refresh the account's data from its broker (simulated). Rejected
    /// while disconnected; blocked while another sync/reconnect is in
    /// flight for the same account.
    pub async fn sync_account(state: &AppState, account_id: &str) -> Result<Account> {
        info!("AccountService::sync_account - {}", account_id);

        let _guard = match state.sync_tracker.begin(account_id, SyncKind::Sync) {
            Ok(guard) => guard,
            Err(e) => {
                state.toast(Toast::error(
                    "Sync already in progress",
                    "Wait for the current operation to finish",
                ));
                return Err(e);
            }
        };

        let account = Self::find_account(state, account_id).await?;
        if !account.is_connected {
            state.toast(Toast::error(
                "Sync failed",
                "Reconnect the account before syncing",
            ));
            return Err(AppError::Validation(format!(
                "Account {} is disconnected; reconnect before syncing",
                account_id
            )));
        }

        // Simulated broker latency; a real integration would refresh
        // balances here
        tokio::time::sleep(state.sync.sync_delay).await;

        let patch = AccountPatch {
            last_synced_at: Some(Utc::now()),
            is_connected: Some(true),
            ..Default::default()
        };

        match state.store.update_account(account_id, patch).await {
            Ok(account) => {
                state.cache.invalidate(&QueryKey::Accounts);
                state.toast(Toast::success_with_message(
                    "Account synced",
                    "Your account data has been updated successfully",
                ));
                Ok(account)
            }
            Err(e) => {
                error!("Failed to sync account {}: {}", account_id, e);
                state.toast(Toast::error(
                    "Sync failed",
                    "Unable to sync account. Please try again.",
                ));
                Err(e)
            }
        }
    }

    /// Re-authenticate a dropped connection (simulated). Repairs
    /// `is_connected` and refreshes the sync timestamp.
    pub async fn reconnect_account(state: &AppState, account_id: &str) -> Result<Account> {
        info!("AccountService::reconnect_account - {}", account_id);

        let _guard = match state.sync_tracker.begin(account_id, SyncKind::Reconnect) {
            Ok(guard) => guard,
            Err(e) => {
                state.toast(Toast::error(
                    "Reconnection already in progress",
                    "Wait for the current operation to finish",
                ));
                return Err(e);
            }
        };

        // Ensure the account exists before simulating re-auth
        Self::find_account(state, account_id).await?;

        tokio::time::sleep(state.sync.reconnect_delay).await;

        let patch = AccountPatch {
            is_connected: Some(true),
            last_synced_at: Some(Utc::now()),
            ..Default::default()
        };

        match state.store.update_account(account_id, patch).await {
            Ok(account) => {
                state.cache.invalidate(&QueryKey::Accounts);
                state.toast(Toast::success_with_message(
                    "Account reconnected",
                    "Your account has been successfully reconnected",
                ));
                Ok(account)
            }
            Err(e) => {
                error!("Failed to reconnect account {}: {}", account_id, e);
                state.toast(Toast::error(
                    "Reconnection failed",
                    "Unable to reconnect account. Please try again.",
                ));
                Err(e)
            }
        }
    }

    /// Remove the account and its synced data. Irreversible; the UI
    /// confirms with the user before calling this.
    pub async fn delete_account(state: &AppState, account_id: &str) -> Result<()> {
        info!("AccountService::delete_account - {}", account_id);

        match state.store.delete_account(account_id).await {
            Ok(()) => {
                state.cache.invalidate(&QueryKey::Accounts);
                state.toast(Toast::success_with_message(
                    "Account disconnected",
                    "Your account has been removed successfully",
                ));
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete account {}: {}", account_id, e);
                state.toast(Toast::error(
                    "Disconnection failed",
                    "Unable to disconnect account. Please try again.",
                ));
                Err(e)
            }
        }
    }

    /// Human-readable time since the last sync. Pure; the UI calls this
    /// per account card.
    pub fn time_since_sync(last_synced_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
        let synced = match last_synced_at {
            Some(ts) => ts,
            None => return "Never synced".to_string(),
        };

        let minutes = (now - synced).num_minutes();
        if minutes < 1 {
            return "Just now".to_string();
        }
        if minutes < 60 {
            return format!("{} minute{} ago", minutes, plural(minutes));
        }

        let hours = minutes / 60;
        if hours < 24 {
            return format!("{} hour{} ago", hours, plural(hours));
        }

        let days = hours / 24;
        format!("{} day{} ago", days, plural(days))
    }

    // ========================================================================
    // Private Helper Methods
    // ========================================================================

    async fn find_account(state: &AppState, account_id: &str) -> Result<Account> {
        let accounts = Self::list_accounts(state).await?;
        accounts
            .into_iter()
            .find(|a| a.id == account_id)
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use crate::store::DataStore;
    use chrono::Duration;

    fn request(name: &str) -> NewAccountRequest {
        NewAccountRequest {
            name: name.to_string(),
            broker_name: "Fidelity".to_string(),
            account_type: AccountType::Brokerage,
            account_number: Some("4821".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_account_defaults() {
        let (state, _store, notifier) = test_state();

        let account = AccountService::create_account(&state, request("Main"))
            .await
            .unwrap();
        assert!(account.is_connected);
        assert_eq!(account.balance, 0.0);
        assert_eq!(account.buying_power, 0.0);
        assert!(account.last_synced_at.is_some());
        assert_eq!(account.user_id, "user-1");
        assert_eq!(notifier.titles(), vec!["Account created successfully"]);
    }

    #[tokio::test]
    async fn test_create_account_requires_trimmed_names() {
        let (state, _store, notifier) = test_state();

        let err = AccountService::create_account(
            &state,
            NewAccountRequest {
                name: "   ".to_string(),
                ..request("x")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = AccountService::create_account(
            &state,
            NewAccountRequest {
                broker_name: "".to_string(),
                ..request("Main")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Both rejections tell the user what went wrong
        assert_eq!(
            notifier.titles(),
            vec!["Missing information", "Missing information"]
        );
    }

    #[tokio::test]
    async fn test_sync_refreshes_timestamp_and_connection() {
        let (state, _store, _notifier) = test_state();
        let account = AccountService::create_account(&state, request("Main"))
            .await
            .unwrap();
        let before = account.last_synced_at.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let synced = AccountService::sync_account(&state, &account.id)
            .await
            .unwrap();
        assert!(synced.is_connected);
        assert!(synced.last_synced_at.unwrap() > before);
    }

    #[tokio::test]
    async fn test_sync_rejected_while_disconnected() {
        let (state, store, notifier) = test_state();
        let account = AccountService::create_account(&state, request("Main"))
            .await
            .unwrap();

        // Simulated connection failure
        store
            .update_account(
                &account.id,
                AccountPatch {
                    is_connected: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        state.cache.invalidate(&QueryKey::Accounts);

        let err = AccountService::sync_account(&state, &account.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(notifier.titles().contains(&"Sync failed".to_string()));

        // Reconnect repairs the connection
        let repaired = AccountService::reconnect_account(&state, &account.id)
            .await
            .unwrap();
        assert!(repaired.is_connected);
    }

    #[tokio::test]
    async fn test_concurrent_sync_blocked_at_advisory_layer() {
        let (state, _store, notifier) = test_state();
        let account = AccountService::create_account(&state, request("Main"))
            .await
            .unwrap();

        let state = std::sync::Arc::new(state);
        let first = {
            let state = state.clone();
            let id = account.id.clone();
            tokio::spawn(async move { AccountService::sync_account(&state, &id).await })
        };

        // Let the first sync claim the account and park in its delay
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let err = AccountService::reconnect_account(&state, &account.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SyncInFlight(_)));
        assert!(notifier
            .titles()
            .contains(&"Reconnection already in progress".to_string()));

        first.await.unwrap().unwrap();

        // Claim released once the first sync finished
        AccountService::sync_account(&state, &account.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deleted_account_never_listed() {
        let (state, _store, _notifier) = test_state();
        let keep = AccountService::create_account(&state, request("Keep"))
            .await
            .unwrap();
        let removed = AccountService::create_account(&state, request("Drop"))
            .await
            .unwrap();

        AccountService::delete_account(&state, &removed.id)
            .await
            .unwrap();

        let accounts = AccountService::list_accounts(&state).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, keep.id);
    }

    #[test]
    fn test_time_since_sync_buckets() {
        let now = Utc::now();
        assert_eq!(AccountService::time_since_sync(None, now), "Never synced");
        assert_eq!(
            AccountService::time_since_sync(Some(now - Duration::seconds(45)), now),
            "Just now"
        );
        assert_eq!(
            AccountService::time_since_sync(Some(now - Duration::seconds(90)), now),
            "1 minute ago"
        );
        assert_eq!(
            AccountService::time_since_sync(Some(now - Duration::minutes(5)), now),
            "5 minutes ago"
        );
        assert_eq!(
            AccountService::time_since_sync(Some(now - Duration::seconds(7200)), now),
            "2 hours ago"
        );
        assert_eq!(
            AccountService::time_since_sync(Some(now - Duration::hours(1)), now),
            "1 hour ago"
        );
        assert_eq!(
            AccountService::time_since_sync(Some(now - Duration::days(3)), now),
            "3 days ago"
        );
        assert_eq!(
            AccountService::time_since_sync(Some(now - Duration::hours(25)), now),
            "1 day ago"
        );
    }
}
