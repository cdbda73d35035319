//! Hosted store REST client
//!
//! PostgREST-style access to the remote tables: `select=*` reads ordered
//! by creation time, inserts with `Prefer: return=representation`,
//! conditional updates expressed as query-filter predicates (an empty
//! representation means the predicate missed), deletes by id filter.

use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::models::{
    Account, AccountPatch, Holding, NewAccount, NewOrder, NewWatchlist, NewWatchlistItem, Order,
    OrderFilter, OrderPatch, OrderStatus, Watchlist, WatchlistItem,
};
use crate::store::{DataStore, Table};

/// REST client over the hosted relational store
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    /// Session bearer; swapped on refresh without rebuilding the client
    bearer: RwLock<Option<String>>,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            bearer: RwLock::new(None),
        }
    }

    /// Replace the session bearer token (e.g. after an auth refresh)
    pub fn set_bearer(&self, token: Option<String>) {
        *self.bearer.write() = token;
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table.as_str())
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", "application/json".parse().unwrap());
        headers.insert("Accept", "application/json".parse().unwrap());
        if let Ok(value) = self.api_key.parse() {
            headers.insert("apikey", value);
        }
        let bearer = self.bearer.read();
        let token = bearer.as_deref().unwrap_or(&self.api_key);
        if let Ok(value) = format!("Bearer {}", token).parse() {
            headers.insert("Authorization", value);
        }
        headers
    }

    /// Map a non-success response to the error taxonomy. Unique-constraint
    /// violations must stay distinguishable from everything else.
    async fn store_error(table: Table, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || body.contains("duplicate key") {
            AppError::Duplicate(format!("{}: {}", table.as_str(), body))
        } else {
            AppError::Store(format!("{} on {}: {}", status, table.as_str(), body))
        }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers())
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::store_error(table, response).await);
        }
        Ok(response.json().await?)
    }

    async fn insert<T: DeserializeOwned, B: Serialize>(&self, table: Table, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(&[body])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::store_error(table, response).await);
        }

        let mut rows: Vec<T> = response.json().await?;
        rows.pop().ok_or_else(|| {
            AppError::Store(format!("{}: insert returned no row", table.as_str()))
        })
    }

    /// PATCH with predicate filters; the returned representation carries
    /// exactly the rows the predicate matched.
    async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        table: Table,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .patch(self.table_url(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(query)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::store_error(table, response).await);
        }
        Ok(response.json().await?)
    }

    async fn delete(&self, table: Table, query: &[(&str, String)]) -> Result<()> {
        let response = self
            .client
            .delete(self.table_url(table))
            .headers(self.headers())
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::store_error(table, response).await);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataStore for RestStore {
    // ----- accounts -----

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.select(
            Table::Accounts,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account> {
        self.insert(Table::Accounts, &new).await
    }

    async fn update_account(&self, id: &str, patch: AccountPatch) -> Result<Account> {
        let mut rows: Vec<Account> = self
            .patch(Table::Accounts, &[("id", format!("eq.{}", id))], &patch)
            .await?;
        rows.pop()
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        self.delete(Table::Accounts, &[("id", format!("eq.{}", id))])
            .await
    }

    // ----- orders -----

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(account_id) = &filter.account_id {
            query.push(("account_id", format!("eq.{}", account_id)));
        }
        if let Some(status) = filter.status {
            query.push(("status", format!("eq.{}", status.as_str())));
        }
        if let Some(symbol) = &filter.symbol {
            query.push(("symbol", format!("eq.{}", symbol)));
        }
        self.select(Table::Orders, &query).await
    }

    async fn insert_order(&self, new: NewOrder) -> Result<Order> {
        self.insert(Table::Orders, &new).await
    }

    async fn update_order_where_status(
        &self,
        id: &str,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Option<Order>> {
        let mut rows: Vec<Order> = self
            .patch(
                Table::Orders,
                &[
                    ("id", format!("eq.{}", id)),
                    ("status", format!("eq.{}", expected.as_str())),
                ],
                &patch,
            )
            .await?;
        // Empty representation: the predicate matched nothing
        Ok(rows.pop())
    }

    // ----- watchlists -----

    async fn list_watchlists(&self) -> Result<Vec<Watchlist>> {
        self.select(
            Table::Watchlists,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_watchlist(&self, new: NewWatchlist) -> Result<Watchlist> {
        self.insert(Table::Watchlists, &new).await
    }

    async fn delete_watchlist(&self, id: &str) -> Result<()> {
        // Item rows cascade server-side via the FK constraint
        self.delete(Table::Watchlists, &[("id", format!("eq.{}", id))])
            .await
    }

    async fn list_watchlist_items(&self, watchlist_id: &str) -> Result<Vec<WatchlistItem>> {
        self.select(
            Table::WatchlistItems,
            &[
                ("select", "*".to_string()),
                ("watchlist_id", format!("eq.{}", watchlist_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_watchlist_item(&self, new: NewWatchlistItem) -> Result<WatchlistItem> {
        self.insert(Table::WatchlistItems, &new).await
    }

    async fn delete_watchlist_item(&self, item_id: &str) -> Result<()> {
        self.delete(Table::WatchlistItems, &[("id", format!("eq.{}", item_id))])
            .await
    }

    // ----- holdings -----

    async fn list_holdings(&self) -> Result<Vec<Holding>> {
        self.select(
            Table::Holdings,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_urls() {
        let store = RestStore::new(&StoreConfig {
            base_url: "http://localhost:3000/".to_string(),
            api_key: "anon".to_string(),
            ws_url: "ws://localhost:4000/realtime".to_string(),
        });
        assert_eq!(
            store.table_url(Table::WatchlistItems),
            "http://localhost:3000/watchlist_items"
        );
        assert_eq!(store.table_url(Table::Orders), "http://localhost:3000/orders");
    }

    #[test]
    fn test_headers_fall_back_to_api_key_bearer() {
        let store = RestStore::new(&StoreConfig {
            base_url: "http://localhost:3000".to_string(),
            api_key: "anon".to_string(),
            ws_url: "ws://localhost:4000/realtime".to_string(),
        });

        let headers = store.headers();
        assert_eq!(headers.get("apikey").unwrap(), "anon");
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer anon");

        store.set_bearer(Some("session-token".to_string()));
        let headers = store.headers();
        assert_eq!(
            headers.get("Authorization").unwrap(),
            "Bearer session-token"
        );
    }
}
