//! In-process store backend
//!
//! Mirrors the remote store's semantics (newest-first ordering, the
//! `(watchlist_id, symbol)` uniqueness constraint, the conditional order
//! update) and broadcasts its own change events, so the realtime layer
//! behaves identically against it. Used by tests and offline mode.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Account, AccountPatch, Holding, NewAccount, NewOrder, NewWatchlist, NewWatchlistItem, Order,
    OrderFilter, OrderPatch, OrderStatus, Watchlist, WatchlistItem,
};
use crate::store::{ChangeEvent, ChangeFeed, DataStore, EventFilter, EventKind, Subscription, Table};

/// Row wrapper carrying an insertion sequence so newest-first ordering is
/// stable even when timestamps collide
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

pub struct MemoryStore {
    seq: AtomicU64,
    accounts: DashMap<String, Row<Account>>,
    orders: DashMap<String, Row<Order>>,
    watchlists: DashMap<String, Row<Watchlist>>,
    watchlist_items: DashMap<String, Row<WatchlistItem>>,
    holdings: DashMap<String, Row<Holding>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            seq: AtomicU64::new(0),
            accounts: DashMap::new(),
            orders: DashMap::new(),
            watchlists: DashMap::new(),
            watchlist_items: DashMap::new(),
            holdings: DashMap::new(),
            events,
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn emit(&self, table: Table, kind: EventKind, row_id: &str) {
        // No receivers is fine; events are fire-and-forget
        let _ = self.events.send(ChangeEvent {
            table,
            kind,
            row_id: Some(row_id.to_string()),
        });
    }

    fn sorted_desc<T: Clone>(rows: &DashMap<String, Row<T>>) -> Vec<T> {
        let mut all: Vec<(u64, T)> = rows
            .iter()
            .map(|entry| (entry.seq, entry.value.clone()))
            .collect();
        all.sort_by(|a, b| b.0.cmp(&a.0));
        all.into_iter().map(|(_, value)| value).collect()
    }

    /// Record or refresh a holding row the way the external execution
    /// process would. Upserts by `(account_id, symbol)`.
    pub fn record_holding(
        &self,
        account_id: &str,
        symbol: &str,
        quantity: f64,
        average_cost: f64,
        current_price: f64,
    ) -> Holding {
        let now = Utc::now();

        let existing_id = self
            .holdings
            .iter()
            .find(|entry| entry.value.account_id == account_id && entry.value.symbol == symbol)
            .map(|entry| entry.value.id.clone());

        if let Some(id) = existing_id {
            let updated = self.holdings.get_mut(&id).map(|mut entry| {
                entry.value.quantity = quantity;
                entry.value.average_cost = average_cost;
                entry.value.current_price = current_price;
                entry.value.updated_at = now;
                entry.value.clone()
            });
            if let Some(updated) = updated {
                self.emit(Table::Holdings, EventKind::Update, &id);
                return updated;
            }
        }

        let holding = Holding {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            symbol: symbol.to_string(),
            quantity,
            average_cost,
            current_price,
            created_at: now,
            updated_at: now,
        };
        self.holdings.insert(
            holding.id.clone(),
            Row {
                seq: self.next_seq(),
                value: holding.clone(),
            },
        );
        self.emit(Table::Holdings, EventKind::Insert, &holding.id);
        holding
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    // ----- accounts -----

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(Self::sorted_desc(&self.accounts))
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            name: new.name,
            account_type: new.account_type,
            broker_name: new.broker_name,
            account_number: new.account_number,
            is_connected: new.is_connected,
            last_synced_at: new.last_synced_at,
            balance: new.balance,
            buying_power: new.buying_power,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(
            account.id.clone(),
            Row {
                seq: self.next_seq(),
                value: account.clone(),
            },
        );
        self.emit(Table::Accounts, EventKind::Insert, &account.id);
        Ok(account)
    }

    async fn update_account(&self, id: &str, patch: AccountPatch) -> Result<Account> {
        let updated = {
            let mut entry = self
                .accounts
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))?;

            let account = &mut entry.value;
            if let Some(name) = patch.name {
                account.name = name;
            }
            if let Some(broker_name) = patch.broker_name {
                account.broker_name = Some(broker_name);
            }
            if let Some(is_connected) = patch.is_connected {
                account.is_connected = is_connected;
            }
            if let Some(last_synced_at) = patch.last_synced_at {
                account.last_synced_at = Some(last_synced_at);
            }
            if let Some(balance) = patch.balance {
                account.balance = balance;
            }
            if let Some(buying_power) = patch.buying_power {
                account.buying_power = buying_power;
            }
            account.updated_at = Utc::now();
            account.clone()
        };
        self.emit(Table::Accounts, EventKind::Update, id);
        Ok(updated)
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        self.accounts
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))?;
        self.emit(Table::Accounts, EventKind::Delete, id);
        Ok(())
    }

    // ----- orders -----

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut all: Vec<(u64, Order)> = self
            .orders
            .iter()
            .filter(|entry| filter.matches(&entry.value))
            .map(|entry| (entry.seq, entry.value.clone()))
            .collect();
        all.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(all.into_iter().map(|(_, order)| order).collect())
    }

    async fn insert_order(&self, new: NewOrder) -> Result<Order> {
        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            account_id: new.account_id,
            symbol: new.symbol,
            side: new.side,
            order_type: new.order_type,
            quantity: new.quantity,
            price: new.price,
            stop_price: new.stop_price,
            status: new.status,
            filled_quantity: None,
            filled_price: None,
            created_at: Utc::now(),
            filled_at: None,
            cancelled_at: None,
        };
        self.orders.insert(
            order.id.clone(),
            Row {
                seq: self.next_seq(),
                value: order.clone(),
            },
        );
        self.emit(Table::Orders, EventKind::Insert, &order.id);
        Ok(order)
    }

    async fn update_order_where_status(
        &self,
        id: &str,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Option<Order>> {
        let updated = {
            let mut entry = match self.orders.get_mut(id) {
                Some(entry) => entry,
                None => return Ok(None),
            };

            // The predicate: no match, no mutation
            if entry.value.status != expected {
                return Ok(None);
            }

            let order = &mut entry.value;
            if let Some(status) = patch.status {
                order.status = status;
            }
            if let Some(filled_quantity) = patch.filled_quantity {
                order.filled_quantity = Some(filled_quantity);
            }
            if let Some(filled_price) = patch.filled_price {
                order.filled_price = Some(filled_price);
            }
            if let Some(filled_at) = patch.filled_at {
                order.filled_at = Some(filled_at);
            }
            if let Some(cancelled_at) = patch.cancelled_at {
                order.cancelled_at = Some(cancelled_at);
            }
            order.clone()
        };
        self.emit(Table::Orders, EventKind::Update, id);
        Ok(Some(updated))
    }

    // ----- watchlists -----

    async fn list_watchlists(&self) -> Result<Vec<Watchlist>> {
        Ok(Self::sorted_desc(&self.watchlists))
    }

    async fn insert_watchlist(&self, new: NewWatchlist) -> Result<Watchlist> {
        let now = Utc::now();
        let watchlist = Watchlist {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            name: new.name,
            created_at: now,
            updated_at: now,
        };
        self.watchlists.insert(
            watchlist.id.clone(),
            Row {
                seq: self.next_seq(),
                value: watchlist.clone(),
            },
        );
        self.emit(Table::Watchlists, EventKind::Insert, &watchlist.id);
        Ok(watchlist)
    }

    async fn delete_watchlist(&self, id: &str) -> Result<()> {
        self.watchlists
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("Watchlist {} not found", id)))?;

        // Cascade to member items
        let member_ids: Vec<String> = self
            .watchlist_items
            .iter()
            .filter(|entry| entry.value.watchlist_id == id)
            .map(|entry| entry.value.id.clone())
            .collect();
        for item_id in member_ids {
            self.watchlist_items.remove(&item_id);
            self.emit(Table::WatchlistItems, EventKind::Delete, &item_id);
        }

        self.emit(Table::Watchlists, EventKind::Delete, id);
        Ok(())
    }

    async fn list_watchlist_items(&self, watchlist_id: &str) -> Result<Vec<WatchlistItem>> {
        let mut all: Vec<(u64, WatchlistItem)> = self
            .watchlist_items
            .iter()
            .filter(|entry| entry.value.watchlist_id == watchlist_id)
            .map(|entry| (entry.seq, entry.value.clone()))
            .collect();
        all.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(all.into_iter().map(|(_, item)| item).collect())
    }

    async fn insert_watchlist_item(&self, new: NewWatchlistItem) -> Result<WatchlistItem> {
        let duplicate = self.watchlist_items.iter().any(|entry| {
            entry.value.watchlist_id == new.watchlist_id && entry.value.symbol == new.symbol
        });
        if duplicate {
            return Err(AppError::Duplicate(format!(
                "duplicate key: {} is already in watchlist {}",
                new.symbol, new.watchlist_id
            )));
        }

        let item = WatchlistItem {
            id: Uuid::new_v4().to_string(),
            watchlist_id: new.watchlist_id,
            symbol: new.symbol,
            notes: new.notes,
            created_at: Utc::now(),
        };
        self.watchlist_items.insert(
            item.id.clone(),
            Row {
                seq: self.next_seq(),
                value: item.clone(),
            },
        );
        self.emit(Table::WatchlistItems, EventKind::Insert, &item.id);
        Ok(item)
    }

    async fn delete_watchlist_item(&self, item_id: &str) -> Result<()> {
        self.watchlist_items
            .remove(item_id)
            .ok_or_else(|| AppError::NotFound(format!("Watchlist item {} not found", item_id)))?;
        self.emit(Table::WatchlistItems, EventKind::Delete, item_id);
        Ok(())
    }

    // ----- holdings -----

    async fn list_holdings(&self) -> Result<Vec<Holding>> {
        Ok(Self::sorted_desc(&self.holdings))
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, table: Table, filter: EventFilter) -> Result<Subscription> {
        Ok(Subscription::new(table, filter, self.events.subscribe()))
    }
}
