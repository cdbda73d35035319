//! Domain models shared across services and store backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Linked brokerage account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub account_type: AccountType,
    pub broker_name: Option<String>,
    /// Last 4 digits only
    pub account_number: Option<String>,
    pub is_connected: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub balance: f64,
    pub buying_power: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Brokerage,
    Ira,
    RothIra,
    #[serde(rename = "401k")]
    FourOhOneK,
    Taxable,
}

/// Insert payload for accounts
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub user_id: String,
    pub name: String,
    pub account_type: AccountType,
    pub broker_name: Option<String>,
    pub account_number: Option<String>,
    pub is_connected: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub balance: f64,
    pub buying_power: f64,
}

/// Partial update for accounts; unset fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buying_power: Option<f64>,
}

/// Buy/sell instruction against one account for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub status: OrderStatus,
    pub filled_quantity: Option<f64>,
    pub filled_price: Option<f64>,
    /// Submission timestamp
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    StopLimit,
}

impl OrderType {
    /// Limit price is meaningful only for these types
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::StopLoss | OrderType::StopLimit)
    }
}

/// `pending -> {filled, cancelled, rejected}`, all terminal. Only
/// `pending -> cancelled` is client-initiated; fills and rejections come
/// from the external execution process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }
}

/// Insert payload for orders
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub user_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub status: OrderStatus,
}

/// Partial update for orders
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Read filter for order listings. An empty filter selects everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub account_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub symbol: Option<String>,
}

impl OrderFilter {
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none() && self.status.is_none() && self.symbol.is_none()
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.account_id
            .as_ref()
            .map_or(true, |id| *id == order.account_id)
            && self.status.map_or(true, |s| s == order.status)
            && self.symbol.as_ref().map_or(true, |s| *s == order.symbol)
    }
}

/// Named group of tracked symbols
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchlist {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWatchlist {
    pub user_id: String,
    pub name: String,
}

/// Member symbol of a watchlist. `(watchlist_id, symbol)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: String,
    pub watchlist_id: String,
    pub symbol: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWatchlistItem {
    pub watchlist_id: String,
    pub symbol: String,
    pub notes: Option<String>,
}

/// Position row produced by the external execution process. Read-only
/// from this client's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub id: String,
    pub account_id: String,
    pub symbol: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub current_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_cost
    }

    pub fn gain_loss(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    pub fn gain_loss_percent(&self) -> f64 {
        let basis = self.cost_basis();
        if basis == 0.0 {
            0.0
        } else {
            self.gain_loss() / basis * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&AccountType::FourOhOneK).unwrap(),
            "\"401k\""
        );
        assert_eq!(
            serde_json::to_string(&AccountType::RothIra).unwrap(),
            "\"roth_ira\""
        );
        assert_eq!(
            serde_json::to_string(&OrderType::StopLimit).unwrap(),
            "\"stop_limit\""
        );
        assert_eq!(
            serde_json::from_str::<OrderStatus>("\"cancelled\"").unwrap(),
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn test_order_type_price_requirements() {
        assert!(!OrderType::Market.requires_price());
        assert!(OrderType::Limit.requires_price());
        assert!(!OrderType::StopLoss.requires_price());
        assert!(OrderType::StopLimit.requires_price());

        assert!(!OrderType::Market.requires_stop_price());
        assert!(!OrderType::Limit.requires_stop_price());
        assert!(OrderType::StopLoss.requires_stop_price());
        assert!(OrderType::StopLimit.requires_stop_price());
    }

    #[test]
    fn test_holding_derived_values() {
        let holding = Holding {
            id: "h1".to_string(),
            account_id: "a1".to_string(),
            symbol: "AAPL".to_string(),
            quantity: 10.0,
            average_cost: 100.0,
            current_price: 110.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(holding.market_value(), 1100.0);
        assert_eq!(holding.cost_basis(), 1000.0);
        assert_eq!(holding.gain_loss(), 100.0);
        assert!((holding.gain_loss_percent() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_order_filter_matches() {
        let order = Order {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            account_id: "a1".to_string(),
            symbol: "TSLA".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: 5.0,
            price: None,
            stop_price: None,
            status: OrderStatus::Pending,
            filled_quantity: None,
            filled_price: None,
            created_at: Utc::now(),
            filled_at: None,
            cancelled_at: None,
        };

        assert!(OrderFilter::default().matches(&order));
        assert!(OrderFilter {
            account_id: Some("a1".to_string()),
            status: Some(OrderStatus::Pending),
            ..Default::default()
        }
        .matches(&order));
        assert!(!OrderFilter {
            status: Some(OrderStatus::Filled),
            ..Default::default()
        }
        .matches(&order));
    }
}
