//! Order Service
//!
//! Order placement, listing, and cancellation. Orders are created in
//! `pending` status; fills and rejections come from the external
//! execution process, so the only client-initiated transition is
//! `pending -> cancelled`, enforced by a conditional update at the data
//! layer rather than by UI hiding.

use chrono::Utc;
use tracing::{error, info};

use crate::cache::QueryKey;
use crate::error::{AppError, Result};
use crate::models::{NewOrder, Order, OrderFilter, OrderPatch, OrderSide, OrderStatus, OrderType};
use crate::notifier::Toast;
use crate::state::AppState;

/// Parameters for a trade submission
#[derive(Debug, Clone)]
pub struct NewOrderRequest {
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
}

/// Order service for business logic
pub struct OrderService;

impl OrderService {
    /// List orders, newest submission first. Unfiltered reads go through
    /// the cache; filtered reads hit the store directly so the cache key
    /// space stays enumerable.
    pub async fn list_orders(state: &AppState, filter: &OrderFilter) -> Result<Vec<Order>> {
        if !filter.is_empty() {
            return state.store.list_orders(filter).await;
        }

        let store = state.store.clone();
        let orders = state
            .cache
            .get_or_fetch(QueryKey::Orders, || async move {
                store.list_orders(&OrderFilter::default()).await
            })
            .await?;
        Ok((*orders).clone())
    }

    /// Submit an order. Validates before any remote call; the created
    /// order is `pending` with a server-assigned id and timestamp.
    pub async fn create_order(state: &AppState, request: NewOrderRequest) -> Result<Order> {
        info!(
            "OrderService::create_order - {} {} x{}",
            request.side.as_str(),
            request.symbol,
            request.quantity
        );

        let new = match Self::validate(state, request) {
            Ok(new) => new,
            Err(e) => {
                state.toast(Toast::error("Failed to place order", &e.to_string()));
                return Err(e);
            }
        };

        match state.store.insert_order(new).await {
            Ok(order) => {
                state.cache.invalidate(&QueryKey::Orders);
                state.toast(Toast::success_with_message(
                    "Order placed successfully",
                    &format!(
                        "{} {} shares of {}",
                        order.side.as_str().to_uppercase(),
                        order.quantity,
                        order.symbol
                    ),
                ));
                Ok(order)
            }
            Err(e) => {
                error!("Failed to place order: {}", e);
                state.toast(Toast::error("Failed to place order", &e.to_string()));
                Err(e)
            }
        }
    }

    /// Cancel an order that is still pending. The store applies the
    /// update only WHERE status = pending; a miss means the order already
    /// reached a terminal status and nothing changes.
    pub async fn cancel_order(state: &AppState, order_id: &str) -> Result<Order> {
        info!("OrderService::cancel_order - {}", order_id);

        let patch = OrderPatch {
            status: Some(OrderStatus::Cancelled),
            cancelled_at: Some(Utc::now()),
            ..Default::default()
        };

        let result = state
            .store
            .update_order_where_status(order_id, OrderStatus::Pending, patch)
            .await;

        match result {
            Ok(Some(order)) => {
                state.cache.invalidate(&QueryKey::Orders);
                state.toast(Toast::success_with_message(
                    "Order cancelled",
                    "Your order has been cancelled successfully",
                ));
                Ok(order)
            }
            Ok(None) => {
                let e = AppError::NotCancellable(format!(
                    "Order {} is not pending and cannot be cancelled",
                    order_id
                ));
                state.toast(Toast::error("Failed to cancel order", &e.to_string()));
                Err(e)
            }
            Err(e) => {
                error!("Failed to cancel order {}: {}", order_id, e);
                state.toast(Toast::error("Failed to cancel order", &e.to_string()));
                Err(e)
            }
        }
    }

    // ========================================================================
    // Private Helper Methods
    // ========================================================================

    /// Apply the price policy: limit/stop_limit require a limit price,
    /// stop_loss/stop_limit require a stop price, market orders drop any
    /// supplied price.
    fn validate(state: &AppState, request: NewOrderRequest) -> Result<NewOrder> {
        let symbol = request.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AppError::Validation("Symbol is required".to_string()));
        }
        if !(request.quantity > 0.0) {
            return Err(AppError::Validation(
                "Quantity must be greater than zero".to_string(),
            ));
        }

        let price = match (request.order_type.requires_price(), request.price) {
            (true, None) => {
                return Err(AppError::Validation(format!(
                    "A limit price is required for {:?} orders",
                    request.order_type
                )))
            }
            (true, Some(price)) if price > 0.0 => Some(price),
            (true, Some(_)) => {
                return Err(AppError::Validation(
                    "Limit price must be greater than zero".to_string(),
                ))
            }
            // Ignored even if supplied
            (false, _) => None,
        };

        let stop_price = match (request.order_type.requires_stop_price(), request.stop_price) {
            (true, None) => {
                return Err(AppError::Validation(format!(
                    "A stop price is required for {:?} orders",
                    request.order_type
                )))
            }
            (true, Some(stop)) if stop > 0.0 => Some(stop),
            (true, Some(_)) => {
                return Err(AppError::Validation(
                    "Stop price must be greater than zero".to_string(),
                ))
            }
            (false, _) => None,
        };

        Ok(NewOrder {
            user_id: state.user_id.clone(),
            account_id: request.account_id,
            symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price,
            stop_price,
            status: OrderStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use crate::store::DataStore;

    fn market_buy(symbol: &str) -> NewOrderRequest {
        NewOrderRequest {
            account_id: "a1".to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: 10.0,
            price: None,
            stop_price: None,
        }
    }

    #[tokio::test]
    async fn test_create_order_starts_pending() {
        let (state, _store, notifier) = test_state();

        let order = OrderService::create_order(&state, market_buy("aapl"))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.symbol, "AAPL");
        assert!(order.filled_at.is_none());
        assert_eq!(notifier.titles(), vec!["Order placed successfully"]);
        let toast = &notifier.toasts.lock()[0];
        assert_eq!(toast.message.as_deref(), Some("BUY 10 shares of AAPL"));
    }

    #[tokio::test]
    async fn test_market_order_ignores_supplied_price() {
        let (state, _store, _notifier) = test_state();

        let order = OrderService::create_order(
            &state,
            NewOrderRequest {
                price: Some(123.45),
                ..market_buy("TSLA")
            },
        )
        .await
        .unwrap();
        assert!(order.price.is_none());
    }

    #[tokio::test]
    async fn test_limit_and_stop_price_requirements() {
        let (state, _store, _notifier) = test_state();

        let err = OrderService::create_order(
            &state,
            NewOrderRequest {
                order_type: OrderType::Limit,
                ..market_buy("AAPL")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = OrderService::create_order(
            &state,
            NewOrderRequest {
                order_type: OrderType::StopLoss,
                ..market_buy("AAPL")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Stop-limit needs both prices
        let err = OrderService::create_order(
            &state,
            NewOrderRequest {
                order_type: OrderType::StopLimit,
                price: Some(100.0),
                ..market_buy("AAPL")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let order = OrderService::create_order(
            &state,
            NewOrderRequest {
                order_type: OrderType::StopLimit,
                price: Some(100.0),
                stop_price: Some(95.0),
                ..market_buy("AAPL")
            },
        )
        .await
        .unwrap();
        assert_eq!(order.price, Some(100.0));
        assert_eq!(order.stop_price, Some(95.0));
    }

    #[tokio::test]
    async fn test_quantity_must_be_positive() {
        let (state, _store, _notifier) = test_state();
        let err = OrderService::create_order(
            &state,
            NewOrderRequest {
                quantity: 0.0,
                ..market_buy("AAPL")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_only_while_pending() {
        let (state, store, _notifier) = test_state();
        let order = OrderService::create_order(&state, market_buy("AAPL"))
            .await
            .unwrap();

        let cancelled = OrderService::cancel_order(&state, &order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        // Terminal now; a second cancel must fail and change nothing
        let err = OrderService::cancel_order(&state, &order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotCancellable(_)));

        let orders = store.list_orders(&OrderFilter::default()).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_filled_order_rejected() {
        let (state, store, _notifier) = test_state();
        let order = OrderService::create_order(&state, market_buy("NVDA"))
            .await
            .unwrap();

        // The external execution process fills it first
        store
            .update_order_where_status(
                &order.id,
                OrderStatus::Pending,
                OrderPatch {
                    status: Some(OrderStatus::Filled),
                    filled_quantity: Some(10.0),
                    filled_price: Some(500.0),
                    filled_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        let err = OrderService::cancel_order(&state, &order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotCancellable(_)));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_and_filtered() {
        let (state, _store, _notifier) = test_state();
        OrderService::create_order(&state, market_buy("AAPL"))
            .await
            .unwrap();
        OrderService::create_order(
            &state,
            NewOrderRequest {
                account_id: "a2".to_string(),
                ..market_buy("MSFT")
            },
        )
        .await
        .unwrap();

        let all = OrderService::list_orders(&state, &OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, "MSFT");

        let filtered = OrderService::list_orders(
            &state,
            &OrderFilter {
                account_id: Some("a1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].symbol, "AAPL");
    }
}
