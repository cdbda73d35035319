//! Services Layer
//!
//! Business logic between the UI surface and the data store. Each
//! service method takes the shared `AppState`, issues its mutation or
//! cached read, and surfaces the outcome as a toast; the realtime sync
//! layer (or an explicit invalidation here) makes dependent reads
//! refetch afterwards.
//!
//! # Architecture
//!
//! ```text
//! UI pages ──> Services ──> DataStore (REST or in-memory)
//!                 │               │
//!                 │<── QueryCache │
//!                 │        ^      │
//!                 │        └── RealtimeSync <── ChangeFeed
//! ```
//!
//! # Services
//!
//! - `OrderService` - List, place, cancel orders
//! - `AccountService` - Linked accounts, sync/reconnect flows
//! - `WatchlistService` - Watchlists and member symbols
//! - `PortfolioService` - Holdings read model and summary aggregate

pub mod account_service;
pub mod order_service;
pub mod portfolio_service;
pub mod sync_tracker;
pub mod watchlist_service;

// Re-export commonly used types and services
pub use account_service::{AccountService, NewAccountRequest};
pub use order_service::{NewOrderRequest, OrderService};
pub use portfolio_service::{PortfolioService, PortfolioSummary};
pub use sync_tracker::{SyncGuard, SyncKind, SyncTracker};
pub use watchlist_service::WatchlistService;
