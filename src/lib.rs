//! TradeDesk - Brokerage Account & Trading Dashboard Core
//!
//! Client core for a trading dashboard backed by a hosted relational
//! store with row-level change subscriptions. The services (orders,
//! accounts, watchlists, portfolio) issue typed mutations and cached
//! reads against the store; the realtime sync layer invalidates those
//! cached reads whenever the server reports a row change, so the UI
//! reflects changes made by other sessions or server-side processes.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod notifier;
pub mod notify;
pub mod realtime;
pub mod services;
pub mod state;
pub mod store;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::AppConfig;
use notifier::TracingNotifier;
use notify::{NotifyServer, StaticTokenVerifier};
use realtime::RealtimeSync;
use state::AppState;
use store::{RealtimeFeed, RestStore};

/// Initialize and run the application until ctrl-c
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradedesk=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting TradeDesk...");

    let config = AppConfig::from_env()?;

    let store = Arc::new(RestStore::new(&config.store));
    let feed = Arc::new(RealtimeFeed::new(&config.store));
    let state = Arc::new(AppState::new(
        &config.user_id,
        store,
        feed.clone(),
        Arc::new(TracingNotifier),
        config.sync.clone(),
    ));

    let mut realtime_sync = RealtimeSync::start(feed.clone(), state.cache.clone()).await?;

    let mut notify_server = NotifyServer::new();
    if config.notify.enabled {
        let verifier = Arc::new(StaticTokenVerifier::new(&config.notify.api_tokens));
        notify_server.start(&config.notify, verifier).await?;
    }

    tracing::info!("TradeDesk ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    notify_server.stop();
    realtime_sync.shutdown().await;
    feed.disconnect().await;

    Ok(())
}
