//! Websocket change feed
//!
//! Connects lazily to the hosted store's realtime endpoint, joins one
//! channel per subscribed table, and fans row-change frames out through a
//! broadcast channel. The socket is owned by a spawned task driven by
//! `tokio::select!` over reads, a command channel, and a heartbeat tick.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::store::{ChangeEvent, ChangeFeed, EventFilter, EventKind, Subscription, Table};

const HEARTBEAT_SECS: u64 = 30;

/// Commands sent to the socket task
enum FeedCommand {
    Join(Table),
    Leave(Table),
    Disconnect,
}

/// Change feed over the hosted store's websocket endpoint
pub struct RealtimeFeed {
    ws_url: String,
    api_key: String,
    events: broadcast::Sender<ChangeEvent>,
    sender: Arc<RwLock<Option<mpsc::Sender<FeedCommand>>>>,
    /// Serializes connection attempts so concurrent first subscribes
    /// cannot spawn two socket tasks
    connect_lock: tokio::sync::Mutex<()>,
    /// Live subscriptions per table; the channel is left only when the
    /// last subscriber goes away
    refcounts: Arc<DashMap<Table, usize>>,
}

impl RealtimeFeed {
    pub fn new(config: &StoreConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            ws_url: config.ws_url.clone(),
            api_key: config.api_key.clone(),
            events,
            sender: Arc::new(RwLock::new(None)),
            connect_lock: tokio::sync::Mutex::new(()),
            refcounts: Arc::new(DashMap::new()),
        }
    }

    /// Connect the socket and spawn its driver task. Called lazily from
    /// the first subscribe.
    async fn connect(&self) -> Result<mpsc::Sender<FeedCommand>> {
        let mut url = Url::parse(&self.ws_url)
            .map_err(|e| AppError::Config(format!("Invalid feed url {}: {}", self.ws_url, e)))?;
        if !self.api_key.is_empty() {
            url.query_pairs_mut().append_pair("apikey", &self.api_key);
        }

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<FeedCommand>(64);
        *self.sender.write() = Some(tx.clone());

        info!("Realtime feed connected to {}", self.ws_url);

        let events = self.events.clone();
        let sender_slot = self.sender.clone();

        tokio::spawn(async move {
            let mut heartbeat =
                tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_SECS));
            heartbeat.tick().await; // first tick fires immediately
            let mut frame_ref: u64 = 0;

            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(event) = parse_change_frame(&text) {
                                    // Fire-and-forget; no receivers is fine
                                    let _ = events.send(event);
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = write.send(Message::Pong(payload)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Realtime feed closed");
                                break;
                            }
                            Some(Err(e)) => {
                                error!("Realtime feed error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    Some(cmd) = rx.recv() => {
                        frame_ref += 1;
                        match cmd {
                            FeedCommand::Join(table) => {
                                let frame = channel_frame(table, "phx_join", frame_ref);
                                if let Err(e) = write.send(Message::Text(frame)).await {
                                    error!("Failed to join {}: {}", table.as_str(), e);
                                    break;
                                }
                                debug!("Joined channel for {}", table.as_str());
                            }
                            FeedCommand::Leave(table) => {
                                let frame = channel_frame(table, "phx_leave", frame_ref);
                                let _ = write.send(Message::Text(frame)).await;
                                debug!("Left channel for {}", table.as_str());
                            }
                            FeedCommand::Disconnect => {
                                let _ = write.close().await;
                                break;
                            }
                        }
                    }
                    _ = heartbeat.tick() => {
                        frame_ref += 1;
                        let frame = json!({
                            "topic": "phoenix",
                            "event": "heartbeat",
                            "payload": {},
                            "ref": frame_ref.to_string(),
                        })
                        .to_string();
                        if let Err(e) = write.send(Message::Text(frame)).await {
                            error!("Heartbeat failed: {}", e);
                            break;
                        }
                    }
                }
            }

            // Clear the command slot so the next subscribe reconnects
            sender_slot.write().take();
        });

        Ok(tx)
    }

    async fn ensure_connected(&self) -> Result<mpsc::Sender<FeedCommand>> {
        if let Some(tx) = self.sender.read().clone() {
            return Ok(tx);
        }

        // A racing caller may have connected while we waited for the lock
        let _guard = self.connect_lock.lock().await;
        if let Some(tx) = self.sender.read().clone() {
            return Ok(tx);
        }
        self.connect().await
    }

    /// Close the socket; live subscriptions end on their next read
    pub async fn disconnect(&self) {
        let tx = self.sender.write().take();
        if let Some(tx) = tx {
            let _ = tx.send(FeedCommand::Disconnect).await;
        }
    }
}

#[async_trait::async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(&self, table: Table, filter: EventFilter) -> Result<Subscription> {
        let tx = self.ensure_connected().await?;

        // Join the channel only for the table's first subscriber
        let first = {
            let mut count = self.refcounts.entry(table).or_insert(0);
            *count += 1;
            *count == 1
        };
        if first {
            tx.send(FeedCommand::Join(table))
                .await
                .map_err(|_| AppError::Internal("Realtime feed task is gone".to_string()))?;
        }

        let refcounts = self.refcounts.clone();
        let teardown_tx = tx.clone();
        let subscription = Subscription::new(table, filter, self.events.subscribe())
            .with_teardown(Box::new(move || {
                let last = {
                    let mut count = refcounts.entry(table).or_insert(1);
                    *count = count.saturating_sub(1);
                    *count == 0
                };
                if last {
                    // Non-blocking; a full queue only delays the leave
                    if teardown_tx.try_send(FeedCommand::Leave(table)).is_err() {
                        warn!("Could not send leave for {}", table.as_str());
                    }
                }
            }));

        Ok(subscription)
    }
}

/// Build a channel control frame for one table's topic
fn channel_frame(table: Table, event: &str, frame_ref: u64) -> String {
    json!({
        "topic": format!("realtime:{}", table.as_str()),
        "event": event,
        "payload": {},
        "ref": frame_ref.to_string(),
    })
    .to_string()
}

/// Parse an incoming frame into a change event. Control frames and
/// unknown topics return `None`.
fn parse_change_frame(text: &str) -> Option<ChangeEvent> {
    let frame: serde_json::Value = serde_json::from_str(text).ok()?;

    let topic = frame.get("topic")?.as_str()?;
    let table = parse_table(topic.strip_prefix("realtime:")?)?;

    let kind = match frame.get("event")?.as_str()? {
        "INSERT" => EventKind::Insert,
        "UPDATE" => EventKind::Update,
        "DELETE" => EventKind::Delete,
        _ => return None,
    };

    // Row id comes from the new record, or the old one on deletes
    let payload = frame.get("payload");
    let row_id = payload
        .and_then(|p| p.get("record").or_else(|| p.get("old_record")))
        .and_then(|r| r.get("id"))
        .and_then(|id| id.as_str())
        .map(|id| id.to_string());

    Some(ChangeEvent {
        table,
        kind,
        row_id,
    })
}

fn parse_table(name: &str) -> Option<Table> {
    match name {
        "accounts" => Some(Table::Accounts),
        "orders" => Some(Table::Orders),
        "watchlists" => Some(Table::Watchlists),
        "watchlist_items" => Some(Table::WatchlistItems),
        "holdings" => Some(Table::Holdings),
        _ => None,
    }
}
