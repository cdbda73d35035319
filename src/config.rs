//! Runtime configuration
//!
//! Loaded from environment variables (a `.env` file is honored via
//! `dotenvy` in `run()`), with development defaults for every field.

use std::env;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// User owning this session's rows; a real deployment resolves this
    /// from the identity provider
    pub user_id: String,
    pub store: StoreConfig,
    pub notify: NotifyConfig,
    pub sync: SyncConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: "local-user".to_string(),
            store: StoreConfig::default(),
            notify: NotifyConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Remote data store endpoints and credentials
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// REST base, e.g. `https://example.supabase.co/rest/v1`
    pub base_url: String,
    pub api_key: String,
    /// Change-feed websocket endpoint
    pub ws_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            api_key: String::new(),
            ws_url: "ws://127.0.0.1:4000/realtime".to_string(),
        }
    }
}

/// Notification endpoint server settings
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Accepted bearer credentials as `(user_id, sha256 hex of token)`
    pub api_tokens: Vec<(String, String)>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8787,
            api_tokens: Vec::new(),
        }
    }
}

/// Simulated latencies for the account sync/reconnect flows
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub sync_delay: Duration,
    pub reconnect_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_delay: Duration::from_millis(1500),
            reconnect_delay: Duration::from_millis(2000),
        }
    }
}

impl AppConfig {
    /// Build the configuration from the environment, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = AppConfig::default();

        if let Ok(user_id) = env::var("TRADEDESK_USER_ID") {
            config.user_id = user_id;
        }

        if let Ok(url) = env::var("TRADEDESK_STORE_URL") {
            config.store.base_url = url;
        }
        if let Ok(key) = env::var("TRADEDESK_STORE_API_KEY") {
            config.store.api_key = key;
        }
        if let Ok(url) = env::var("TRADEDESK_STORE_WS_URL") {
            config.store.ws_url = url;
        }

        if let Ok(enabled) = env::var("TRADEDESK_NOTIFY_ENABLED") {
            config.notify.enabled = parse_bool("TRADEDESK_NOTIFY_ENABLED", &enabled)?;
        }
        if let Ok(host) = env::var("TRADEDESK_NOTIFY_HOST") {
            config.notify.host = host;
        }
        if let Ok(port) = env::var("TRADEDESK_NOTIFY_PORT") {
            config.notify.port = port.parse().map_err(|_| {
                AppError::Config(format!("TRADEDESK_NOTIFY_PORT is not a port: {}", port))
            })?;
        }
        if let Ok(tokens) = env::var("TRADEDESK_NOTIFY_TOKENS") {
            config.notify.api_tokens = parse_token_table(&tokens)?;
        }

        if let Ok(ms) = env::var("TRADEDESK_SYNC_DELAY_MS") {
            config.sync.sync_delay = Duration::from_millis(parse_millis("TRADEDESK_SYNC_DELAY_MS", &ms)?);
        }
        if let Ok(ms) = env::var("TRADEDESK_RECONNECT_DELAY_MS") {
            config.sync.reconnect_delay =
                Duration::from_millis(parse_millis("TRADEDESK_RECONNECT_DELAY_MS", &ms)?);
        }

        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Config(format!(
            "{} is not a boolean: {}",
            name, other
        ))),
    }
}

fn parse_millis(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} is not a duration in ms: {}", name, value)))
}

/// Parse `user_id:sha256hex` pairs separated by commas
fn parse_token_table(raw: &str) -> Result<Vec<(String, String)>> {
    let mut table = Vec::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (user_id, digest) = entry.trim().split_once(':').ok_or_else(|| {
            AppError::Config(format!(
                "TRADEDESK_NOTIFY_TOKENS entry missing ':' separator: {}",
                entry
            ))
        })?;
        if user_id.is_empty() || digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(AppError::Config(format!(
                "TRADEDESK_NOTIFY_TOKENS entry is not user_id:sha256hex: {}",
                entry
            )));
        }
        table.push((user_id.to_string(), digest.to_ascii_lowercase()));
    }
    Ok(table)
}
