use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub backend: BackendConfig,
    pub realtime: RealtimeConfig,
    pub rest: RestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BackendConfig {
    /// REST base URL; the chat socket URL is derived from it.
    pub api_url: String,
    pub token: Option<String>,
    pub user_id: Option<String>,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub heartbeat_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Outbound typing auto-stop.
    pub typing_idle_ms: u64,
    /// How long a remote typing indicator survives without a refresh.
    pub remote_typing_expiry_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30_000,
            reconnect_delay_ms: 3_000,
            max_reconnect_attempts: 5,
            typing_idle_ms: 3_000,
            remote_typing_expiry_ms: 6_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestConfig {
    pub timeout_ms: u64,
    /// Total tries per idempotent request, the first one included.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub messages_page_size: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_attempts: 5,
            retry_delay_ms: 500,
            messages_page_size: 20,
        }
    }
}
