use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Disconnected => "CONNECTION_DISCONNECTED",
            Self::Connecting => "CONNECTION_CONNECTING",
            Self::Connected => "CONNECTION_CONNECTED",
        }
    }
}

/// Observable state of the realtime transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    /// Set once the reconnect budget is exhausted; cleared by an explicit connect.
    pub gave_up: bool,
    pub last_error: Option<String>,
    pub updated_at_unix_ms: u128,
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            gave_up: false,
            last_error: None,
            updated_at_unix_ms: now_unix_ms(),
        }
    }
}

impl ConnectionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

pub fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
