use serde::Deserialize;

use crate::infra::config::{AppConfig, BackendConfig, LogConfig, RealtimeConfig, RestConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub backend: Option<FileBackendConfig>,
    pub realtime: Option<FileRealtimeConfig>,
    pub rest: Option<FileRestConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(backend) = self.backend {
            backend.merge_into(&mut config.backend);
        }

        if let Some(realtime) = self.realtime {
            realtime.merge_into(&mut config.realtime);
        }

        if let Some(rest) = self.rest {
            rest.merge_into(&mut config.rest);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Deserialize, Default)]
pub struct FileBackendConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
}

impl std::fmt::Debug for FileBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackendConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl FileBackendConfig {
    fn merge_into(self, config: &mut BackendConfig) {
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }

        if let Some(token) = self.token.filter(|token| !token.trim().is_empty()) {
            config.token = Some(token);
        }

        if let Some(user_id) = self.user_id.filter(|id| !id.trim().is_empty()) {
            config.user_id = Some(user_id);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileRealtimeConfig {
    pub heartbeat_interval_ms: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
    pub typing_idle_ms: Option<u64>,
    pub remote_typing_expiry_ms: Option<u64>,
}

impl FileRealtimeConfig {
    fn merge_into(self, config: &mut RealtimeConfig) {
        if let Some(interval) = self.heartbeat_interval_ms {
            config.heartbeat_interval_ms = interval;
        }

        if let Some(delay) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = delay;
        }

        if let Some(attempts) = self.max_reconnect_attempts {
            config.max_reconnect_attempts = attempts;
        }

        if let Some(idle) = self.typing_idle_ms {
            config.typing_idle_ms = idle;
        }

        if let Some(expiry) = self.remote_typing_expiry_ms {
            config.remote_typing_expiry_ms = expiry;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileRestConfig {
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub messages_page_size: Option<u32>,
}

impl FileRestConfig {
    fn merge_into(self, config: &mut RestConfig) {
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }

        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }

        if let Some(delay) = self.retry_delay_ms {
            config.retry_delay_ms = delay;
        }

        if let Some(page_size) = self.messages_page_size {
            config.messages_page_size = page_size;
        }
    }
}
