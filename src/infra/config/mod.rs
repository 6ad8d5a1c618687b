mod adapter;
mod app_config;
mod file_config;
mod loader;

pub use adapter::FileConfigSource;
pub use app_config::{AppConfig, BackendConfig, LogConfig, RealtimeConfig, RestConfig};
pub use loader::TOKEN_ENV_VAR;
