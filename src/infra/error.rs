use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to initialize logging: {0}")]
    LoggingInit(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },
    #[error("no token configured; set backend.token, pass --token or export CHATSYNC_TOKEN")]
    MissingCredential,
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
