use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

const LOGGING_INITIALIZED: &str = "LOGGING_INITIALIZED";
const FALLBACK_LEVEL: &str = "info";

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays pipeable.
pub fn init(config: &LogConfig) -> Result<(), AppError> {
    let filter = build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), &config.level);
    let directives = filter.to_string();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(AppError::LoggingInit)?;

    tracing::debug!(code = LOGGING_INITIALIZED, filter = %directives, "logging initialized");
    Ok(())
}

/// `RUST_LOG` wins over the configured level; an unparsable level falls
/// back to `info`.
fn build_filter(env_directives: Option<String>, level: &str) -> EnvFilter {
    env_directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_directives_override_configured_level() {
        let filter = build_filter(Some("chatsync=trace".to_owned()), "warn");

        assert_eq!(filter.to_string(), "chatsync=trace");
    }

    #[test]
    fn configured_level_is_used_without_env() {
        assert_eq!(build_filter(None, "debug").to_string(), "debug");
    }

    #[test]
    fn unparsable_level_falls_back_to_info() {
        let filter = build_filter(Some("chatsync=loud".to_owned()), "chatsync=verbose");

        assert_eq!(filter.to_string(), FALLBACK_LEVEL);
    }

    #[test]
    fn second_init_is_rejected() {
        let config = LogConfig::default();
        let _ = init(&config);

        assert!(matches!(init(&config), Err(AppError::LoggingInit(_))));
    }
}
