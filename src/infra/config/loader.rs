use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

const DEFAULT_CONFIG_PATH: &str = "chatsync.toml";
const APP_DIR_NAME: &str = "chatsync";
pub const TOKEN_ENV_VAR: &str = "CHATSYNC_TOKEN";

/// Loads defaults, overlays `file` if given, then overlays the token from
/// the environment. `file` comes from [`resolve_path`].
pub(crate) fn load_resolved(file: Option<&Path>) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::default();

    if let Some(config_path) = file.map(Path::to_path_buf) {
        let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;

        let file_config: FileConfig =
            toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
                path: config_path,
                source,
            })?;

        file_config.merge_into(&mut config);
    }

    if let Some(token) = env::var(TOKEN_ENV_VAR)
        .ok()
        .filter(|token| !token.trim().is_empty())
    {
        config.backend.token = Some(token);
    }

    Ok(config)
}

/// Without an explicit path, `./chatsync.toml` is tried first and then
/// `<config dir>/chatsync/config.toml`. Paths that do not exist resolve to
/// `None`.
pub(crate) fn resolve_path(path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = path {
        return path.exists().then(|| path.to_path_buf());
    }

    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
        .filter(|candidate| candidate.exists())
}
