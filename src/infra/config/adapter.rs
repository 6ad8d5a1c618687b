use std::path::{Path, PathBuf};

use crate::infra::{
    config::{
        loader::{load_resolved, resolve_path},
        AppConfig,
    },
    contracts::ConfigSource,
    error::AppError,
};

/// Reads a TOML file plus the token from the environment. The file is
/// located once, at construction.
#[derive(Debug, Clone, Default)]
pub struct FileConfigSource {
    path: Option<PathBuf>,
}

impl FileConfigSource {
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: resolve_path(path),
        }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<AppConfig, AppError> {
        load_resolved(self.path.as_deref())
    }

    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
