use std::path::Path;

use crate::infra::{config::AppConfig, error::AppError};

/// Where the client's settings come from.
pub trait ConfigSource {
    fn load(&self) -> Result<AppConfig, AppError>;

    /// The file that [`ConfigSource::load`] would read, if any.
    fn location(&self) -> Option<&Path>;
}
