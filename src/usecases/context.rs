use crate::{
    domain::credential::Credential,
    infra::{config::AppConfig, error::AppError},
};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Resolves the credential to start with. An explicit token wins over
    /// the configured one; blank tokens count as missing.
    pub fn credential(&self, token_override: Option<&str>) -> Result<Credential, AppError> {
        let token = token_override
            .or(self.config.backend.token.as_deref())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::MissingCredential)?;

        Ok(Credential::new(token, self.config.backend.user_id.clone()))
    }
}
