use std::{path::Path, sync::Arc};

use crate::{
    backend::{rest::RestChatApi, socket::WsConnector},
    domain::credential::Credential,
    infra::{self, config::FileConfigSource, contracts::ConfigSource, error::AppError},
    usecases::{
        chat_service::{ChatClient, ChatHandle},
        context::AppContext,
    },
};

const CONFIG_LOADED: &str = "CONFIG_LOADED";

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let source = FileConfigSource::new(config_path);
    let context = build_context(&source)?;
    infra::logging::init(&context.config.logging)?;
    tracing::info!(
        code = CONFIG_LOADED,
        path = ?source.location(),
        api_url = %context.config.backend.api_url,
        "configuration loaded"
    );

    Ok(context)
}

fn build_context(source: &dyn ConfigSource) -> Result<AppContext, AppError> {
    Ok(AppContext::new(source.load()?))
}

fn validate(config: &infra::config::AppConfig) -> Result<(), AppError> {
    if config.backend.api_url.trim().is_empty() {
        return Err(AppError::InvalidConfig {
            details: "backend.api_url must not be empty".to_owned(),
        });
    }
    if config.rest.max_attempts == 0 {
        return Err(AppError::InvalidConfig {
            details: "rest.max_attempts must be at least 1".to_owned(),
        });
    }

    Ok(())
}

/// Wires the REST backend and the websocket connector into a chat client.
/// The caller spawns [`ChatClient::run`] on its runtime.
pub fn compose_client(
    context: &AppContext,
    credential: Option<Credential>,
) -> Result<(ChatClient, ChatHandle), AppError> {
    validate(&context.config)?;
    let backend = RestChatApi::new(&context.config.backend.api_url, &context.config.rest)
        .map_err(|error| AppError::Other(error.into()))?;

    Ok(ChatClient::new(
        &context.config,
        Arc::new(backend),
        Arc::new(WsConnector),
        credential,
    ))
}
