use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio_retry::{strategy::FixedInterval, RetryIf};
use url::Url;

use crate::{
    backend::{
        endpoint::{api_endpoint, EndpointError},
        wire::{decode_messages, WireChat},
    },
    domain::{chat_store::ChatListing, message::Message},
    infra::config::RestConfig,
    usecases::{
        contracts::SourceError,
        create_chat::{ChatCreator, CreateChatReply, CreateChatRequest},
        load_chats::ChatsSource,
        load_messages::MessagesSource,
    },
};

const REST_REQUEST_RETRY: &str = "REST_REQUEST_RETRY";
const REST_REQUEST_FAILED: &str = "REST_REQUEST_FAILED";

const CHATS_PATH: [&str; 2] = ["chat", "with-recent-messages"];
const CREATE_CHAT_PATH: [&str; 2] = ["chat", ""];

#[derive(Debug, Error)]
pub enum RestError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("cannot build request url: {0}")]
    Endpoint(#[source] EndpointError),
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} answered with HTTP {status}")]
    Status { path: String, status: StatusCode },
    #[error("{path} returned an unexpected body: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RestError {
    /// Connection failures, timeouts and 5xx answers are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Client(_) | Self::Endpoint(_) | Self::Decode { .. } => false,
        }
    }
}

impl From<RestError> for SourceError {
    fn from(error: RestError) -> Self {
        match error {
            RestError::Status { status, .. }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                SourceError::Unauthorized
            }
            RestError::Status { status, .. } if status == StatusCode::NOT_FOUND => {
                SourceError::NotFound
            }
            RestError::Status { status, .. } if status.is_client_error() => {
                SourceError::InvalidData
            }
            RestError::Decode { .. } => SourceError::InvalidData,
            RestError::Client(_)
            | RestError::Endpoint(_)
            | RestError::Transport { .. }
            | RestError::Status { .. } => {
                SourceError::Unavailable
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    messages: Vec<Value>,
}

/// Bearer-authenticated client for the chat REST endpoints.
#[derive(Debug, Clone)]
pub struct RestChatApi {
    client: Client,
    api_url: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl RestChatApi {
    pub fn new(api_url: &str, config: &RestConfig) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(RestError::Client)?;

        Ok(Self {
            client,
            api_url: api_url.trim().to_owned(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RestError> {
        api_endpoint(&self.api_url, segments).map_err(RestError::Endpoint)
    }

    async fn get_json<T>(
        &self,
        token: &str,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let path = url.path();
        let retries = FixedInterval::new(self.retry_delay).take((self.max_attempts - 1) as usize);
        let mut attempt = 0_u32;

        let body = RetryIf::spawn(
            retries,
            || {
                attempt += 1;
                if attempt > 1 {
                    tracing::warn!(code = REST_REQUEST_RETRY, path, attempt, "retrying REST request");
                }
                self.execute(Method::GET, token, &url, query, None)
            },
            RestError::is_transient,
        )
        .await
        .inspect_err(|error| {
            tracing::warn!(code = REST_REQUEST_FAILED, path, error = %error, "REST request failed");
        })?;

        serde_json::from_str(&body).map_err(|source| RestError::Decode {
            path: path.to_owned(),
            source,
        })
    }

    async fn execute(
        &self,
        method: Method,
        token: &str,
        url: &Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, RestError> {
        let path = url.path();
        let mut request = self.client.request(method, url.clone()).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |source| RestError::Transport {
            path: path.to_owned(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "REST response received");

        if !status.is_success() {
            return Err(RestError::Status {
                path: path.to_owned(),
                status,
            });
        }

        response.text().await.map_err(transport)
    }
}

#[async_trait]
impl ChatsSource for RestChatApi {
    async fn list_chats(&self, token: &str) -> Result<Vec<ChatListing>, SourceError> {
        let chats: Vec<WireChat> = self.get_json(token, &CHATS_PATH, &[]).await?;

        Ok(chats.into_iter().map(WireChat::into_listing).collect())
    }
}

#[async_trait]
impl MessagesSource for RestChatApi {
    async fn list_messages(
        &self,
        token: &str,
        chat_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Message>, SourceError> {
        let query = [("page", page.to_string()), ("page_size", page_size.to_string())];
        let page: MessagesPage = self
            .get_json(token, &["chat", chat_id, "messages"], &query)
            .await?;

        Ok(decode_messages(page.messages))
    }
}

#[async_trait]
impl ChatCreator for RestChatApi {
    /// Chat creation is not idempotent, so it is never retried.
    async fn create_chat(
        &self,
        token: &str,
        request: &CreateChatRequest,
    ) -> Result<CreateChatReply, SourceError> {
        let body = serde_json::to_value(request).map_err(|_| SourceError::InvalidData)?;
        let url = self.endpoint(&CREATE_CHAT_PATH)?;
        let raw = self
            .execute(Method::POST, token, &url, &[], Some(&body))
            .await
            .inspect_err(|error| {
                tracing::warn!(
                    code = REST_REQUEST_FAILED,
                    path = url.path(),
                    error = %error,
                    "REST request failed"
                );
            })?;

        decode_create_reply(&raw).map_err(|source| {
            SourceError::from(RestError::Decode {
                path: url.path().to_owned(),
                source,
            })
        })
    }
}

/// The create endpoint answers with the chat fields inlined next to
/// `success` and an optional `message`.
fn decode_create_reply(raw: &str) -> Result<CreateChatReply, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let explicit_success = value.get("success").and_then(Value::as_bool);

    let chat = if value.get("chat_id").is_some_and(|id| !id.is_null()) {
        Some(serde_json::from_value::<WireChat>(value)?.into_listing())
    } else {
        None
    };

    Ok(CreateChatReply {
        success: explicit_success.unwrap_or(chat.is_some()),
        message,
        chat,
    })
}
