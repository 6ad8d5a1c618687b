use async_trait::async_trait;

use crate::{domain::message::Message, usecases::contracts::SourceError};

pub const DEFAULT_MESSAGES_PAGE_SIZE: u32 = 20;
const MAX_MESSAGES_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMessagesQuery {
    pub chat_id: String,
    /// 1-based page index; page 1 holds the newest messages.
    pub page: u32,
    pub page_size: u32,
}

impl LoadMessagesQuery {
    pub fn new(chat_id: impl Into<String>, page: u32) -> Self {
        Self {
            chat_id: chat_id.into(),
            page,
            page_size: DEFAULT_MESSAGES_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn normalized(self) -> Self {
        let page_size = match self.page_size {
            0 => DEFAULT_MESSAGES_PAGE_SIZE,
            value if value > MAX_MESSAGES_PAGE_SIZE => MAX_MESSAGES_PAGE_SIZE,
            value => value,
        };

        Self {
            page: self.page.max(1),
            page_size,
            ..self
        }
    }
}

/// Result of a `load_messages` call on the client.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadMessagesOutcome {
    /// The page was fetched and merged; holds the page as returned.
    Loaded(Vec<Message>),
    /// Another page request was still outstanding; nothing was fetched.
    AlreadyInFlight,
}

#[async_trait]
pub trait MessagesSource {
    async fn list_messages(
        &self,
        token: &str,
        chat_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Message>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadMessagesError {
    #[error("not authorized to read this chat")]
    Unauthorized,
    #[error("message history is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("message page did not match the expected shape")]
    DataContractViolation,
    #[error("chat not found")]
    ChatNotFound,
    #[error("chat client is shut down")]
    ClientClosed,
}

pub async fn load_messages<S>(
    source: &S,
    token: &str,
    query: LoadMessagesQuery,
) -> Result<Vec<Message>, LoadMessagesError>
where
    S: MessagesSource + ?Sized,
{
    let query = query.normalized();
    source
        .list_messages(token, &query.chat_id, query.page, query.page_size)
        .await
        .map_err(map_source_error)
}

fn map_source_error(error: SourceError) -> LoadMessagesError {
    match error {
        SourceError::Unauthorized => LoadMessagesError::Unauthorized,
        SourceError::Unavailable => LoadMessagesError::TemporarilyUnavailable,
        SourceError::InvalidData => LoadMessagesError::DataContractViolation,
        SourceError::NotFound => LoadMessagesError::ChatNotFound,
    }
}
