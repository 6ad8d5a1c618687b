use async_trait::async_trait;

use crate::{domain::chat_store::ChatListing, usecases::contracts::SourceError};

#[async_trait]
pub trait ChatsSource {
    /// Returns every chat of the user with its most recent messages.
    async fn list_chats(&self, token: &str) -> Result<Vec<ChatListing>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadChatsError {
    #[error("not authorized to list chats")]
    Unauthorized,
    #[error("chat list is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("chat list response did not match the expected shape")]
    DataContractViolation,
    #[error("chat client is shut down")]
    ClientClosed,
}

pub async fn load_chats<S>(source: &S, token: &str) -> Result<Vec<ChatListing>, LoadChatsError>
where
    S: ChatsSource + ?Sized,
{
    source.list_chats(token).await.map_err(map_source_error)
}

fn map_source_error(error: SourceError) -> LoadChatsError {
    match error {
        SourceError::Unauthorized => LoadChatsError::Unauthorized,
        SourceError::Unavailable | SourceError::NotFound => LoadChatsError::TemporarilyUnavailable,
        SourceError::InvalidData => LoadChatsError::DataContractViolation,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::chat::ChatPatch;

    struct StubSource {
        result: Result<Vec<ChatListing>, SourceError>,
        captured_token: Mutex<Option<String>>,
    }

    impl StubSource {
        fn with_result(result: Result<Vec<ChatListing>, SourceError>) -> Self {
            Self {
                result,
                captured_token: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatsSource for StubSource {
        async fn list_chats(&self, token: &str) -> Result<Vec<ChatListing>, SourceError> {
            *self.captured_token.lock().expect("token lock") = Some(token.to_owned());
            self.result.clone()
        }
    }

    fn sample_listing() -> ChatListing {
        ChatListing {
            chat: ChatPatch::new("c1"),
            messages: vec![],
        }
    }

    #[tokio::test]
    async fn keeps_source_payload_without_mutation() {
        let listings = vec![sample_listing()];
        let source = StubSource::with_result(Ok(listings.clone()));

        let output = load_chats(&source, "tok").await.expect("load should succeed");

        assert_eq!(output, listings);
        assert_eq!(
            source.captured_token.lock().expect("token lock").as_deref(),
            Some("tok")
        );
    }

    #[tokio::test]
    async fn maps_unauthorized_error() {
        let source = StubSource::with_result(Err(SourceError::Unauthorized));

        let err = load_chats(&source, "tok").await.expect_err("must fail");

        assert_eq!(err, LoadChatsError::Unauthorized);
    }

    #[tokio::test]
    async fn maps_unavailable_error_to_temporarily_unavailable() {
        let source = StubSource::with_result(Err(SourceError::Unavailable));

        let err = load_chats(&source, "tok").await.expect_err("must fail");

        assert_eq!(err, LoadChatsError::TemporarilyUnavailable);
    }

    #[tokio::test]
    async fn maps_invalid_data_error_to_contract_violation() {
        let source = StubSource::with_result(Err(SourceError::InvalidData));

        let err = load_chats(&source, "tok").await.expect_err("must fail");

        assert_eq!(err, LoadChatsError::DataContractViolation);
    }
}
