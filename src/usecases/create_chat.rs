use async_trait::async_trait;
use serde::Serialize;

use crate::{domain::chat_store::ChatListing, usecases::contracts::SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Direct,
    Group,
}

/// Body of `POST /chat/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateChatRequest {
    pub participants: Vec<String>,
    pub chat_type: ChatType,
    pub name: Option<String>,
}

impl CreateChatRequest {
    /// Builds a request for `local_user_id` plus `others`.
    ///
    /// Participants are deduplicated keeping first-seen order. More than two
    /// unique participants make a group; only groups carry a name.
    pub fn new(local_user_id: Option<&str>, others: &[String], name: Option<&str>) -> Self {
        let mut participants: Vec<String> = Vec::with_capacity(others.len() + 1);
        for user_id in local_user_id.into_iter().chain(others.iter().map(String::as_str)) {
            let user_id = user_id.trim();
            if !user_id.is_empty() && !participants.iter().any(|known| known == user_id) {
                participants.push(user_id.to_owned());
            }
        }

        let chat_type = if participants.len() > 2 {
            ChatType::Group
        } else {
            ChatType::Direct
        };
        let name = match chat_type {
            ChatType::Group => name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned),
            ChatType::Direct => None,
        };

        Self {
            participants,
            chat_type,
            name,
        }
    }
}

/// Decoded `POST /chat/` response.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateChatReply {
    pub success: bool,
    pub message: Option<String>,
    pub chat: Option<ChatListing>,
}

#[async_trait]
pub trait ChatCreator {
    async fn create_chat(
        &self,
        token: &str,
        request: &CreateChatRequest,
    ) -> Result<CreateChatReply, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateChatError {
    #[error("a chat needs at least one other participant")]
    NoParticipants,
    #[error("backend refused to create the chat: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),
    #[error("not authorized to create chats")]
    Unauthorized,
    #[error("chat creation is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("create chat response did not match the expected shape")]
    DataContractViolation,
    #[error("chat client is shut down")]
    ClientClosed,
}

/// Creates the chat and returns the listing to upsert locally.
pub async fn create_chat<S>(
    source: &S,
    token: &str,
    request: &CreateChatRequest,
) -> Result<ChatListing, CreateChatError>
where
    S: ChatCreator + ?Sized,
{
    if request.participants.len() < 2 {
        return Err(CreateChatError::NoParticipants);
    }

    let reply = source
        .create_chat(token, request)
        .await
        .map_err(map_source_error)?;

    if !reply.success {
        return Err(CreateChatError::Rejected(reply.message));
    }

    reply.chat.ok_or(CreateChatError::DataContractViolation)
}

fn map_source_error(error: SourceError) -> CreateChatError {
    match error {
        SourceError::Unauthorized => CreateChatError::Unauthorized,
        SourceError::Unavailable | SourceError::NotFound => {
            CreateChatError::TemporarilyUnavailable
        }
        SourceError::InvalidData => CreateChatError::DataContractViolation,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::chat::ChatPatch;

    struct StubCreator {
        result: Result<CreateChatReply, SourceError>,
        captured: Mutex<Option<CreateChatRequest>>,
    }

    impl StubCreator {
        fn with_result(result: Result<CreateChatReply, SourceError>) -> Self {
            Self {
                result,
                captured: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatCreator for StubCreator {
        async fn create_chat(
            &self,
            _token: &str,
            request: &CreateChatRequest,
        ) -> Result<CreateChatReply, SourceError> {
            *self.captured.lock().expect("captured lock") = Some(request.clone());
            self.result.clone()
        }
    }

    fn ok_reply() -> CreateChatReply {
        CreateChatReply {
            success: true,
            message: None,
            chat: Some(ChatListing {
                chat: ChatPatch::new("c9"),
                messages: vec![],
            }),
        }
    }

    fn users(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| (*id).to_owned()).collect()
    }

    #[test]
    fn two_unique_participants_make_a_direct_chat_without_name() {
        let request = CreateChatRequest::new(Some("me"), &users(&["u2", "me", "u2"]), Some("Pals"));

        assert_eq!(request.participants, users(&["me", "u2"]));
        assert_eq!(request.chat_type, ChatType::Direct);
        assert_eq!(request.name, None);
    }

    #[test]
    fn more_than_two_participants_make_a_named_group() {
        let request = CreateChatRequest::new(Some("me"), &users(&["u2", "u3"]), Some(" Pals "));

        assert_eq!(request.chat_type, ChatType::Group);
        assert_eq!(request.name.as_deref(), Some("Pals"));
        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            serde_json::json!({
                "participants": ["me", "u2", "u3"],
                "chat_type": "group",
                "name": "Pals"
            })
        );
    }

    #[tokio::test]
    async fn returns_created_chat_on_success() {
        let source = StubCreator::with_result(Ok(ok_reply()));
        let request = CreateChatRequest::new(Some("me"), &users(&["u2"]), None);

        let listing = create_chat(&source, "tok", &request).await.expect("create");

        assert_eq!(listing.chat.chat_id, "c9");
        assert_eq!(
            source.captured.lock().expect("captured lock").as_ref(),
            Some(&request)
        );
    }

    #[tokio::test]
    async fn rejects_request_without_other_participants() {
        let source = StubCreator::with_result(Ok(ok_reply()));
        let request = CreateChatRequest::new(Some("me"), &users(&["me"]), None);

        let err = create_chat(&source, "tok", &request).await.expect_err("must fail");

        assert_eq!(err, CreateChatError::NoParticipants);
        assert!(source.captured.lock().expect("captured lock").is_none());
    }

    #[tokio::test]
    async fn unsuccessful_reply_is_rejected_with_backend_message() {
        let source = StubCreator::with_result(Ok(CreateChatReply {
            success: false,
            message: Some("chat already exists".to_owned()),
            chat: None,
        }));
        let request = CreateChatRequest::new(Some("me"), &users(&["u2"]), None);

        let err = create_chat(&source, "tok", &request).await.expect_err("must fail");

        assert_eq!(
            err,
            CreateChatError::Rejected(Some("chat already exists".to_owned()))
        );
    }

    #[tokio::test]
    async fn successful_reply_without_chat_is_contract_violation() {
        let source = StubCreator::with_result(Ok(CreateChatReply {
            success: true,
            message: None,
            chat: None,
        }));
        let request = CreateChatRequest::new(Some("me"), &users(&["u2"]), None);

        let err = create_chat(&source, "tok", &request).await.expect_err("must fail");

        assert_eq!(err, CreateChatError::DataContractViolation);
    }
}
