use crate::{
    domain::chat_store::ChatStore,
    realtime::protocol::{decode_frame, Decoded, InboundFrame},
};

const ROUTER_FRAME_MALFORMED: &str = "ROUTER_FRAME_MALFORMED";
const ROUTER_SERVER_ERROR: &str = "ROUTER_SERVER_ERROR";

/// Remote typing state change the owner should mirror in its expiry timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingChange {
    pub chat_id: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteOutcome {
    pub changed: bool,
    pub typing: Option<TypingChange>,
}

impl RouteOutcome {
    fn changed(changed: bool) -> Self {
        Self {
            changed,
            typing: None,
        }
    }
}

/// Applies inbound socket frames to the chat store.
#[derive(Debug, Clone, Default)]
pub struct MessageRouter {
    local_user_id: Option<String>,
}

impl MessageRouter {
    pub fn new(local_user_id: Option<String>) -> Self {
        Self { local_user_id }
    }

    pub fn set_local_user(&mut self, local_user_id: Option<String>) {
        self.local_user_id = local_user_id;
    }

    /// Decodes and applies one text frame. Unknown and malformed frames are
    /// logged and leave the store untouched.
    pub fn route(&self, text: &str, store: &mut ChatStore) -> RouteOutcome {
        match decode_frame(text) {
            Ok(Decoded::Known(frame)) => self.apply(frame, store),
            Ok(Decoded::Unknown(kind)) => {
                tracing::debug!(kind = %kind, "ignoring frame of unknown type");
                RouteOutcome::default()
            }
            Err(error) => {
                tracing::warn!(code = ROUTER_FRAME_MALFORMED, error = %error, "dropping malformed frame");
                RouteOutcome::default()
            }
        }
    }

    fn apply(&self, frame: InboundFrame, store: &mut ChatStore) -> RouteOutcome {
        let local_user_id = self.local_user_id.as_deref();

        match frame {
            InboundFrame::NewChat { chat: Some(chat) } => {
                let listing = chat.into_listing();
                RouteOutcome::changed(store.upsert_chat(listing.chat, listing.messages))
            }
            InboundFrame::NewChat { chat: None } => {
                tracing::warn!(code = ROUTER_FRAME_MALFORMED, kind = "new_chat", "frame without chat");
                RouteOutcome::default()
            }
            InboundFrame::NewMessage(message)
            | InboundFrame::ChatMessage {
                message: Some(message),
            } => {
                let (message, seed) = message.into_parts();
                let chat_id = message.chat_id.clone();
                let from_remote = !message.is_from(local_user_id);
                let changed = store.apply_incoming_message(message, seed, local_user_id);

                RouteOutcome {
                    changed,
                    typing: (changed && from_remote).then(|| TypingChange {
                        chat_id,
                        active: false,
                    }),
                }
            }
            InboundFrame::ChatMessage { message: None } => {
                tracing::warn!(
                    code = ROUTER_FRAME_MALFORMED,
                    kind = "chat_message",
                    "frame without message"
                );
                RouteOutcome::default()
            }
            InboundFrame::Typing {
                chat_id: Some(chat_id),
                user_id: Some(user_id),
                is_typing,
            } => {
                let chat_id = String::from(chat_id);
                let user_id = String::from(user_id);
                if local_user_id == Some(user_id.as_str())
                    || !store.chats().iter().any(|chat| chat.chat_id == chat_id)
                {
                    return RouteOutcome::default();
                }

                let changed = store.set_remote_typing(&chat_id, &user_id, is_typing);
                RouteOutcome {
                    changed,
                    typing: Some(TypingChange {
                        chat_id,
                        active: is_typing,
                    }),
                }
            }
            InboundFrame::Typing { .. } => RouteOutcome::default(),
            InboundFrame::ReadReceipt {
                chat_id,
                message_id,
            } => RouteOutcome::changed(
                store.mark_read(&String::from(chat_id), &String::from(message_id)),
            ),
            InboundFrame::Error { message } => {
                let detail = message.map(|value| match value {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                });
                tracing::warn!(
                    code = ROUTER_SERVER_ERROR,
                    detail = detail.as_deref().unwrap_or("none"),
                    "server reported an error"
                );
                RouteOutcome::default()
            }
        }
    }
}
