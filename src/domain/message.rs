use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub const TEXT_CONTENT_KIND: &str = "text";

/// Delivery state of a message as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }
}

/// Message body. Only `text` is interpreted locally; any other fields the
/// backend attaches are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageContent {
    pub kind: String,
    pub text: Option<String>,
    pub extra: Map<String, Value>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: TEXT_CONTENT_KIND.to_owned(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }

    /// Returns the text body, or a `[kind]` label for non-text content.
    pub fn preview(&self) -> String {
        match self.text.as_deref() {
            Some(text) if !text.is_empty() => text.to_owned(),
            _ if self.kind.is_empty() || self.kind == TEXT_CONTENT_KIND => String::new(),
            _ => format!("[{}]", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: Option<String>,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    pub fn is_from(&self, user_id: Option<&str>) -> bool {
        matches!((self.sender_id.as_deref(), user_id), (Some(sender), Some(user)) if sender == user)
    }
}

/// Merges `incoming` into `existing`, skipping ids that are already present,
/// and returns the new list sorted ascending by timestamp together with the
/// number of messages actually inserted.
pub fn merge_messages(
    existing: &[Message],
    incoming: impl IntoIterator<Item = Message>,
) -> (Vec<Message>, usize) {
    let mut merged = existing.to_vec();
    let mut inserted = 0;

    for message in incoming {
        if merged
            .iter()
            .any(|known| known.message_id == message.message_id)
        {
            continue;
        }
        merged.push(message);
        inserted += 1;
    }

    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    (merged, inserted)
}
