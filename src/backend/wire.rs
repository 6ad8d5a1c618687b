//! JSON shapes shared by the REST endpoints and the socket frames.
//!
//! The backend is loose about types (ids arrive as strings or numbers,
//! timestamps with or without an offset, message status in three different
//! shapes), so everything is decoded into permissive DTOs first and converted
//! into domain types afterwards.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::domain::{
    chat::{ChatPatch, LastMessage, ParticipantInfo},
    chat_store::ChatListing,
    message::{Message, MessageContent, MessageStatus, TEXT_CONTENT_KIND},
};

const WIRE_MESSAGE_DROPPED: &str = "WIRE_MESSAGE_DROPPED";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(i64),
}

impl From<WireId> for String {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Text(text) => text,
            WireId::Number(number) => number.to_string(),
        }
    }
}

fn ids(list: Option<Vec<WireId>>) -> Option<Vec<String>> {
    list.map(|ids| ids.into_iter().map(String::from).collect())
}

/// Parses RFC 3339, or a naive ISO-8601 date-time which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`"))),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Plain(String),
    Structured {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl From<WireContent> for MessageContent {
    fn from(content: WireContent) -> Self {
        match content {
            WireContent::Plain(text) => MessageContent::text(text),
            WireContent::Structured { kind, text, extra } => MessageContent {
                kind: kind.unwrap_or_else(|| TEXT_CONTENT_KIND.to_owned()),
                text,
                extra,
            },
        }
    }
}

fn content(raw: Option<WireContent>) -> MessageContent {
    raw.map(MessageContent::from).unwrap_or_default()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireStatus {
    Label(String),
    Flags {
        #[serde(default)]
        is_delivered: Option<bool>,
        #[serde(default)]
        is_read: Option<bool>,
        #[serde(default)]
        read_by: Option<Vec<Value>>,
    },
}

fn status(
    raw: Option<WireStatus>,
    is_delivered: Option<bool>,
    is_read: Option<bool>,
) -> MessageStatus {
    let (delivered, read) = match raw {
        Some(WireStatus::Label(label)) => match label.to_ascii_lowercase().as_str() {
            "read" | "seen" => (true, true),
            "delivered" => (true, false),
            _ => (false, false),
        },
        Some(WireStatus::Flags {
            is_delivered: flag_delivered,
            is_read: flag_read,
            read_by,
        }) => (
            flag_delivered.or(is_delivered).unwrap_or(false),
            flag_read.or(is_read).unwrap_or(false)
                || read_by.is_some_and(|readers| !readers.is_empty()),
        ),
        None => (
            is_delivered.unwrap_or(false),
            is_read.unwrap_or(false),
        ),
    };

    if read {
        MessageStatus::Read
    } else if delivered {
        MessageStatus::Delivered
    } else {
        MessageStatus::Sent
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireParticipant {
    pub user_id: WireId,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl From<WireParticipant> for ParticipantInfo {
    fn from(participant: WireParticipant) -> Self {
        Self {
            user_id: participant.user_id.into(),
            full_name: participant.full_name,
        }
    }
}

fn participants_info(list: Option<Vec<WireParticipant>>) -> Option<Vec<ParticipantInfo>> {
    list.map(|list| list.into_iter().map(ParticipantInfo::from).collect())
}

/// A message as found in pushes, history pages and embedded chat previews.
/// Pushed messages may also describe their chat, which seeds a new local
/// chat when the message is the first one seen for it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub message_id: WireId,
    pub chat_id: WireId,
    #[serde(default)]
    pub sender_id: Option<WireId>,
    #[serde(default)]
    pub content: Option<WireContent>,
    #[serde(deserialize_with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<WireStatus>,
    #[serde(default)]
    pub is_delivered: Option<bool>,
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub participants: Option<Vec<WireId>>,
    #[serde(default)]
    pub participants_info: Option<Vec<WireParticipant>>,
    #[serde(default)]
    pub is_group: Option<bool>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_picture: Option<String>,
    #[serde(default)]
    pub group_admin: Option<WireId>,
}

impl WireMessage {
    /// Splits into the message and the chat description it carried.
    pub fn into_parts(self) -> (Message, ChatPatch) {
        let chat_id: String = self.chat_id.into();
        let seed = ChatPatch {
            participants: ids(self.participants),
            participants_info: participants_info(self.participants_info),
            is_group: self.is_group,
            group_name: self.group_name,
            group_picture: self.group_picture,
            group_admin: self.group_admin.map(String::from),
            ..ChatPatch::new(chat_id.clone())
        };
        let message = Message {
            message_id: self.message_id.into(),
            chat_id,
            sender_id: self.sender_id.map(String::from),
            content: content(self.content),
            timestamp: self.timestamp,
            status: status(self.status, self.is_delivered, self.is_read),
        };

        (message, seed)
    }

    pub fn into_message(self) -> Message {
        self.into_parts().0
    }
}

/// Decodes message rows one at a time. Rows that do not decode are logged
/// and skipped so a single bad row never costs the rest of the list.
pub fn decode_messages(rows: Vec<Value>) -> Vec<Message> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<WireMessage>(row) {
            Ok(message) => Some(message.into_message()),
            Err(error) => {
                tracing::warn!(code = WIRE_MESSAGE_DROPPED, error = %error, "dropping undecodable message row");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireLastMessage {
    #[serde(default)]
    pub message_id: Option<WireId>,
    #[serde(default)]
    pub sender_id: Option<WireId>,
    #[serde(default)]
    pub content: Option<WireContent>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChat {
    pub chat_id: WireId,
    #[serde(default)]
    pub participants: Option<Vec<WireId>>,
    #[serde(default)]
    pub participants_info: Option<Vec<WireParticipant>>,
    #[serde(default)]
    pub is_group: Option<bool>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_picture: Option<String>,
    #[serde(default)]
    pub group_admin: Option<WireId>,
    #[serde(default)]
    pub last_message: Option<WireLastMessage>,
    #[serde(default)]
    pub unread_count: Option<u32>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub messages: Option<Vec<Value>>,
}

impl WireChat {
    /// A last message without its own timestamp is dated at chat creation.
    pub fn into_listing(self) -> ChatListing {
        let created_at = self.created_at;
        let last_message = self.last_message.map(|last| LastMessage {
            message_id: last.message_id.map(String::from),
            sender_id: last.sender_id.map(String::from),
            content: content(last.content),
            timestamp: last.timestamp.or(created_at),
        });
        let messages = decode_messages(self.messages.unwrap_or_default());

        ChatListing {
            chat: ChatPatch {
                participants: ids(self.participants),
                participants_info: participants_info(self.participants_info),
                is_group: self.is_group,
                group_name: self.group_name,
                group_picture: self.group_picture,
                group_admin: self.group_admin.map(String::from),
                last_message,
                unread_count: self.unread_count,
                created_at,
                updated_at: self.updated_at,
                is_active: self.is_active,
                ..ChatPatch::new(self.chat_id)
            },
            messages,
        }
    }
}
