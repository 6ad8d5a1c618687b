//! Socket frame codec. Every frame is a JSON object discriminated by `type`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backend::wire::{WireChat, WireId, WireMessage};

const KNOWN_KINDS: [&str; 6] = [
    "new_chat",
    "new_message",
    "chat_message",
    "typing",
    "read_receipt",
    "error",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    NewChat {
        #[serde(default)]
        chat: Option<WireChat>,
    },
    NewMessage(WireMessage),
    ChatMessage {
        #[serde(default)]
        message: Option<WireMessage>,
    },
    Typing {
        #[serde(default)]
        chat_id: Option<WireId>,
        #[serde(default)]
        user_id: Option<WireId>,
        #[serde(default)]
        is_typing: bool,
    },
    ReadReceipt {
        chat_id: WireId,
        message_id: WireId,
    },
    Error {
        #[serde(default)]
        message: Option<Value>,
    },
}

#[derive(Debug, Clone)]
pub enum Decoded {
    Known(InboundFrame),
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum FrameDecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("`{kind}` frame has an invalid payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes one text frame. Unrecognized `type` values are reported as
/// [`Decoded::Unknown`] rather than as an error.
pub fn decode_frame(text: &str) -> Result<Decoded, FrameDecodeError> {
    let value: Value = serde_json::from_str(text).map_err(FrameDecodeError::Json)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameDecodeError::MissingType)?
        .to_owned();

    if !KNOWN_KINDS.contains(&kind.as_str()) {
        return Ok(Decoded::Unknown(kind));
    }

    serde_json::from_value(value)
        .map(Decoded::Known)
        .map_err(|source| FrameDecodeError::Payload { kind, source })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Ping,
    Typing {
        chat_id: String,
        is_typing: bool,
        user_id: Option<String>,
    },
    ChatMessage {
        chat_id: String,
        content: OutboundContent,
        sender_id: Option<String>,
        timestamp: String,
    },
}

impl OutboundFrame {
    pub fn typing(chat_id: &str, is_typing: bool, user_id: Option<&str>) -> Self {
        Self::Typing {
            chat_id: chat_id.to_owned(),
            is_typing,
            user_id: user_id.map(str::to_owned),
        }
    }

    pub fn text_message(
        chat_id: &str,
        text: &str,
        sender_id: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self::ChatMessage {
            chat_id: chat_id.to_owned(),
            content: OutboundContent {
                kind: crate::domain::message::TEXT_CONTENT_KIND.to_owned(),
                text: text.to_owned(),
            },
            sender_id: sender_id.map(str::to_owned),
            timestamp: sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Typing { .. } => "typing",
            Self::ChatMessage { .. } => "chat_message",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_nested_chat_message() {
        let frame = r#"{"type":"chat_message","message":{"message_id":"m1","chat_id":"c1","sender_id":"u2","content":{"type":"text","text":"hi"},"timestamp":"2024-01-01T00:00:00Z"}}"#;

        let decoded = decode_frame(frame).expect("frame should decode");

        match decoded {
            Decoded::Known(InboundFrame::ChatMessage { message: Some(message) }) => {
                assert_eq!(message.into_message().message_id, "m1");
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn decodes_flat_new_message() {
        let frame = json!({
            "type": "new_message",
            "message_id": 5,
            "chat_id": 9,
            "sender_id": "u2",
            "content": "hello",
            "timestamp": "2024-01-01T00:00:00"
        })
        .to_string();

        let decoded = decode_frame(&frame).expect("frame should decode");

        assert!(matches!(decoded, Decoded::Known(InboundFrame::NewMessage(_))));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let decoded = decode_frame(r#"{"type":"presence","user_id":"u1"}"#)
            .expect("unknown frames decode");

        assert!(matches!(decoded, Decoded::Unknown(kind) if kind == "presence"));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(decode_frame("not json"), Err(FrameDecodeError::Json(_))));
        assert!(matches!(decode_frame(r#"{"chat_id":"c1"}"#), Err(FrameDecodeError::MissingType)));
        assert!(matches!(
            decode_frame(r#"{"type":"read_receipt","chat_id":"c1"}"#),
            Err(FrameDecodeError::Payload { .. })
        ));
    }

    #[test]
    fn typing_frame_without_ids_still_decodes() {
        let decoded = decode_frame(r#"{"type":"typing","is_typing":true}"#).expect("decodes");

        assert!(matches!(
            decoded,
            Decoded::Known(InboundFrame::Typing { chat_id: None, user_id: None, is_typing: true })
        ));
    }

    #[test]
    fn encodes_outbound_frames() {
        let sent_at = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp");

        let ping: Value = serde_json::from_str(&OutboundFrame::Ping.encode().expect("encode"))
            .expect("json");
        assert_eq!(ping, json!({"type": "ping"}));

        let message: Value = serde_json::from_str(
            &OutboundFrame::text_message("c1", "hi", Some("me"), sent_at)
                .encode()
                .expect("encode"),
        )
        .expect("json");
        assert_eq!(
            message,
            json!({
                "type": "chat_message",
                "chat_id": "c1",
                "content": {"type": "text", "text": "hi"},
                "sender_id": "me",
                "timestamp": "2024-01-01T00:00:00.000Z"
            })
        );

        let typing: Value = serde_json::from_str(
            &OutboundFrame::typing("c1", false, Some("me")).encode().expect("encode"),
        )
        .expect("json");
        assert_eq!(
            typing,
            json!({"type": "typing", "chat_id": "c1", "is_typing": false, "user_id": "me"})
        );
    }
}
