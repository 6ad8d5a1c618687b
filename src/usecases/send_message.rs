//! Use case for sending a text message over the chat socket.
//!
//! There is no optimistic insert: the message shows up in the store once
//! the server echoes it back as a `chat_message` push.

use chrono::{DateTime, Utc};

use crate::{
    realtime::{protocol::OutboundFrame, transport::TransportError},
    usecases::contracts::FrameSender,
};

const SEND_WHILE_DISCONNECTED: &str = "SEND_WHILE_DISCONNECTED";

/// Command to send a message to a specific chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub chat_id: String,
    pub text: String,
}

/// Domain-level errors for send message operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace.
    #[error("message text is empty")]
    EmptyMessage,
    /// The socket is not open; nothing was sent.
    #[error("chat socket is not connected")]
    NotConnected,
    /// The socket went away while the frame was being handed over.
    #[error("chat socket closed while sending")]
    LinkClosed,
    /// The client event loop has shut down.
    #[error("chat client is shut down")]
    ClientClosed,
}

/// Sends a message to the specified chat.
///
/// Validates the message text (must not be empty after trimming), requires
/// a connected socket, and stamps the frame with `sent_at`.
pub fn send_message(
    sender: &mut dyn FrameSender,
    command: SendMessageCommand,
    sender_id: Option<&str>,
    sent_at: DateTime<Utc>,
) -> Result<(), SendMessageError> {
    let text = command.text.trim();
    if text.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    if !sender.is_connected() {
        tracing::warn!(
            code = SEND_WHILE_DISCONNECTED,
            chat_id = %command.chat_id,
            "message not sent: socket is not connected"
        );
        return Err(SendMessageError::NotConnected);
    }

    let frame = OutboundFrame::text_message(&command.chat_id, text, sender_id, sent_at);
    sender.send_frame(&frame).map_err(map_transport_error)
}

fn map_transport_error(error: TransportError) -> SendMessageError {
    match error {
        TransportError::NotConnected | TransportError::InvalidEndpoint(_) => {
            SendMessageError::NotConnected
        }
        TransportError::LinkClosed | TransportError::Encode(_) => SendMessageError::LinkClosed,
    }
}
