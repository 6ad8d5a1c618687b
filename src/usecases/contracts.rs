use crate::{
    realtime::{protocol::OutboundFrame, transport::TransportError},
    usecases::{create_chat::ChatCreator, load_chats::ChatsSource, load_messages::MessagesSource},
};

/// Failure reported by a REST-backed source, before use case mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    Unauthorized,
    NotFound,
    Unavailable,
    InvalidData,
}

/// Outbound half of the realtime transport as seen by the action use cases.
pub trait FrameSender {
    fn is_connected(&self) -> bool;
    fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), TransportError>;
}

impl<T> FrameSender for &mut T
where
    T: FrameSender + ?Sized,
{
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
        (**self).send_frame(frame)
    }
}

/// Everything the chat client needs from the REST backend.
pub trait ChatBackend: ChatsSource + MessagesSource + ChatCreator + Send + Sync + 'static {}

impl<T> ChatBackend for T where T: ChatsSource + MessagesSource + ChatCreator + Send + Sync + 'static {}
