//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod chat_service;
pub mod context;
pub mod contracts;
pub mod create_chat;
pub mod load_chats;
pub mod load_messages;
pub mod send_message;
pub mod set_typing;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
