//! Domain layer: chat entities, connection status, and the chat store.

pub mod chat;
pub mod chat_store;
pub mod credential;
pub mod message;
pub mod status;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
