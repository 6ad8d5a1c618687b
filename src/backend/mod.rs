//! Backend integration layer: REST client, chat socket and wire formats.

pub mod endpoint;
pub mod rest;
pub mod socket;
pub mod wire;

/// Returns the backend module name for smoke checks.
pub fn module_name() -> &'static str {
    "backend"
}
