//! Realtime layer: socket lifecycle, frame codec and push routing.

pub mod protocol;
pub mod router;
pub mod timer;
pub mod transport;

/// Returns the realtime module name for smoke checks.
pub fn module_name() -> &'static str {
    "realtime"
}
