//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing with JSON output.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    crate::tracing::init();
}

pub mod tracing;

pub use crate::tracing::{LogFormat, TracingError, init_with};
