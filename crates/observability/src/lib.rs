//! Tracing and logging setup shared by the engine, its tests and benches.

/// Initialize process-wide observability with JSON logs at `info`
/// (overridable through `RUST_LOG`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with("info", LogFormat::Json);
}

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use tracing::{LogFormat, init_with};
