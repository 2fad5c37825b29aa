//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

/// Output format for the process-wide subscriber.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event; the production default.
    #[default]
    Json,
    /// Multi-line human-readable output for local runs.
    Pretty,
}

/// Initialize tracing/logging for the process.
///
/// `RUST_LOG` wins over `default_filter`; an unparsable directive falls back
/// to `info`. Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with(default_filter: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match format {
        LogFormat::Json => builder.json().with_timer(SystemTime).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    if installed.is_ok() {
        ::tracing::debug!(?format, "tracing subscriber installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_harmless() {
        init_with("debug", LogFormat::Json);
        init_with("not a [valid directive", LogFormat::Pretty);
        crate::init();
        ::tracing::info!(check = true, "still logging");
    }
}
