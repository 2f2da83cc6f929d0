//! `tracing` subscriber setup.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Builds the filter: `RUST_LOG` when set, otherwise `default_directive`.
///
/// An unparsable default falls back to `info`.
#[must_use]
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber.
///
/// Later calls, and calls made after another subscriber was installed, are
/// no-ops. Returns true if this call installed the subscriber.
pub fn init_tracing(default_directive: &str, format: LogFormat) -> bool {
    let mut installed = false;
    INSTALLED.get_or_init(|| {
        let registry = tracing_subscriber::registry().with(env_filter(default_directive));
        installed = match format {
            LogFormat::Json => registry.with(fmt::layer().json()).try_init().is_ok(),
            LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init().is_ok(),
        };
    });
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing("debug", LogFormat::Text);
        assert!(!init_tracing("debug", LogFormat::Json));
        tracing::info!(kind = "workflows", "logging initialised");
    }

    #[test]
    fn test_bad_directive_falls_back() {
        let filter = env_filter("=[not a directive");
        assert!(!filter.to_string().is_empty());
    }
}
