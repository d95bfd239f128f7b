//! Tracing initialisation for snapdiff binaries.
//!
//! Call [`init_tracing`] once at startup. Filter precedence:
//! `SNAPDIFF_LOG`, then `RUST_LOG`, then the supplied default level with
//! the HTTP stack's chatty targets capped at `warn`. Calling twice is
//! harmless; only the first global subscriber sticks.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Env var for snapdiff-specific log filtering; wins over `RUST_LOG`.
pub const LOG_ENV: &str = "SNAPDIFF_LOG";

/// Install the global subscriber.
///
/// * `json`: newline-delimited JSON lines for log pipelines.
/// * `level`: default verbosity when neither filter env var is set.
pub fn init_tracing(json: bool, level: Level) {
    let registry = tracing_subscriber::registry().with(log_filter(level));
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).compact())
            .try_init()
            .ok();
    }
}

fn log_filter(level: Level) -> EnvFilter {
    for var in [LOG_ENV, "RUST_LOG"] {
        if let Ok(filter) = EnvFilter::try_from_env(var) {
            return filter;
        }
    }
    default_filter(level)
}

/// Compare requests fan out over the HTTP stack; hyper and tower trace
/// per-connection noise the engine's logs should not drown in.
fn default_filter(level: Level) -> EnvFilter {
    EnvFilter::new(format!("{level},hyper=warn,tower=warn"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_caps_http_noise() {
        let filter = default_filter(Level::DEBUG).to_string().to_lowercase();
        assert!(filter.contains("debug"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("tower=warn"));
    }
}
