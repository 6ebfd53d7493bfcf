//! Logging setup.
//!
//! The crate logs through `tracing` and never installs a subscriber on its
//! own. Applications can bring their own or, with the `tracing-subscriber`
//! feature, call [`init`], which reads:
//!
//! - `MONGOLINK_DEBUG=true|1|yes`: debug level
//! - `MONGOLINK_LOG_LEVEL=trace|debug|info|warn|error`: explicit level
//! - `MONGOLINK_LOG_FORMAT=json|pretty|compact`: output format (default json)
//!
//! Lifecycle transitions are logged at `info`, operational details at
//! `debug`.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Whether `MONGOLINK_DEBUG` asks for debug output.
pub fn is_debug_enabled() -> bool {
    env::var("MONGOLINK_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Level from `MONGOLINK_LOG_LEVEL`, falling back to `debug` when debug is
/// enabled and `info` otherwise.
pub fn log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "info" };
    match env::var("MONGOLINK_LOG_LEVEL") {
        Ok(level) => parse_level(&level).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

/// Format from `MONGOLINK_LOG_FORMAT`.
pub fn log_format() -> &'static str {
    env::var("MONGOLINK_LOG_FORMAT")
        .map(|f| parse_format(&f))
        .unwrap_or("json")
}

fn parse_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

fn parse_format(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "pretty" => "pretty",
        "compact" => "compact",
        _ => "json",
    }
}

/// Install a global subscriber. Later calls do nothing.
///
/// Without the `tracing-subscriber` feature this is a no-op.
pub fn init() {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = log_level();
            let filter = EnvFilter::try_new(format!("mongolink={level},mongolink_core={level}"))
                .unwrap_or_else(|_| EnvFilter::new("info"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match log_format() {
                "pretty" => registry.with(fmt::layer().pretty()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().json()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = level, format = log_format(), "Logging initialized");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some("debug"));
        assert_eq!(parse_level("warn"), Some("warn"));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("Pretty"), "pretty");
        assert_eq!(parse_format("compact"), "compact");
        assert_eq!(parse_format("xml"), "json");
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
