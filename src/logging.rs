//! Logging setup for the provider.
//!
//! Logs go to **stderr** through the `tracing` ecosystem so stdout stays free
//! for whatever host drives the provider.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (e.g. `info`, `deltastream_provider=debug`)
//!
//! ```bash
//! # Log every rendered statement and poll attempt
//! RUST_LOG=deltastream_provider=debug ./host
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`], with a caller-chosen level when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to install the subscriber, returning `false` if one is already set.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("deltastream_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,deltastream_provider::retry=trace").is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        // The second install always loses, whichever test got there first.
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
