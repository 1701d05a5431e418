//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. [`init_tracing`] is a ready-made fmt subscriber for
//! binaries and tests that don't bring their own.

use crate::Config;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `config.trace_level` when set. Only the first call
/// in a process takes effect; later calls, or a subscriber installed
/// elsewhere, are left alone.
///
/// ```
/// use tincan_store::{observability::init_tracing, Config};
///
/// init_tracing(&Config::default());
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_harmless() {
        let config = Config {
            trace_level: Some("tincan_store=trace".to_string()),
            ansi: false,
        };
        init_tracing(&config);
        init_tracing(&config);
        tracing::trace!("still running");
    }
}
