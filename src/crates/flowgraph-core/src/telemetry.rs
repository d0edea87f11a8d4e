//! Tracing setup
//!
//! Library code only emits `tracing` events. Binaries and tests that want to
//! see them install a subscriber once with [`init_tracing`].

use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

/// Install a global fmt subscriber filtered by `filter`
///
/// `RUST_LOG`, when set, takes precedence over `filter`. Returns `false` if a
/// global subscriber was already installed, which makes repeated calls
/// harmless.
pub fn init_tracing(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// [`init_tracing`] with the filter from `config`
pub fn init_from_config(config: &EngineConfig) -> bool {
    init_tracing(&config.log_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing("debug");
        assert!(!init_tracing("debug"));
    }
}
