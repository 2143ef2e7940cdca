//! Tracing subscriber setup.

use ib_core::config::LoggingConfig;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or by `default_filter`
/// when `RUST_LOG` is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter.as_str())
        .try_init()
        .is_ok()
}

/// [`init`] with the filter from the logging section of the config.
pub fn init_from_config(config: &LoggingConfig) -> bool {
    init(&config.filter)
}
