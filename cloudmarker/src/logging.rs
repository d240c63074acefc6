//! Logging subsystem initialization.
//!
//! The engine and every worker log through `tracing`; this module owns
//! the one process-wide subscriber the logging config's `logger` key
//! selects. The logger is the only process-wide shared state in the
//! system, so it must be thread- and process-safe —
//! `tracing_subscriber`'s global dispatcher is exactly that.

use crate::config::LoggerConfig;
use tracing_subscriber::EnvFilter;

/// Install a thread-scoped fallback subscriber for use while loading
/// configuration, before the configured level is known — otherwise a
/// missing `-c` file's warning has nowhere to go. Honors `RUST_LOG` if
/// set, else defaults to `info`. The returned guard restores whatever
/// was in effect when it is dropped; drop it before calling [`init`] so
/// the configured subscriber can be installed as the process default.
pub fn init_early() -> tracing::subscriber::DefaultGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_default(subscriber)
}

pub fn init(config: &LoggerConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
