//! # Tracing Initialization
//!
//! A single `init()` entry point: env-filter driven, defaults to `info`,
//! writes to stderr so stdout stays free for any protocol a caller layers
//! on top.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Safe to call once per process;
/// a second call is a no-op error that callers may ignore. Loads a `.env`
/// file first, if present, so `CONDUCTOR_*`/`RUST_LOG` overrides set there
/// are visible to both this call and `CoreConfig::load`.
pub fn init(default_directive: &str) {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
