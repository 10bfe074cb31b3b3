//! Tracing subscriber setup for the relay binary.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// The filter comes from `SUBCAST_LOG` when set, otherwise from the
/// configured level. Uses `try_init` so repeated calls (tests) are a no-op.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_env("SUBCAST_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
