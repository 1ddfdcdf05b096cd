//! Tracing subscriber setup for coordinator and worker binaries.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber.
///
/// `RUST_LOG` wins when set; otherwise records at `level` and above are
/// shown. Calling this more than once is harmless: later calls keep the
/// subscriber already installed.
pub fn init_tracing(level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
