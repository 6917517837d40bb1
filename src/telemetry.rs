use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;

static INIT: OnceCell<()> = OnceCell::new();

/// Default directive when `DEVBOX_LOG` is unset or empty.
pub const DEFAULT_FILTER: &str = "warn";

/// Filter directive from `DEVBOX_LOG`, falling back to `RUST_LOG`, then `warn`.
pub fn log_filter_directive() -> String {
    ["DEVBOX_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|k| env::var(k).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the stderr fmt subscriber once per process.
///
/// Returns false when a global subscriber was already installed elsewhere.
pub fn init_logging() -> bool {
    if INIT.get().is_some() {
        return true;
    }
    let directive = log_filter_directive();
    let env_filter = tracing_subscriber::EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        eprintln!("devbox: invalid DEVBOX_LOG directive '{directive}', using '{DEFAULT_FILTER}'");
        tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        return false;
    }
    let _ = INIT.set(());
    true
}
