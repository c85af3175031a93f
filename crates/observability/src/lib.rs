//! Shared tracing setup for the tabx binaries.

use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber.
///
/// Ledger and settlement events carry their fields structured (amounts,
/// attempt ids, transfer references), so the output format is JSON and log
/// lines ship as-is. Verbosity comes from `RUST_LOG`, falling back to `info`
/// when unset. A second call finds a subscriber already installed and does
/// nothing, so every binary and test harness can call this unconditionally.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
