//! Process-level logging initialization.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing output from `MAILPOST_LOG` (trace/debug/info/warn/
/// error, default info). Log lines go to stderr so they never mix with the
/// interactive conversation on stdout.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// Best-effort and never fails.
pub fn init() {
    if INIT.set(()).is_err() {
        return;
    }
    let level = std::env::var("MAILPOST_LOG")
        .ok()
        .and_then(|value| value.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
