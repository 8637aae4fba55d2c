//! Tracing/logging initialization.
//!
//! Every lifecycle marker of the runtime is a `tracing` event carrying a
//! `job_id` field; this module installs a subscriber that prints them.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Filtering is configurable via `RUST_LOG` (default `info`). With the
/// `json-logs` feature the output is one JSON object per line.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    #[cfg(feature = "json-logs")]
    let _ = builder.json().try_init();

    #[cfg(not(feature = "json-logs"))]
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init();
        tracing::info!(job_id = "t", "still logging");
    }
}
