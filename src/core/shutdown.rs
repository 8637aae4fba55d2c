//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a
//! termination signal and reports which one.
//!
//! **Unix:** `SIGINT`, `SIGTERM` (sent by the host before it reclaims an
//! instance), `SIGQUIT`.
//! **Other platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

use tracing::info;

/// Waits for a termination signal and returns its name.
///
/// Each call registers independent listeners. Fails only if registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    info!(signal = name, "termination signal received");
    Ok(name)
}

/// Waits for a termination signal and returns its name.
///
/// Each call registers independent listeners. Fails only if registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    info!(signal = "ctrl-c", "termination signal received");
    Ok("ctrl-c")
}
