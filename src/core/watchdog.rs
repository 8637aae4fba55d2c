//! # Completion watchdog.
//!
//! A process killed by the host despite the liveness signal produces no outcome
//! and no notification. The watchdog gives operators an earlier hint: if a job
//! is still running after its expected completion window, a warning is logged
//! and [`EventKind::WatchdogFired`] is published.
//!
//! The watchdog never cancels the job and never publishes a notification.
//! It is disarmed when the returned guard is dropped at the end of the job.

use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;

use crate::events::{Bus, Event, EventKind};
use crate::jobs::JobHandle;

/// Disarms the watchdog when dropped.
#[must_use = "the watchdog is disarmed as soon as the guard is dropped"]
pub struct WatchdogGuard {
    _disarm: DropGuard,
}

/// Arms a watchdog for `handle` firing once after `window`.
///
/// Returns `None` when no window is configured.
pub fn arm(handle: &JobHandle, window: Option<Duration>, bus: &Bus) -> Option<WatchdogGuard> {
    let window = window.filter(|d| *d > Duration::ZERO)?;
    let disarm = CancellationToken::new();
    let token = disarm.clone();
    let job_id = handle.job_id_arc();
    let task_id = handle.task_id();
    let bus = bus.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(window) => {
                warn!(
                    job_id = %job_id,
                    task_id,
                    window_secs = window.as_secs(),
                    "job still running past its expected completion window"
                );
                bus.publish(
                    Event::new(EventKind::WatchdogFired)
                        .with_job(job_id)
                        .with_task_id(task_id)
                        .with_reason(format!("{window:?}")),
                );
            }
        }
    });

    Some(WatchdogGuard {
        _disarm: disarm.drop_guard(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> JobHandle {
        JobHandle::new("slow-job", "x", None, CancellationToken::new())
    }

    #[tokio::test]
    async fn disabled_without_window() {
        assert!(arm(&handle(), None, &Bus::new(8)).is_none());
        assert!(arm(&handle(), Some(Duration::ZERO), &Bus::new(8)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_window_elapses() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let _guard = arm(&handle(), Some(Duration::from_secs(60)), &bus);

        tokio::time::sleep(Duration::from_secs(61)).await;
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::WatchdogFired);
        assert_eq!(ev.job_id.as_deref(), Some("slow-job"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_guard_disarms() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let guard = arm(&handle(), Some(Duration::from_secs(60)), &bus);
        drop(guard);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }
}
