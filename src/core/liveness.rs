//! # Liveness signal: keep the host from reclaiming a busy process.
//!
//! Hosting runtimes built for short requests reclaim a process after a fixed
//! stretch of apparent idleness (typically 15 minutes). While a job runs in the
//! background there is no open request, so the process must tell the host it is
//! busy for as long as the job is alive.
//!
//! ## Architecture
//! ```text
//! Dispatcher::accept ──► LivenessSignal::hold(handle) ──► LivenessHost::mark_busy()
//!                                   │                              │
//!                                   ▼                              ▼
//!                             ScopedSignal                    BusyTicket
//!                                   │
//!                          (dropped at end of job, on every path,
//!                           including task abort and panic unwind)
//!                                   ▼
//!                         LivenessHost::mark_idle(ticket)
//! ```
//!
//! ## Rules
//! - Raised before the background job is spawned, so there is no window in
//!   which the host sees the process idle while a job is pending.
//! - Held until the job's last step (after session release), which covers the
//!   whole computation through outcome construction.
//! - A raise failure (including a panicking host adapter) is a [`SetupError`];
//!   the agent is then never invoked.
//! - Each job holds its own ticket; the process is busy while any ticket is out.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LivenessError, SetupError};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::JobHandle;
use crate::subscribers::panic_message;

/// Receipt for one busy registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusyTicket(pub u64);

/// Host liveness protocol.
///
/// Methods are synchronous so release can run from `Drop`.
pub trait LivenessHost: Send + Sync + 'static {
    /// Host adapter name for logs.
    fn name(&self) -> &str {
        "host"
    }

    /// Marks the process busy on behalf of `handle`.
    fn mark_busy(&self, handle: &JobHandle) -> Result<BusyTicket, LivenessError>;

    /// Withdraws one busy registration.
    fn mark_idle(&self, ticket: BusyTicket);
}

/// Health answer for the host's ping endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PingStatus {
    /// Idle; the host may reclaim the process after its inactivity limit.
    Healthy,
    /// At least one job is running; the host must not reclaim the process.
    HealthyBusy,
}

/// In-process liveness host.
///
/// Tracks busy registrations and answers the host's ping with
/// [`PingStatus::HealthyBusy`] while any job holds a ticket.
pub struct BusyTracker {
    state: RwLock<HashMap<BusyTicket, Arc<str>>>,
    next: AtomicU64,
}

impl BusyTracker {
    /// Creates a tracker with no busy jobs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// Current ping answer.
    pub fn ping_status(&self) -> PingStatus {
        if self.read().is_empty() {
            PingStatus::Healthy
        } else {
            PingStatus::HealthyBusy
        }
    }

    /// True while any job with this id holds the signal.
    pub fn is_busy(&self, job_id: &str) -> bool {
        self.read().values().any(|j| &**j == job_id)
    }

    /// Sorted job ids currently holding the signal.
    pub fn busy_jobs(&self) -> Vec<String> {
        let mut v: Vec<String> = self.read().values().map(|j| j.to_string()).collect();
        v.sort_unstable();
        v
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<BusyTicket, Arc<str>>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for BusyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessHost for BusyTracker {
    fn name(&self) -> &str {
        "busy-tracker"
    }

    fn mark_busy(&self, handle: &JobHandle) -> Result<BusyTicket, LivenessError> {
        let ticket = BusyTicket(self.next.fetch_add(1, Ordering::Relaxed));
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ticket, handle.job_id_arc());
        Ok(ticket)
    }

    fn mark_idle(&self, ticket: BusyTicket) {
        let removed = self
            .state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&ticket);
        if removed.is_none() {
            warn!(ticket = ticket.0, "idle for unknown busy ticket");
        }
    }
}

/// Raises scoped busy signals against a [`LivenessHost`].
#[derive(Clone)]
pub struct LivenessSignal {
    host: Arc<dyn LivenessHost>,
    bus: Bus,
}

impl LivenessSignal {
    /// Creates a signal source for `host`.
    pub fn new(host: Arc<dyn LivenessHost>, bus: Bus) -> Self {
        Self { host, bus }
    }

    /// Marks the process busy for `handle` until the returned guard is dropped.
    pub fn hold(&self, handle: &JobHandle) -> Result<ScopedSignal, SetupError> {
        let ticket = panic::catch_unwind(AssertUnwindSafe(|| self.host.mark_busy(handle)))
            .unwrap_or_else(|payload| {
                Err(LivenessError(format!(
                    "liveness host panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })?;
        debug!(
            job_id = handle.job_id(),
            task_id = handle.task_id(),
            host = self.host.name(),
            "liveness raised"
        );
        self.bus.publish(
            Event::new(EventKind::LivenessRaised)
                .with_job(handle.job_id_arc())
                .with_task_id(handle.task_id()),
        );
        Ok(ScopedSignal {
            host: Arc::clone(&self.host),
            ticket,
            job_id: handle.job_id_arc(),
            task_id: handle.task_id(),
            bus: self.bus.clone(),
        })
    }
}

/// Busy registration that is withdrawn when dropped.
#[must_use = "the process is only marked busy while the signal is held"]
pub struct ScopedSignal {
    host: Arc<dyn LivenessHost>,
    ticket: BusyTicket,
    job_id: Arc<str>,
    task_id: u64,
    bus: Bus,
}

impl ScopedSignal {
    /// Host ticket backing this signal.
    pub fn ticket(&self) -> BusyTicket {
        self.ticket
    }
}

impl Drop for ScopedSignal {
    fn drop(&mut self) {
        self.host.mark_idle(self.ticket);
        debug!(job_id = %self.job_id, task_id = self.task_id, "liveness lowered");
        self.bus.publish(
            Event::new(EventKind::LivenessLowered)
                .with_job(Arc::clone(&self.job_id))
                .with_task_id(self.task_id),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn handle(job: &str) -> JobHandle {
        JobHandle::new(job, "input", None, CancellationToken::new())
    }

    #[test]
    fn ping_reports_busy_while_held() {
        let tracker = Arc::new(BusyTracker::new());
        let signal = LivenessSignal::new(tracker.clone(), Bus::new(8));
        assert_eq!(tracker.ping_status(), PingStatus::Healthy);

        let guard = signal.hold(&handle("a")).unwrap();
        assert_eq!(tracker.ping_status(), PingStatus::HealthyBusy);
        assert!(tracker.is_busy("a"));

        drop(guard);
        assert_eq!(tracker.ping_status(), PingStatus::Healthy);
        assert!(!tracker.is_busy("a"));
    }

    #[test]
    fn each_job_holds_its_own_ticket() {
        let tracker = Arc::new(BusyTracker::new());
        let signal = LivenessSignal::new(tracker.clone(), Bus::new(8));

        let a = signal.hold(&handle("a")).unwrap();
        let b = signal.hold(&handle("b")).unwrap();
        assert_ne!(a.ticket(), b.ticket());
        assert_eq!(tracker.busy_jobs(), vec!["a".to_string(), "b".to_string()]);

        drop(a);
        assert_eq!(tracker.ping_status(), PingStatus::HealthyBusy);
        drop(b);
        assert_eq!(tracker.ping_status(), PingStatus::Healthy);
    }

    #[test]
    fn released_on_panic_unwind() {
        let tracker = Arc::new(BusyTracker::new());
        let signal = LivenessSignal::new(tracker.clone(), Bus::new(8));

        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = signal.hold(&handle("p")).unwrap();
            panic!("job blew up");
        }));
        assert!(res.is_err());
        assert_eq!(tracker.ping_status(), PingStatus::Healthy);
    }

    struct Refusing;

    impl LivenessHost for Refusing {
        fn mark_busy(&self, _handle: &JobHandle) -> Result<BusyTicket, LivenessError> {
            Err(LivenessError("ping endpoint unavailable".into()))
        }
        fn mark_idle(&self, _ticket: BusyTicket) {}
    }

    #[test]
    fn host_failure_is_setup_error() {
        let signal = LivenessSignal::new(Arc::new(Refusing), Bus::new(8));
        let err = signal.hold(&handle("x")).err().unwrap();
        assert_eq!(err.as_label(), "setup_liveness");
    }

    struct Exploding;

    impl LivenessHost for Exploding {
        fn mark_busy(&self, _handle: &JobHandle) -> Result<BusyTicket, LivenessError> {
            panic!("ping socket closed");
        }
        fn mark_idle(&self, _ticket: BusyTicket) {}
    }

    #[test]
    fn host_panic_is_setup_error() {
        let signal = LivenessSignal::new(Arc::new(Exploding), Bus::new(8));
        let err = signal.hold(&handle("x")).err().unwrap();
        assert_eq!(err.as_label(), "setup_liveness");
        assert!(err.to_string().contains("ping socket closed"));
    }

    #[test]
    fn ping_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PingStatus::HealthyBusy).unwrap(),
            "\"HealthyBusy\""
        );
    }
}
