//! # Runtime events emitted by the dispatcher and job lifecycle.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Dispatch events**: request accepted or launch failed
//! - **Job lifecycle events**: liveness, session, execution, notification
//! - **Runtime events**: shutdown and grace handling
//! - **Subscriber events**: overflow and panic isolation
//!
//! The [`Event`] struct carries additional metadata such as timestamps, job id,
//! internal task id and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one job the lifecycle events are published in the order the steps happen:
//! ```text
//! LivenessRaised → JobAccepted → SessionAcquired → JobStarting
//!   → JobSucceeded | JobFailed → NotificationSent | NotificationFailed
//!   → SessionReleased → LivenessLowered
//! ```
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::JobFailed)
//!     .with_job("daily-report")
//!     .with_task_id(7)
//!     .with_reason("quota exceeded");
//!
//! assert_eq!(ev.kind, EventKind::JobFailed);
//! assert_eq!(ev.job_id.as_deref(), Some("daily-report"));
//! assert_eq!(ev.reason.as_deref(), Some("quota exceeded"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and "full" / "closed").
    SubscriberOverflow,

    // === Dispatch events ===
    /// Request validated and handed to a background job.
    ///
    /// Sets: `job_id`, `task_id`.
    JobAccepted,

    /// Request was valid but the job could not be launched.
    ///
    /// Sets: `job_id`, `task_id`, `reason`.
    LaunchFailed,

    // === Job lifecycle events ===
    /// Host was told the process is busy.
    ///
    /// Sets: `job_id`, `task_id`.
    LivenessRaised,

    /// Busy status withdrawn (last step of every job).
    ///
    /// Sets: `job_id`, `task_id`.
    LivenessLowered,

    /// Execution context acquired.
    ///
    /// Sets: `job_id`, `task_id`, `reason` (session name).
    SessionAcquired,

    /// Execution context released.
    ///
    /// Sets: `job_id`, `task_id`.
    SessionReleased,

    /// Agent invocation is about to start.
    ///
    /// Sets: `job_id`, `task_id`.
    JobStarting,

    /// Terminal `Success` outcome constructed.
    ///
    /// Sets: `job_id`, `task_id`.
    JobSucceeded,

    /// Terminal `Error` outcome constructed.
    ///
    /// Sets: `job_id`, `task_id`, `reason` (failure detail).
    JobFailed,

    /// Job is still running past its expected completion window.
    ///
    /// Sets: `job_id`, `task_id`, `reason` (window).
    WatchdogFired,

    /// Notification accepted by the transport.
    ///
    /// Sets: `job_id`, `reason` (status).
    NotificationSent,

    /// Notification could not be published.
    ///
    /// Sets: `job_id`, `reason` (delivery error).
    NotificationFailed,

    // === Runtime events ===
    /// Shutdown requested (OS signal observed or explicit call).
    ShutdownRequested,

    /// All jobs reached a terminal state within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some jobs were abandoned.
    ///
    /// Sets: `reason` (abandoned job ids).
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Caller-supplied correlation id, if applicable.
    pub job_id: Option<Arc<str>>,
    /// Process-unique id of the job, if applicable.
    pub task_id: Option<u64>,
    /// Human-readable reason (errors, status, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job_id: None,
            task_id: None,
            reason: None,
        }
    }

    /// Attaches a job id.
    #[inline]
    pub fn with_job(mut self, job_id: impl Into<Arc<str>>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Attaches the internal task id.
    #[inline]
    pub fn with_task_id(mut self, id: u64) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// True for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::JobAccepted);
        let b = Event::new(EventKind::JobStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn subscriber_events_are_flagged() {
        assert!(Event::subscriber_overflow("audit", "full").is_subscriber_event());
        assert!(!Event::new(EventKind::JobSucceeded).is_subscriber_event());
    }
}
