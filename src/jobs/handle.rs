//! # Runtime record of one accepted job.
//!
//! A [`JobHandle`] is created by the dispatcher right after validation and is
//! owned by the job's background unit until the outcome is published and the
//! context released. It is never persisted.
//!
//! The handle itself is immutable. The resources it stands for live next to it
//! in the job scope and are dropped in reverse order of acquisition:
//! ```text
//! JobHandle ── ScopedSignal (liveness)  ── lowered last
//!           └─ ReleaseGuard (session)   ── released after publish
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;

/// Process-wide task id counter; ids start at 1.
static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Runtime record of a single job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    task_id: u64,
    job_id: Arc<str>,
    input: Arc<str>,
    delay: Option<Duration>,
    started_at: Instant,
    started_wall: SystemTime,
    cancel: CancellationToken,
}

impl JobHandle {
    /// Creates a handle with a fresh process-unique task id.
    pub fn new(
        job_id: impl Into<Arc<str>>,
        input: impl Into<Arc<str>>,
        delay: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id: TASK_SEQ.fetch_add(1, Ordering::Relaxed),
            job_id: job_id.into(),
            input: input.into(),
            delay,
            started_at: Instant::now(),
            started_wall: SystemTime::now(),
            cancel,
        }
    }

    /// Process-unique id (the caller's `job_id` is not guaranteed unique).
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    /// Caller-chosen correlation id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Shared copy of the job id for events and logs.
    pub fn job_id_arc(&self) -> Arc<str> {
        Arc::clone(&self.job_id)
    }

    /// Agent input.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Optional wait before the agent is invoked.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Monotonic start instant.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wall-clock start time.
    pub fn started_wall(&self) -> SystemTime {
        self.started_wall
    }

    /// Time since the job was accepted.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Cancellation token of this job (child of the dispatcher's runtime token).
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_unique_even_for_same_job_id() {
        let a = JobHandle::new("same", "x", None, CancellationToken::new());
        let b = JobHandle::new("same", "x", None, CancellationToken::new());
        assert_ne!(a.task_id(), b.task_id());
        assert_eq!(a.job_id(), b.job_id());
    }
}
