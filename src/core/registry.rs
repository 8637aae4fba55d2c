//! # Job registry: in-flight jobs keyed by task id.
//!
//! The caller's `job_id` is only a correlation id and may repeat, so entries
//! are keyed by the process-unique `task_id` of each [`JobHandle`].
//!
//! ## Architecture
//! ```text
//! Dispatcher::accept ──► Registry::reserve(handle) ──► Registration (RAII)
//!                              │  closed?   → SetupError::ShuttingDown
//!                              │  at limit? → SetupError::CapacityExhausted
//!                              ▼
//!                       jobs[task_id] = { job_id, started_at, cancel }
//!
//! job future ends (any path) ──► Registration::drop ──► remove ──► notify idle waiters
//!
//! Dispatcher::cancel(task_id) ──► cancel(task_id) ─► job publishes Error(Canceled)
//!
//! Dispatcher::shutdown ──► close() ─► cancel_all() ─► wait_idle() within grace
//!                                                     └─ timeout → snapshot() = stuck ids
//! ```
//!
//! ## Rules
//! - Reservation is atomic: the limit check and the insert happen under one lock.
//! - Each entry is owned by exactly one job; removal happens exactly once.
//! - After `close()` no new job is admitted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::SetupError;
use crate::jobs::JobHandle;

/// Bookkeeping for one in-flight job.
struct Entry {
    job_id: Arc<str>,
    started_at: Instant,
    cancel: CancellationToken,
}

#[derive(Default)]
struct State {
    jobs: HashMap<u64, Entry>,
    closed: bool,
}

/// In-flight job registry.
pub struct Registry {
    state: Mutex<State>,
    idle: Notify,
    limit: Option<usize>,
}

impl Registry {
    /// Creates a registry admitting at most `limit` concurrent jobs (`None` = unlimited).
    pub fn new(limit: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            idle: Notify::new(),
            limit,
        })
    }

    /// Admits `handle` or explains why it cannot be launched.
    pub fn reserve(self: &Arc<Self>, handle: &JobHandle) -> Result<Registration, SetupError> {
        let mut state = self.lock();
        if state.closed {
            return Err(SetupError::ShuttingDown);
        }
        if let Some(limit) = self.limit {
            if state.jobs.len() >= limit {
                return Err(SetupError::CapacityExhausted { limit });
            }
        }
        state.jobs.insert(
            handle.task_id(),
            Entry {
                job_id: handle.job_id_arc(),
                started_at: handle.started_at(),
                cancel: handle.cancel_token().clone(),
            },
        );
        Ok(Registration {
            registry: Arc::clone(self),
            task_id: handle.task_id(),
        })
    }

    /// Number of in-flight jobs.
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    /// True when no job is in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Job ids of in-flight jobs, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        let state = self.lock();
        let mut jobs: Vec<(Instant, u64, &str)> = state
            .jobs
            .iter()
            .map(|(task_id, e)| (e.started_at, *task_id, &*e.job_id))
            .collect();
        jobs.sort_unstable();
        jobs.into_iter().map(|(_, _, id)| id.to_string()).collect()
    }

    /// Stops admitting new jobs.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Cancels the in-flight job with `task_id`. Returns false if it is not registered.
    pub fn cancel(&self, task_id: u64) -> bool {
        match self.lock().jobs.get(&task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every in-flight job. Entries stay until each job finishes.
    pub fn cancel_all(&self) {
        for entry in self.lock().jobs.values() {
            entry.cancel.cancel();
        }
    }

    /// Waits until no job is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn remove(&self, task_id: u64) {
        let now_empty = {
            let mut state = self.lock();
            state.jobs.remove(&task_id);
            state.jobs.is_empty()
        };
        if now_empty {
            self.idle.notify_waiters();
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry entry owned by one job; removed when dropped.
#[must_use = "the job is deregistered as soon as the registration is dropped"]
pub struct Registration {
    registry: Arc<Registry>,
    task_id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn handle(job: &str) -> JobHandle {
        JobHandle::new(job, "x", None, CancellationToken::new())
    }

    #[test]
    fn duplicate_job_ids_get_separate_entries() {
        let reg = Registry::new(None);
        let _a = reg.reserve(&handle("same")).unwrap();
        let _b = reg.reserve(&handle("same")).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.snapshot(), vec!["same".to_string(), "same".to_string()]);
    }

    #[test]
    fn limit_rejects_extra_jobs() {
        let reg = Registry::new(Some(1));
        let first = reg.reserve(&handle("a")).unwrap();
        let err = reg.reserve(&handle("b")).err().unwrap();
        assert_eq!(err, SetupError::CapacityExhausted { limit: 1 });

        drop(first);
        assert!(reg.reserve(&handle("b")).is_ok());
    }

    #[test]
    fn closed_registry_rejects_new_jobs() {
        let reg = Registry::new(None);
        reg.close();
        assert_eq!(
            reg.reserve(&handle("late")).err(),
            Some(SetupError::ShuttingDown)
        );
    }

    #[test]
    fn cancel_all_cancels_job_tokens() {
        let reg = Registry::new(None);
        let h = handle("a");
        let _r = reg.reserve(&h).unwrap();
        reg.cancel_all();
        assert!(h.cancel_token().is_cancelled());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn cancel_targets_one_job() {
        let reg = Registry::new(None);
        let (a, b) = (handle("a"), handle("b"));
        let _ra = reg.reserve(&a).unwrap();
        let _rb = reg.reserve(&b).unwrap();

        assert!(reg.cancel(a.task_id()));
        assert!(a.cancel_token().is_cancelled());
        assert!(!b.cancel_token().is_cancelled());
        assert!(!reg.cancel(u64::MAX));
    }

    #[tokio::test]
    async fn wait_idle_returns_when_last_job_leaves() {
        let reg = Registry::new(None);
        let r = reg.reserve(&handle("a")).unwrap();

        let waiter = {
            let reg = Arc::clone(&reg);
            tokio::spawn(async move { reg.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(r);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
