//! # Session lifecycle: scoped execution context for one job.
//!
//! Every job runs inside an execution context (sandbox, session handle, host
//! registration) obtained from a [`SessionProvider`]. [`SessionManager::with_context`]
//! owns the whole tail of the job:
//!
//! ```text
//! with_context(handle, body)
//!   ├─► provider.acquire(handle)
//!   │     ├─ Err / panic ─► Outcome::Error(SetupError::Session)   (body never runs)
//!   │     └─ Ok  ─► ReleaseGuard(ctx)
//!   │               └─► body(ctx).await ─► Outcome
//!   ├─► publisher.publish(&outcome)        (exactly once, result only logged)
//!   └─► guard.release()                    ("task completed and session released")
//! ```
//!
//! ## Rules
//! - Release happens strictly **after** the publish attempt, so a context tied to
//!   notification credentials is still alive while sending.
//! - Release is unconditional once the outcome exists, even when publish fails.
//! - Release happens **exactly once**: explicitly on the normal path, from `Drop`
//!   if the job future is aborted or unwinds.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info};

use crate::error::{SessionError, SetupError};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{JobHandle, Outcome};
use crate::notify::Publisher;
use crate::subscribers::panic_message;

/// Host resources held by one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Session identifier (`<session_name>/<job_id>` for [`LocalSessions`]).
    pub id: String,
    /// Job the context belongs to.
    pub job_id: String,
    /// Process-unique task id of that job.
    pub task_id: u64,
}

/// Acquires and releases execution contexts.
///
/// `release` is synchronous so it can run from `Drop`.
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    /// Provider name for logs.
    fn name(&self) -> &str {
        "sessions"
    }

    /// Sets up the context for `handle`.
    async fn acquire(&self, handle: &JobHandle) -> Result<SessionContext, SessionError>;

    /// Tears the context down. Called exactly once per acquired context.
    fn release(&self, ctx: &SessionContext);
}

/// In-process session provider.
///
/// Names sessions `<session_name>/<job_id>` and keeps counters so operators
/// and tests can confirm every acquired context was released.
pub struct LocalSessions {
    session_name: String,
    active: Mutex<HashMap<u64, String>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl LocalSessions {
    /// Creates a provider naming sessions after `session_name`.
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            active: Mutex::new(HashMap::new()),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Sorted ids of sessions not yet released.
    pub fn active(&self) -> Vec<String> {
        let mut v: Vec<String> = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        v.sort_unstable();
        v
    }

    /// Total contexts handed out.
    pub fn acquired_count(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Total contexts released.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for LocalSessions {
    fn name(&self) -> &str {
        "local"
    }

    async fn acquire(&self, handle: &JobHandle) -> Result<SessionContext, SessionError> {
        let ctx = SessionContext {
            id: format!("{}/{}", self.session_name, handle.job_id()),
            job_id: handle.job_id().to_string(),
            task_id: handle.task_id(),
        };
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ctx.task_id, ctx.id.clone());
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(ctx)
    }

    fn release(&self, ctx: &SessionContext) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&ctx.task_id);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Releases an acquired context exactly once.
struct ReleaseGuard {
    provider: Arc<dyn SessionProvider>,
    ctx: Option<SessionContext>,
    bus: Bus,
}

impl ReleaseGuard {
    fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(ctx) = self.ctx.take() else { return };
        self.provider.release(&ctx);
        info!(
            job_id = %ctx.job_id,
            task_id = ctx.task_id,
            session = %ctx.id,
            "task completed and session released"
        );
        self.bus.publish(
            Event::new(EventKind::SessionReleased)
                .with_job(ctx.job_id.as_str())
                .with_task_id(ctx.task_id),
        );
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Runs a job body inside an execution context and publishes its outcome.
#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    publisher: Publisher,
    bus: Bus,
}

impl SessionManager {
    /// Creates a manager over `provider`, publishing through `publisher`.
    pub fn new(provider: Arc<dyn SessionProvider>, publisher: Publisher, bus: Bus) -> Self {
        Self {
            provider,
            publisher,
            bus,
        }
    }

    /// Acquires a context, runs `body`, publishes the outcome, releases the context.
    ///
    /// Returns the outcome after it has been handed to the publisher.
    pub async fn with_context<F, Fut>(&self, handle: &JobHandle, body: F) -> Outcome
    where
        F: FnOnce(SessionContext) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let (outcome, guard) = match self.acquire(handle).await {
            Ok(ctx) => {
                debug!(
                    job_id = handle.job_id(),
                    task_id = handle.task_id(),
                    session = %ctx.id,
                    provider = self.provider.name(),
                    "session acquired"
                );
                self.bus.publish(
                    Event::new(EventKind::SessionAcquired)
                        .with_job(handle.job_id_arc())
                        .with_task_id(handle.task_id())
                        .with_reason(ctx.id.as_str()),
                );
                let guard = ReleaseGuard {
                    provider: Arc::clone(&self.provider),
                    ctx: Some(ctx.clone()),
                    bus: self.bus.clone(),
                };
                (body(ctx).await, Some(guard))
            }
            Err(e) => {
                let err = SetupError::from(e);
                error!(
                    job_id = handle.job_id(),
                    task_id = handle.task_id(),
                    provider = self.provider.name(),
                    label = err.as_label(),
                    error = %err,
                    "session setup failed; agent not invoked"
                );
                let outcome = Outcome::error(handle.job_id(), err.to_string());
                (outcome, None)
            }
        };

        // Delivery failures are logged by the publisher; release does not depend on them.
        let _ = self.publisher.publish(&outcome).await;

        match guard {
            Some(guard) => guard.release(),
            None => info!(
                job_id = handle.job_id(),
                task_id = handle.task_id(),
                "task completed without a session to release"
            ),
        }
        outcome
    }

    /// Calls the provider, turning a panic into a [`SessionError`].
    async fn acquire(&self, handle: &JobHandle) -> Result<SessionContext, SessionError> {
        match AssertUnwindSafe(self.provider.acquire(handle))
            .catch_unwind()
            .await
        {
            Ok(res) => res,
            Err(payload) => Err(SessionError(format!(
                "session provider panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}
