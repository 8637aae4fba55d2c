//! # Dispatcher: accepts start requests and runs each job in the background.
//!
//! The [`Dispatcher`] is the single entry point of the runtime. A short-lived
//! caller hands it a [`JobRequest`]; the dispatcher validates it, launches the
//! job as an independent tokio task and returns an [`Ack`] without waiting for
//! the agent.
//!
//! ## Job lifecycle
//! ```text
//! accept(request)
//!   ├─► validate                      ─► Err(ValidationError)      (nothing launched, nothing notified)
//!   ├─► JobHandle::new (task_id, child token of runtime token)
//!   ├─► LivenessSignal::hold          ─► Err kept; job reports it as an Error outcome
//!   ├─► Registry::reserve             ─► Err: publish Error outcome ─► Ack { launch_failed }
//!   ├─► tokio::spawn(job)
//!   └─► Ack { started }               (returned immediately)
//!
//! job (background):
//!   watchdog::arm
//!   SessionManager::with_context
//!     ├─► executor::run (agent invoked once)   or   setup error outcome
//!     ├─► Publisher::publish(&outcome)          (exactly once)
//!     └─► session released
//!   liveness lowered
//!   deregistered
//! ```
//!
//! ## Shutdown
//! ```text
//! run_until_signal() ─► wait_for_shutdown_signal() ─► shutdown()
//! shutdown():
//!   ShutdownRequested ─► registry.close() ─► runtime_token.cancel()
//!   wait_idle() within cfg.grace
//!     ├─ Ok      ─► AllStoppedWithin
//!     └─ timeout ─► GraceExceeded { stuck job ids }
//!   subscriber listener stopped ─► queued events delivered ─► SubscriberSet::shutdown
//! ```
//! Cancelled jobs still publish an `Error` outcome before they finish.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{RuntimeError, SetupError, ValidationError};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{AgentRef, JobHandle, JobRequest, Outcome};
use crate::notify::Publisher;
use crate::subscribers::SubscriberSet;

use super::liveness::{LivenessSignal, ScopedSignal};
use super::registry::{Registration, Registry};
use super::session::SessionManager;
use super::{executor, shutdown, watchdog};

/// Launch state reported in an [`Ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// The job runs in the background.
    Started,
    /// The job could not be launched; an `Error` outcome was published.
    LaunchFailed,
}

/// Immediate answer to a start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// True when a background job was launched.
    pub accepted: bool,
    /// Caller's correlation id.
    pub job_id: String,
    /// Process-unique id assigned to the job.
    pub task_id: u64,
    /// Launch state.
    pub status: AckStatus,
}

impl Ack {
    fn started(handle: &JobHandle) -> Self {
        Self {
            accepted: true,
            job_id: handle.job_id().to_string(),
            task_id: handle.task_id(),
            status: AckStatus::Started,
        }
    }

    fn launch_failed(handle: &JobHandle) -> Self {
        Self {
            accepted: false,
            job_id: handle.job_id().to_string(),
            task_id: handle.task_id(),
            status: AckStatus::LaunchFailed,
        }
    }
}

/// Accepts job requests, runs them in the background and drives shutdown.
pub struct Dispatcher {
    cfg: Config,
    bus: Bus,
    subs: Mutex<Option<SubscriberSet>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    listener_stop: CancellationToken,
    registry: Arc<Registry>,
    liveness: LivenessSignal,
    sessions: SessionManager,
    publisher: Publisher,
    agent: AgentRef,
    runtime_token: CancellationToken,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: SubscriberSet,
        registry: Arc<Registry>,
        liveness: LivenessSignal,
        sessions: SessionManager,
        publisher: Publisher,
        agent: AgentRef,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs: Mutex::new(Some(subs)),
            listener: Mutex::new(None),
            listener_stop: CancellationToken::new(),
            registry,
            liveness,
            sessions,
            publisher,
            agent,
            runtime_token: CancellationToken::new(),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// The listener owns the set until [`shutdown`](Self::shutdown) stops it.
    pub(crate) fn subscriber_listener(&self) {
        let Some(set) = lock(&self.subs).take() else {
            return;
        };
        if set.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let stop = self.listener_stop.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber listener lagged behind the bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                                    warn!(skipped = n, "subscriber listener lagged behind the bus");
                                }
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        *lock(&self.listener) = Some(handle);
    }

    /// Stops the listener and waits until subscribers have processed queued events.
    async fn drain_subscribers(&self) {
        self.listener_stop.cancel();
        let handle = lock(&self.listener).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Receives every runtime event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Job ids currently in flight, oldest first.
    pub fn in_flight(&self) -> Vec<String> {
        self.registry.snapshot()
    }

    /// Waits until no job is in flight.
    pub async fn wait_idle(&self) {
        self.registry.wait_idle().await;
    }

    /// Decodes a raw JSON request and accepts it.
    pub async fn accept_json(&self, raw: &str) -> Result<Ack, ValidationError> {
        let request = JobRequest::from_json(raw)?;
        self.accept(request).await
    }

    /// Validates `request` and launches its job in the background.
    ///
    /// Returns as soon as the job is launched; never waits for the agent.
    /// Only a launch failure awaits anything: its `Error` outcome is published
    /// before the [`Ack`] is returned.
    pub async fn accept(&self, request: JobRequest) -> Result<Ack, ValidationError> {
        if let Err(e) = request.validate() {
            warn!(job_id = request.job_id(), label = e.as_label(), error = %e, "request rejected");
            return Err(e);
        }

        let input = if request.input().trim().is_empty() {
            self.cfg.default_input.as_str()
        } else {
            request.input()
        };
        let handle = JobHandle::new(
            request.job_id(),
            input,
            request.delay(),
            self.runtime_token.child_token(),
        );

        let signal = self.liveness.hold(&handle);
        let registration = match self.registry.reserve(&handle) {
            Ok(r) => r,
            Err(e) => {
                drop(signal);
                return Ok(self.launch_failed(&handle, e).await);
            }
        };

        info!(
            job_id = handle.job_id(),
            task_id = handle.task_id(),
            delay_secs = handle.delay().map(|d| d.as_secs()),
            "job accepted"
        );
        self.bus.publish(
            Event::new(EventKind::JobAccepted)
                .with_job(handle.job_id_arc())
                .with_task_id(handle.task_id()),
        );

        let ack = Ack::started(&handle);
        let job = JobScope {
            cfg: self.cfg.clone(),
            bus: self.bus.clone(),
            sessions: self.sessions.clone(),
            agent: Arc::clone(&self.agent),
        };
        tokio::spawn(job.run(handle, signal, registration));
        Ok(ack)
    }

    /// Asks the job with `task_id` (from its [`Ack`]) to stop.
    ///
    /// The job still publishes an `Error` outcome. Returns false when no such
    /// job is in flight.
    pub fn cancel(&self, task_id: u64) -> bool {
        let found = self.registry.cancel(task_id);
        if found {
            info!(task_id, "job cancellation requested");
        } else {
            warn!(task_id, "cancel for unknown task id");
        }
        found
    }

    /// Stops admitting jobs, cancels in-flight ones and waits up to `cfg.grace`.
    ///
    /// Subscribers receive every event published up to the end of the grace
    /// wait and are then shut down.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] with the job ids that did not
    /// reach an outcome in time.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let in_flight = self.registry.len();
        info!(in_flight, grace_secs = self.cfg.grace.as_secs(), "shutdown requested");
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        self.registry.close();
        self.runtime_token.cancel();
        self.registry.cancel_all();

        let grace = self.cfg.grace;
        let res = match tokio::time::timeout(grace, self.registry.wait_idle()).await {
            Ok(()) => {
                info!("all jobs stopped within grace");
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.registry.snapshot();
                error!(?stuck, grace_secs = grace.as_secs(), "grace exceeded; jobs abandoned");
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.drain_subscribers().await;
        res
    }

    /// Serves until a termination signal arrives, then shuts down gracefully.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        if let Err(e) = shutdown::wait_for_shutdown_signal().await {
            error!(error = %e, "signal handlers could not be installed; shutting down");
        }
        self.shutdown().await
    }

    async fn launch_failed(&self, handle: &JobHandle, err: SetupError) -> Ack {
        warn!(
            job_id = handle.job_id(),
            task_id = handle.task_id(),
            label = err.as_label(),
            error = %err,
            "job could not be launched"
        );
        self.bus.publish(
            Event::new(EventKind::LaunchFailed)
                .with_job(handle.job_id_arc())
                .with_task_id(handle.task_id())
                .with_reason(err.to_string()),
        );
        let outcome = Outcome::error(handle.job_id(), err.to_string());
        let _ = self.publisher.publish(&outcome).await;
        Ack::launch_failed(handle)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Everything one background job needs, detached from the dispatcher.
struct JobScope {
    cfg: Config,
    bus: Bus,
    sessions: SessionManager,
    agent: AgentRef,
}

impl JobScope {
    async fn run(
        self,
        handle: JobHandle,
        signal: Result<ScopedSignal, SetupError>,
        registration: Registration,
    ) {
        let _watchdog = watchdog::arm(&handle, self.cfg.expected_completion(), &self.bus);
        let (signal, setup_err) = match signal {
            Ok(s) => (Some(s), None),
            Err(e) => (None, Some(e)),
        };

        let job = &handle;
        let agent = self.agent.as_ref();
        let bus = &self.bus;
        let timeout = self.cfg.job_timeout();
        let _outcome = self
            .sessions
            .with_context(job, move |_session| async move {
                match setup_err {
                    None => executor::run(job, agent, timeout, bus).await,
                    Some(e) => setup_failed(job, e, bus),
                }
            })
            .await;

        drop(signal);
        drop(registration);
    }
}

fn setup_failed(handle: &JobHandle, err: SetupError, bus: &Bus) -> Outcome {
    let detail = err.to_string();
    error!(
        job_id = handle.job_id(),
        task_id = handle.task_id(),
        label = err.as_label(),
        error = %detail,
        "job setup failed; agent not invoked"
    );
    bus.publish(
        Event::new(EventKind::JobFailed)
            .with_job(handle.job_id_arc())
            .with_task_id(handle.task_id())
            .with_reason(detail.as_str()),
    );
    Outcome::error(handle.job_id(), detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serializes_with_snake_case_status() {
        let h = JobHandle::new("daily-report", "x", None, CancellationToken::new());
        let json = serde_json::to_value(Ack::launch_failed(&h)).unwrap();
        assert_eq!(json["accepted"], false);
        assert_eq!(json["job_id"], "daily-report");
        assert_eq!(json["status"], "launch_failed");
    }
}
