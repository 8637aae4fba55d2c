//! # jobvisor
//!
//! **Jobvisor** runs long agent jobs behind a short-lived trigger.
//!
//! A caller (scheduler, webhook, CLI) sends a start request and gets an
//! acknowledgment immediately. The job keeps running in the background while
//! the process tells its host it is busy, and when the job ends exactly one
//! notification describing the outcome is published to a pub/sub topic.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   { "action": "start", "job_id": "daily-report", "input": "..." }
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher::accept                                               │
//! │  - validate             (ValidationError → returned, not notified)│
//! │  - JobHandle            (task_id, child cancellation token)       │
//! │  - LivenessSignal::hold (host sees the process busy)              │
//! │  - Registry::reserve    (limit / shutting down → launch_failed)   │
//! │  - tokio::spawn(job)    ─────────────┐                            │
//! │  - Ack { started }  ◄── returned now │                            │
//! └──────────────────────────────────────┼────────────────────────────┘
//!                                        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  background job                                                   │
//! │  SessionManager::with_context                                     │
//! │    ├─► acquire context                                            │
//! │    ├─► executor::run ─► Agent::execute (once) ─► Outcome          │
//! │    ├─► Publisher::publish(&Outcome)   (once, never retried)       │
//! │    └─► release context  "task completed and session released"     │
//! │  ScopedSignal dropped ─► host sees the process idle               │
//! └───────────────────────────────────────────────────────────────────┘
//!
//!   every step ── publish(Event) ──► Bus ──► SubscriberSet ──► user subscribers
//! ```
//!
//! ### Outcome envelope
//! ```text
//! Success: { job_id, status: "success", message: SUCCESS_MESSAGE, timestamp, result }
//! Error:   { job_id, status: "error",   message: ERROR_PREFIX + detail, timestamp }
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                         |
//! |-------------------|-----------------------------------------------------------------|--------------------------------------------|
//! | **Dispatch**      | Accept requests, launch jobs, graceful shutdown.                | [`Dispatcher`], [`DispatcherBuilder`], [`Ack`] |
//! | **Agents**        | The opaque computation, as a trait or a closure.                | [`Agent`], [`AgentFn`], [`AgentRef`]       |
//! | **Liveness**      | Keep the host from reclaiming a busy process.                   | [`LivenessHost`], [`BusyTracker`]          |
//! | **Sessions**      | Scoped execution context released after publish.               | [`SessionProvider`], [`LocalSessions`]     |
//! | **Notification**  | One-shot envelope publish over a pluggable transport.           | [`Publisher`], [`Transport`], [`NotificationEnvelope`] |
//! | **Subscriber API**| Hook into job lifecycle events.                                 | [`Subscribe`], [`Event`], [`EventKind`]    |
//! | **Errors**        | Typed errors per lifecycle stage.                               | [`ValidationError`], [`SetupError`], [`ExecutionError`], [`DeliveryError`] |
//! | **Configuration** | Environment-driven settings.                                    | [`Config`]                                 |
//!
//! ## Optional features
//! - `json-logs`: [`telemetry::init`] prints one JSON object per log line.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{AgentError, AgentFn, Config, DispatcherBuilder, JobRequest, MemoryTransport};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::new("arn:topic:agent-jobs");
//!     let agent = AgentFn::arc("reporter", |input: String, _ctx: CancellationToken| async move {
//!         Ok::<_, AgentError>(format!("report: {input}"))
//!     });
//!     let transport = Arc::new(MemoryTransport::new());
//!
//!     let dispatcher = DispatcherBuilder::new(cfg, agent, transport.clone()).build()?;
//!
//!     let ack = dispatcher
//!         .accept(JobRequest::start("daily-report", "Generate analytics report"))
//!         .await?;
//!     assert!(ack.accepted);
//!
//!     dispatcher.wait_idle().await;
//!     assert_eq!(transport.sent().len(), 1);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod jobs;
mod notify;
mod subscribers;

pub mod telemetry;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    Ack, AckStatus, BusyTicket, BusyTracker, Dispatcher, DispatcherBuilder, LivenessHost,
    LivenessSignal, LocalSessions, PingStatus, ScopedSignal, SessionContext, SessionManager,
    SessionProvider,
};
pub use error::{
    AgentError, ConfigError, DeliveryError, ExecutionError, LivenessError, RuntimeError,
    SessionError, SetupError, TransportError, ValidationError,
};
pub use events::{Bus, Event, EventKind};
pub use jobs::{Action, Agent, AgentFn, AgentRef, JobHandle, JobRequest, Outcome, Status};
pub use notify::{
    ERROR_PREFIX, MemoryTransport, NotificationEnvelope, PublishResult, Publisher, Receipt,
    SUCCESS_MESSAGE, TRUNCATED_SUFFIX, Transport, TransportMessage,
};
pub use subscribers::{Subscribe, SubscriberSet};
