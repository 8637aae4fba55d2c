//! Runtime core: dispatch and job lifecycle.
//!
//! The public entry point is [`Dispatcher`], built with [`DispatcherBuilder`].
//!
//! Internal modules:
//! - [`dispatcher`]: validates requests, launches jobs, drives shutdown;
//! - [`executor`]: runs the agent once with delay/timeout/cancellation and event publishing;
//! - [`liveness`]: RAII busy signal towards the hosting runtime;
//! - [`session`]: execution context, publish-then-release ordering;
//! - [`registry`]: in-flight jobs by task id, concurrency limit;
//! - [`watchdog`]: expected-completion warnings;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod dispatcher;
mod executor;
mod liveness;
mod registry;
mod session;
mod shutdown;
mod watchdog;

pub use builder::DispatcherBuilder;
pub use dispatcher::{Ack, AckStatus, Dispatcher};
pub use liveness::{BusyTicket, BusyTracker, LivenessHost, LivenessSignal, PingStatus, ScopedSignal};
pub use session::{LocalSessions, SessionContext, SessionManager, SessionProvider};
