//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the dispatcher, the
//! liveness signal, the session manager, the executor and the publisher.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! Events are observability only: no correctness decision in the runtime
//! depends on a receiver seeing them.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
