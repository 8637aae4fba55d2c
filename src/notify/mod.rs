//! # Outcome notification.
//!
//! - [`NotificationEnvelope`] wire projection of an outcome
//! - [`Publisher`] one-shot, best-effort publish of an outcome
//! - [`Transport`] pub/sub seam, with the in-memory [`MemoryTransport`]

mod envelope;
mod publisher;
mod transport;

pub use envelope::{ERROR_PREFIX, NotificationEnvelope, SUCCESS_MESSAGE, TRUNCATED_SUFFIX};
pub use publisher::{PublishResult, Publisher, Receipt};
pub use transport::{MemoryTransport, Transport, TransportMessage};
