//! # Notification transport seam.
//!
//! [`Transport`] wraps the pub/sub service's publish primitive. The runtime
//! calls it at most once per outcome and never retries.
//!
//! [`MemoryTransport`] keeps published messages in memory. It backs tests and
//! demos and can be told to fail, to exercise the delivery-error path.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::TransportError;

/// One message handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    /// Destination topic identifier.
    pub topic: String,
    /// Subject line.
    pub subject: String,
    /// Encoded envelope.
    pub body: String,
}

/// Pub/sub publish primitive.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Transport name for logs.
    fn name(&self) -> &str;

    /// Publishes one message; returns the transport's message id.
    async fn publish(&self, message: &TransportMessage) -> Result<String, TransportError>;
}

/// In-memory transport recording every publish attempt.
#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<TransportMessage>>,
    attempts: AtomicU64,
    failure: Mutex<Option<TransportError>>,
}

impl MemoryTransport {
    /// Creates an empty, healthy transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that rejects every publish with `err`.
    pub fn failing(err: TransportError) -> Self {
        let t = Self::new();
        t.fail_with(Some(err));
        t
    }

    /// Sets (or clears) the injected failure.
    pub fn fail_with(&self, err: Option<TransportError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = err;
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<TransportMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Publish calls so far, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(&self, message: &TransportMessage) -> Result<String, TransportError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(format!("memory-{n}"))
    }
}
