//! # Notification publisher.
//!
//! Turns an [`Outcome`] into a [`NotificationEnvelope`], encodes it and calls
//! the [`Transport`] exactly once.
//!
//! ## Delivery semantics
//! At most one publish attempt per outcome, best effort:
//! ```text
//! publish(&Outcome)
//!   ├─► envelope = NotificationEnvelope::from_outcome(outcome)
//!   ├─► body = envelope.to_json()           ─► Err → DeliveryError::Encode
//!   ├─► transport.publish(msg) [timeout]    ─► Err → DeliveryError::Transport / Timeout
//!   │                                        ─► panic → DeliveryError::Panicked
//!   └─► Ok(Receipt)
//! ```
//! A failure is logged with topic, job id and error, published as
//! `NotificationFailed`, and returned to the caller. It is never retried: the
//! job is already terminal, and a retry without transport-side idempotency keys
//! could duplicate the notification.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info};

use crate::error::DeliveryError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{Outcome, Status};
use crate::subscribers::panic_message;

use super::envelope::NotificationEnvelope;
use super::transport::{Transport, TransportMessage};

/// Proof of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Id assigned by the transport.
    pub message_id: String,
    /// Status of the published envelope.
    pub status: Status,
}

/// Result of one publish attempt.
pub type PublishResult = Result<Receipt, DeliveryError>;

/// Publishes job outcomes to the notification topic.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    topic: Arc<str>,
    max_result_chars: usize,
    timeout: Option<Duration>,
    bus: Bus,
}

impl Publisher {
    /// Creates a publisher for `topic`.
    pub fn new(
        transport: Arc<dyn Transport>,
        topic: impl Into<Arc<str>>,
        max_result_chars: usize,
        timeout: Option<Duration>,
        bus: Bus,
    ) -> Self {
        Self {
            transport,
            topic: topic.into(),
            max_result_chars,
            timeout,
            bus,
        }
    }

    /// Destination topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes `outcome` once. Never panics, never retries.
    pub async fn publish(&self, outcome: &Outcome) -> PublishResult {
        let res = self.try_publish(outcome).await;
        let job_id = outcome.job_id();

        match &res {
            Ok(receipt) => {
                info!(
                    job_id,
                    status = receipt.status.as_str(),
                    topic = %self.topic,
                    message_id = %receipt.message_id,
                    "notification sent"
                );
                self.bus.publish(
                    Event::new(EventKind::NotificationSent)
                        .with_job(job_id)
                        .with_reason(receipt.status.as_str()),
                );
            }
            Err(e) => {
                error!(
                    job_id,
                    topic = %self.topic,
                    transport = self.transport.name(),
                    error = %e,
                    label = e.as_label(),
                    "notification failed; outcome will not be observed downstream"
                );
                self.bus.publish(
                    Event::new(EventKind::NotificationFailed)
                        .with_job(job_id)
                        .with_reason(e.to_string()),
                );
            }
        }
        res
    }

    async fn try_publish(&self, outcome: &Outcome) -> PublishResult {
        let envelope = NotificationEnvelope::from_outcome(outcome, self.max_result_chars);
        let message = TransportMessage {
            topic: self.topic.to_string(),
            subject: envelope.subject(),
            body: envelope.to_json()?,
        };

        let call = AssertUnwindSafe(self.transport.publish(&message)).catch_unwind();
        let sent = match self.timeout {
            Some(dur) => tokio::time::timeout(dur, call)
                .await
                .map_err(|_elapsed| DeliveryError::Timeout {
                    topic: self.topic.to_string(),
                    timeout: dur,
                })?,
            None => call.await,
        };
        let sent = sent.map_err(|payload| DeliveryError::Panicked {
            transport: self.transport.name().to_string(),
            topic: self.topic.to_string(),
            info: panic_message(payload.as_ref()),
        })?;

        let message_id = sent.map_err(|source| DeliveryError::Transport {
            transport: self.transport.name().to_string(),
            topic: self.topic.to_string(),
            source,
        })?;

        Ok(Receipt {
            message_id,
            status: envelope.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::notify::MemoryTransport;
    use async_trait::async_trait;

    fn publisher(transport: Arc<dyn Transport>, timeout: Option<Duration>) -> Publisher {
        Publisher::new(transport, "jobs-topic", 1000, timeout, Bus::new(16))
    }

    #[tokio::test]
    async fn success_is_sent_once_with_subject() {
        let transport = Arc::new(MemoryTransport::new());
        let p = publisher(transport.clone(), None);

        let receipt = p.publish(&Outcome::success("j1", "report text")).await.unwrap();
        assert_eq!(receipt.status, Status::Success);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "jobs-topic");
        assert_eq!(sent[0].subject, "Agent Job SUCCESS: j1");
        let env: NotificationEnvelope = serde_json::from_str(&sent[0].body).unwrap();
        assert_eq!(env.result.as_deref(), Some("report text"));
    }

    #[tokio::test]
    async fn transport_failure_is_reported_not_retried() {
        let transport = Arc::new(MemoryTransport::failing(TransportError::Unauthorized(
            "no publish permission".into(),
        )));
        let p = publisher(transport.clone(), None);

        let err = p.publish(&Outcome::error("j2", "boom")).await.unwrap_err();
        assert_eq!(err.as_label(), "delivery_transport");
        assert!(err.to_string().contains("jobs-topic"));
        assert_eq!(transport.attempts(), 1);
    }

    struct Hanging;

    #[async_trait]
    impl Transport for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }
        async fn publish(&self, _message: &TransportMessage) -> Result<String, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transport_times_out() {
        let p = publisher(Arc::new(Hanging), Some(Duration::from_secs(30)));
        let err = p.publish(&Outcome::success("j3", "r")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout { .. }));
    }

    struct Exploding;

    #[async_trait]
    impl Transport for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }
        async fn publish(&self, _message: &TransportMessage) -> Result<String, TransportError> {
            panic!("sdk client poisoned");
        }
    }

    #[tokio::test]
    async fn transport_panic_is_a_delivery_error() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let p = Publisher::new(Arc::new(Exploding), "jobs-topic", 1000, None, bus);

        let err = p.publish(&Outcome::success("j5", "r")).await.unwrap_err();
        assert_eq!(err.as_label(), "delivery_panicked");
        assert!(err.to_string().contains("sdk client poisoned"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::NotificationFailed);
    }

    #[tokio::test]
    async fn events_report_delivery() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let p = Publisher::new(Arc::new(MemoryTransport::new()), "t", 10, None, bus);

        p.publish(&Outcome::error("j4", "x")).await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::NotificationSent);
        assert_eq!(ev.reason.as_deref(), Some("error"));
    }
}
