//! Error types used by the jobvisor runtime, its host adapters and agents.
//!
//! The taxonomy follows the lifecycle of a job:
//!
//! - [`ValidationError`] - bad inbound request; returned synchronously to the caller.
//! - [`SetupError`] - liveness, session or launch failure; becomes an `Error` outcome.
//! - [`ExecutionError`] - the agent failed; becomes an `Error` outcome.
//! - [`DeliveryError`] - the notification could not be published; logged only.
//! - [`RuntimeError`] - orchestration failures (shutdown grace exceeded).
//! - [`ConfigError`] - startup-fatal configuration problems.
//!
//! Host-facing traits report their own narrow errors ([`AgentError`],
//! [`LivenessError`], [`SessionError`], [`TransportError`]) which are wrapped
//! by the lifecycle errors above.
//!
//! Every enum provides `as_label()` with a short stable snake_case label for
//! logs and metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the jobvisor runtime.
///
/// These represent failures in the orchestration system itself, not in any job.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some jobs were abandoned without an outcome.
    #[error("shutdown timeout {grace:?} exceeded; abandoned jobs: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Job ids that did not reach a terminal outcome in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Inbound request rejected before any job was created.
///
/// Returned synchronously by the dispatcher; never reaches the notification path.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `action` was something other than `start`.
    #[error("unsupported action {action:?}; expected \"start\"")]
    UnsupportedAction {
        /// The action received.
        action: String,
    },

    /// `job_id` was missing or empty.
    #[error("job_id must be a non-empty string")]
    EmptyJobId,

    /// The payload could not be decoded.
    #[error("malformed request: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },
}

impl ValidationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedAction { .. } => "validation_unsupported_action",
            ValidationError::EmptyJobId => "validation_empty_job_id",
            ValidationError::Malformed { .. } => "validation_malformed",
        }
    }
}

/// # Job could not be set up; the agent is never invoked.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// The host refused to mark the process busy.
    #[error("liveness signal could not be raised: {0}")]
    Liveness(#[from] LivenessError),

    /// The execution context could not be acquired.
    #[error("execution context could not be acquired: {0}")]
    Session(#[from] SessionError),

    /// `max_concurrent` jobs are already running.
    #[error("job could not be launched: concurrency limit {limit} reached")]
    CapacityExhausted {
        /// Configured limit.
        limit: usize,
    },

    /// The dispatcher is shutting down and accepts no new work.
    #[error("job could not be launched: dispatcher is shutting down")]
    ShuttingDown,
}

impl SetupError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SetupError::Liveness(_) => "setup_liveness",
            SetupError::Session(_) => "setup_session",
            SetupError::CapacityExhausted { .. } => "setup_capacity_exhausted",
            SetupError::ShuttingDown => "setup_shutting_down",
        }
    }
}

/// # The agent run did not produce a usable result.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The agent returned an error.
    #[error("agent failed: {0}")]
    Agent(#[from] AgentError),

    /// The agent returned an empty or whitespace-only result.
    #[error("agent returned an empty result")]
    EmptyResult,

    /// The agent panicked.
    #[error("agent panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },

    /// The job was cancelled (host request or shutdown) before completing.
    #[error("job cancelled before completion")]
    Canceled,

    /// The job exceeded the configured hard timeout.
    #[error("job timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },
}

impl ExecutionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutionError::Agent(_) => "execution_agent_failed",
            ExecutionError::EmptyResult => "execution_empty_result",
            ExecutionError::Panicked { .. } => "execution_panicked",
            ExecutionError::Canceled => "execution_canceled",
            ExecutionError::Timeout { .. } => "execution_timeout",
        }
    }
}

/// # The notification could not be delivered.
///
/// Never retried and never escalated: the job is already terminal.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The envelope could not be serialized.
    #[error("envelope encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport rejected the publish call.
    #[error("transport {transport} failed to publish to {topic}: {source}")]
    Transport {
        /// Transport name.
        transport: String,
        /// Destination topic.
        topic: String,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// The transport did not answer within `publish_timeout`.
    #[error("publish to {topic} timed out after {timeout:?}")]
    Timeout {
        /// Destination topic.
        topic: String,
        /// Configured publish timeout.
        timeout: Duration,
    },

    /// The transport panicked while publishing.
    #[error("transport {transport} panicked publishing to {topic}: {info}")]
    Panicked {
        /// Transport name.
        transport: String,
        /// Destination topic.
        topic: String,
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl DeliveryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Encode(_) => "delivery_encode",
            DeliveryError::Transport { .. } => "delivery_transport",
            DeliveryError::Timeout { .. } => "delivery_timeout",
            DeliveryError::Panicked { .. } => "delivery_panicked",
        }
    }
}

/// # Invalid or missing configuration; fatal at startup.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("missing required configuration {key}")]
    Missing {
        /// Variable name.
        key: &'static str,
    },

    /// A variable could not be parsed.
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// What the parser expected.
        expected: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Missing { .. } => "config_missing",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// Error raised by an [`Agent`](crate::Agent) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AgentError {
    message: String,
}

impl AgentError {
    /// Creates an agent error with a descriptive message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for AgentError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for AgentError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Error raised by a [`LivenessHost`](crate::LivenessHost).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LivenessError(pub String);

/// Error raised by a [`SessionProvider`](crate::SessionProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SessionError(pub String);

/// Error raised by a notification [`Transport`](crate::Transport).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Topic does not exist or cannot be reached.
    #[error("topic unreachable: {0}")]
    Unreachable(String),

    /// Caller is not allowed to publish to the topic.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Any other transport-side failure.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(ValidationError::EmptyJobId.as_label(), "validation_empty_job_id");
        assert_eq!(
            SetupError::CapacityExhausted { limit: 1 }.as_label(),
            "setup_capacity_exhausted"
        );
        assert_eq!(ExecutionError::EmptyResult.as_label(), "execution_empty_result");
        assert_eq!(
            ConfigError::Missing { key: "NOTIFICATION_TARGET" }.as_label(),
            "config_missing"
        );
    }

    #[test]
    fn agent_failure_detail_is_kept_in_display() {
        let err = ExecutionError::from(AgentError::new("quota exceeded"));
        assert_eq!(err.to_string(), "agent failed: quota exceeded");
    }

    #[test]
    fn setup_error_wraps_host_detail() {
        let err = SetupError::from(LivenessError("ping endpoint down".into()));
        assert!(err.to_string().contains("ping endpoint down"));
        assert_eq!(err.as_label(), "setup_liveness");
    }

    #[test]
    fn delivery_error_names_topic_and_transport() {
        let err = DeliveryError::Transport {
            transport: "memory".into(),
            topic: "jobs-topic".into(),
            source: TransportError::Unauthorized("denied".into()),
        };
        let text = err.to_string();
        assert!(text.contains("memory"));
        assert!(text.contains("jobs-topic"));
        assert!(text.contains("denied"));
    }
}
