//! # Terminal outcome of a job.
//!
//! [`Outcome`] is a closed sum type: every job ends in exactly one of
//! `Success` or `Error`, and the notification envelope is derived by an
//! exhaustive match over it. The timestamp is captured when the outcome is
//! constructed, i.e. when the job reaches its terminal state, not when the
//! notification is sent.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Envelope status derived from an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Agent returned a usable result.
    Success,
    /// Anything else.
    Error,
}

impl Status {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

/// Immutable terminal result of one job.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The agent returned a usable result.
    Success {
        /// Correlation id.
        job_id: String,
        /// Agent output.
        result: String,
        /// Unix seconds (fractional) at terminal state.
        timestamp: f64,
    },
    /// Setup, execution or cancellation failure.
    Error {
        /// Correlation id.
        job_id: String,
        /// Failure description including the underlying detail.
        message: String,
        /// Unix seconds (fractional) at terminal state.
        timestamp: f64,
    },
}

impl Outcome {
    /// Builds a `Success` stamped with the current time.
    pub fn success(job_id: impl Into<String>, result: impl Into<String>) -> Self {
        Outcome::Success {
            job_id: job_id.into(),
            result: result.into(),
            timestamp: unix_now(),
        }
    }

    /// Builds an `Error` stamped with the current time.
    pub fn error(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Outcome::Error {
            job_id: job_id.into(),
            message: message.into(),
            timestamp: unix_now(),
        }
    }

    /// Correlation id.
    pub fn job_id(&self) -> &str {
        match self {
            Outcome::Success { job_id, .. } | Outcome::Error { job_id, .. } => job_id,
        }
    }

    /// Terminal-state timestamp (unix seconds).
    pub fn timestamp(&self) -> f64 {
        match self {
            Outcome::Success { timestamp, .. } | Outcome::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Envelope status for this outcome.
    pub fn status(&self) -> Status {
        match self {
            Outcome::Success { .. } => Status::Success,
            Outcome::Error { .. } => Status::Error,
        }
    }

    /// True for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Agent output, for `Success`.
    pub fn result(&self) -> Option<&str> {
        match self {
            Outcome::Success { result, .. } => Some(result),
            Outcome::Error { .. } => None,
        }
    }

    /// Failure description, for `Error`.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Error { message, .. } => Some(message),
        }
    }
}

/// Current wall-clock time as fractional unix seconds.
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_accessors() {
        let o = Outcome::success("j", "report text");
        assert!(o.is_success());
        assert_eq!(o.status(), Status::Success);
        assert_eq!(o.result(), Some("report text"));
        assert_eq!(o.error_message(), None);
        assert_eq!(o.job_id(), "j");
        assert!(o.timestamp() > 1_600_000_000.0);
    }

    #[test]
    fn error_accessors() {
        let o = Outcome::error("j", "quota exceeded");
        assert_eq!(o.status().as_str(), "error");
        assert_eq!(o.result(), None);
        assert_eq!(o.error_message(), Some("quota exceeded"));
    }

    #[test]
    fn timestamp_is_taken_at_construction() {
        let before = unix_now();
        let o = Outcome::error("j", "x");
        let after = unix_now();
        assert!(o.timestamp() >= before && o.timestamp() <= after);
    }
}
