//! # Notification envelope.
//!
//! The wire-level projection of an [`Outcome`]. It is the only artifact that
//! crosses the system boundary toward the notification transport.
//!
//! ```text
//! Success: { "job_id", "status": "success", "message": SUCCESS_MESSAGE, "timestamp", "result" }
//! Error:   { "job_id", "status": "error",   "message": ERROR_PREFIX + detail, "timestamp" }
//! ```

use serde::{Deserialize, Serialize};

use crate::jobs::{Outcome, Status, truncate_chars};

/// Fixed `message` of every success envelope.
pub const SUCCESS_MESSAGE: &str = "Agent job completed successfully";

/// Fixed prefix of every error envelope's `message`.
pub const ERROR_PREFIX: &str = "An error occurred during agent job execution: ";

/// Appended to a result cut at `max_result_chars`.
pub const TRUNCATED_SUFFIX: &str = "...(truncated)";

/// Structured message describing a job's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// Correlation id, copied from the outcome.
    pub job_id: String,
    /// `"success"` or `"error"`.
    pub status: Status,
    /// Human-readable message, always present.
    pub message: String,
    /// Terminal-state time in unix seconds, copied from the outcome.
    pub timestamp: f64,
    /// Agent output (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl NotificationEnvelope {
    /// Projects an outcome, keeping at most `max_result_chars` of the result.
    ///
    /// `max_result_chars = 0` keeps the whole result.
    pub fn from_outcome(outcome: &Outcome, max_result_chars: usize) -> Self {
        match outcome {
            Outcome::Success {
                job_id,
                result,
                timestamp,
            } => Self {
                job_id: job_id.clone(),
                status: Status::Success,
                message: SUCCESS_MESSAGE.to_string(),
                timestamp: *timestamp,
                result: Some(match max_result_chars {
                    0 => result.clone(),
                    n => truncate_chars(result, n, TRUNCATED_SUFFIX),
                }),
            },
            Outcome::Error {
                job_id,
                message,
                timestamp,
            } => Self {
                job_id: job_id.clone(),
                status: Status::Error,
                message: format!("{ERROR_PREFIX}{message}"),
                timestamp: *timestamp,
                result: None,
            },
        }
    }

    /// Subject line for transports that support one.
    pub fn subject(&self) -> String {
        format!(
            "Agent Job {}: {}",
            self.status.as_str().to_uppercase(),
            self.job_id
        )
    }

    /// Pretty-printed JSON body.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn success_envelope_carries_result() {
        let outcome = Outcome::success("daily-report", "Report generated.");
        let env = NotificationEnvelope::from_outcome(&outcome, 1000);

        assert_eq!(env.status, Status::Success);
        assert_eq!(env.message, SUCCESS_MESSAGE);
        assert_eq!(env.result.as_deref(), Some("Report generated."));
        assert_eq!(env.timestamp, outcome.timestamp());
        assert_eq!(env.subject(), "Agent Job SUCCESS: daily-report");
    }

    #[test]
    fn error_envelope_prefixes_detail_and_omits_result() {
        let outcome = Outcome::error("j", "agent failed: quota exceeded");
        let env = NotificationEnvelope::from_outcome(&outcome, 1000);

        assert_eq!(env.status, Status::Error);
        assert!(env.message.starts_with(ERROR_PREFIX));
        assert!(env.message.contains("quota exceeded"));

        let json: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn long_result_is_truncated() {
        let outcome = Outcome::success("j", "x".repeat(1500));
        let env = NotificationEnvelope::from_outcome(&outcome, 1000);
        let result = env.result.unwrap();
        assert!(result.ends_with(TRUNCATED_SUFFIX));
        assert_eq!(result.chars().count(), 1000 + TRUNCATED_SUFFIX.len());
    }

    #[test]
    fn zero_limit_keeps_whole_result() {
        let long = "x".repeat(5000);
        let env = NotificationEnvelope::from_outcome(&Outcome::success("j", long.clone()), 0);
        assert_eq!(env.result.as_deref(), Some(long.as_str()));
    }

    #[test]
    fn wire_shape_matches_contract() {
        let env = NotificationEnvelope::from_outcome(&Outcome::success("a", "b"), 10);
        let json: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["job_id", "message", "result", "status", "timestamp"]);
        assert!(json["timestamp"].is_f64());
    }
}
