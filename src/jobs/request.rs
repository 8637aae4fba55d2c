//! # Inbound start requests.
//!
//! A [`JobRequest`] is what the short-lived caller sends:
//! ```text
//! { "action": "start", "job_id": "<string>", "input": "<string>", "seconds": <optional int> }
//! ```
//!
//! `seconds` may also arrive as a string (`"30"`); zero or negative values mean
//! no delay.
//!
//! Decoding is deliberately lenient (every field optional on the wire) so that
//! a bad payload surfaces as a typed [`ValidationError`] rather than a decoder
//! error. Once constructed, a request is immutable.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Requested operation. Only `start` is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Launch a new job.
    Start,
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            other => Err(ValidationError::UnsupportedAction {
                action: other.to_string(),
            }),
        }
    }
}

#[derive(Deserialize)]
struct WireRequest {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    seconds: Option<WireSeconds>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireSeconds {
    Int(i64),
    Float(f64),
    Text(String),
}

impl WireSeconds {
    /// Delay in whole seconds, `None` when zero or negative.
    fn into_delay(self) -> Result<Option<Duration>, ValidationError> {
        let secs = match self {
            WireSeconds::Int(n) => n,
            WireSeconds::Float(f) => f.trunc() as i64,
            WireSeconds::Text(t) if t.trim().is_empty() => 0,
            WireSeconds::Text(t) => t.trim().parse::<i64>().map_err(|e| {
                ValidationError::Malformed {
                    reason: format!("seconds {t:?}: {e}"),
                }
            })?,
        };
        Ok(u64::try_from(secs)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs))
    }
}

/// Start request for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    action: Action,
    job_id: String,
    input: String,
    delay: Option<Duration>,
}

impl JobRequest {
    /// Creates a `start` request.
    pub fn start(job_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            action: Action::Start,
            job_id: job_id.into(),
            input: input.into(),
            delay: None,
        }
    }

    /// Returns a request that waits `delay` before invoking the agent.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = (delay > Duration::ZERO).then_some(delay);
        self
    }

    /// Decodes and validates a JSON payload.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobRequest;
    ///
    /// let req = JobRequest::from_json(
    ///     r#"{"action":"start","job_id":"daily-report","input":"Generate analytics report"}"#,
    /// ).unwrap();
    /// assert_eq!(req.job_id(), "daily-report");
    ///
    /// assert!(JobRequest::from_json(r#"{"action":"stop","job_id":"x"}"#).is_err());
    /// ```
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let wire: WireRequest =
            serde_json::from_str(raw).map_err(|e| ValidationError::Malformed {
                reason: e.to_string(),
            })?;

        let action = wire.action.as_deref().unwrap_or_default().parse::<Action>()?;
        let delay = match wire.seconds {
            Some(s) => s.into_delay()?,
            None => None,
        };
        let req = Self {
            action,
            job_id: wire.job_id.unwrap_or_default(),
            input: wire.input.unwrap_or_default(),
            delay,
        };
        req.validate()?;
        Ok(req)
    }

    /// Checks the request invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.job_id.trim().is_empty() {
            return Err(ValidationError::EmptyJobId);
        }
        Ok(())
    }

    /// Requested action.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Caller-chosen correlation id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Agent input (may be empty; the dispatcher substitutes the configured default).
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Optional wait before the agent is invoked.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_payload() {
        let req = JobRequest::from_json(
            r#"{"action":"start","job_id":"j1","input":"hello","seconds":5}"#,
        )
        .unwrap();
        assert_eq!(req.action(), Action::Start);
        assert_eq!(req.job_id(), "j1");
        assert_eq!(req.input(), "hello");
        assert_eq!(req.delay(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = JobRequest::from_json(r#"{"action":"noop","job_id":"j1"}"#).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedAction {
                action: "noop".into()
            }
        );
    }

    #[test]
    fn missing_action_is_rejected() {
        let err = JobRequest::from_json(r#"{"job_id":"j1"}"#).unwrap_err();
        assert_eq!(err.as_label(), "validation_unsupported_action");
    }

    #[test]
    fn empty_job_id_is_rejected() {
        let err = JobRequest::from_json(r#"{"action":"start","job_id":"  "}"#).unwrap_err();
        assert_eq!(err, ValidationError::EmptyJobId);
        assert_eq!(JobRequest::start("", "x").validate(), Err(ValidationError::EmptyJobId));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = JobRequest::from_json("not json").unwrap_err();
        assert_eq!(err.as_label(), "validation_malformed");
    }

    #[test]
    fn zero_delay_means_none() {
        let req = JobRequest::start("j", "i").with_delay(Duration::ZERO);
        assert_eq!(req.delay(), None);
        let req = JobRequest::from_json(r#"{"action":"start","job_id":"j","seconds":0}"#).unwrap();
        assert_eq!(req.delay(), None);
    }

    #[test]
    fn seconds_accepts_text_and_clamps_negatives() {
        let req =
            JobRequest::from_json(r#"{"action":"start","job_id":"j","seconds":"30"}"#).unwrap();
        assert_eq!(req.delay(), Some(Duration::from_secs(30)));

        let req = JobRequest::from_json(r#"{"action":"start","job_id":"j","seconds":-1}"#).unwrap();
        assert_eq!(req.delay(), None);

        let req =
            JobRequest::from_json(r#"{"action":"start","job_id":"j","seconds":null}"#).unwrap();
        assert_eq!(req.delay(), None);

        let err = JobRequest::from_json(r#"{"action":"start","job_id":"j","seconds":"soon"}"#)
            .unwrap_err();
        assert_eq!(err.as_label(), "validation_malformed");
    }
}
