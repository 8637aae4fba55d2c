//! # Runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the dispatcher and every
//! job it launches.
//!
//! Config is loaded in one of two ways:
//! 1. **Environment**: [`Config::from_env`] (the normal path in a hosted runtime)
//! 2. **Explicitly**: [`Config::new`] + field overrides (tests, embedding)
//!
//! ## Environment variables
//! | Variable                   | Field                 | Default                              |
//! |----------------------------|-----------------------|--------------------------------------|
//! | `NOTIFICATION_TARGET`      | `notification_target` | **required**                         |
//! | `MODEL_IDENTIFIER`         | `model_identifier`    | `default-model`                      |
//! | `SESSION_NAME`             | `session_name`        | `scheduled_agent_session`            |
//! | `DEFAULT_INPUT`            | `default_input`       | `Say hello and show current_time.`   |
//! | `JOB_TIMEOUT_SECS`         | `job_timeout`         | `0` (none)                           |
//! | `EXPECTED_COMPLETION_SECS` | `expected_completion` | `0` (watchdog disabled)              |
//! | `PUBLISH_TIMEOUT_SECS`     | `publish_timeout`     | `30`                                 |
//! | `SHUTDOWN_GRACE_SECS`      | `grace`               | `60`                                 |
//! | `MAX_CONCURRENT_JOBS`      | `max_concurrent`      | `0` (unlimited)                      |
//! | `MAX_RESULT_CHARS`         | `max_result_chars`    | `1000` (`0` = no truncation)         |
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited
//! - `job_timeout = 0s` → no hard timeout
//! - `expected_completion = 0s` → watchdog disabled
//! - `publish_timeout = 0s` → wait for the transport indefinitely
//! - `max_result_chars = 0` → result sent untruncated

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_MODEL: &str = "default-model";
const DEFAULT_SESSION: &str = "scheduled_agent_session";
const DEFAULT_INPUT: &str = "Say hello and show current_time.";

/// Global configuration for the dispatcher runtime.
///
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Destination topic for completion notifications.
    pub notification_target: String,

    /// Backing model the agent should use. Passed through, never interpreted.
    pub model_identifier: String,

    /// Prefix for execution-context names (`<session_name>/<job_id>`).
    pub session_name: String,

    /// Input used when a request carries none.
    pub default_input: String,

    /// Hard ceiling for a single agent run (`0s` = none).
    pub job_timeout: Duration,

    /// Window after which a still-running job is reported as overdue (`0s` = off).
    pub expected_completion: Duration,

    /// Maximum wait for the transport's publish call (`0s` = unbounded).
    pub publish_timeout: Duration,

    /// Maximum wait for in-flight jobs during shutdown.
    pub grace: Duration,

    /// Maximum number of jobs running at once (`0` = unlimited).
    pub max_concurrent: usize,

    /// Characters of `result` kept in the notification envelope (`0` = no truncation).
    pub max_result_chars: usize,

    /// Event bus ring buffer size (min 1).
    pub bus_capacity: usize,
}

impl Config {
    /// Creates a config with defaults and the given notification target.
    pub fn new(notification_target: impl Into<String>) -> Self {
        Self {
            notification_target: notification_target.into(),
            model_identifier: DEFAULT_MODEL.to_string(),
            session_name: DEFAULT_SESSION.to_string(),
            default_input: DEFAULT_INPUT.to_string(),
            job_timeout: Duration::ZERO,
            expected_completion: Duration::ZERO,
            publish_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(60),
            max_concurrent: 0,
            max_result_chars: 1000,
            bus_capacity: 1024,
        }
    }

    /// Loads configuration from process environment variables.
    ///
    /// Fails with [`ConfigError::Missing`] when `NOTIFICATION_TARGET` is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as absent.
    ///
    /// # Example
    /// ```
    /// use jobvisor::Config;
    ///
    /// let cfg = Config::from_lookup(|key| match key {
    ///     "NOTIFICATION_TARGET" => Some("arn:topic:jobs".to_string()),
    ///     "MAX_CONCURRENT_JOBS" => Some("4".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(cfg.concurrency_limit(), Some(4));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let target = get("NOTIFICATION_TARGET").ok_or(ConfigError::Missing {
            key: "NOTIFICATION_TARGET",
        })?;
        let mut cfg = Config::new(target);

        if let Some(v) = get("MODEL_IDENTIFIER") {
            cfg.model_identifier = v;
        }
        if let Some(v) = get("SESSION_NAME") {
            cfg.session_name = v;
        }
        if let Some(v) = get("DEFAULT_INPUT") {
            cfg.default_input = v;
        }
        if let Some(v) = get("JOB_TIMEOUT_SECS") {
            cfg.job_timeout = Duration::from_secs(parse("JOB_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("EXPECTED_COMPLETION_SECS") {
            cfg.expected_completion = Duration::from_secs(parse("EXPECTED_COMPLETION_SECS", &v)?);
        }
        if let Some(v) = get("PUBLISH_TIMEOUT_SECS") {
            cfg.publish_timeout = Duration::from_secs(parse("PUBLISH_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("SHUTDOWN_GRACE_SECS") {
            cfg.grace = Duration::from_secs(parse("SHUTDOWN_GRACE_SECS", &v)?);
        }
        if let Some(v) = get("MAX_CONCURRENT_JOBS") {
            cfg.max_concurrent = parse("MAX_CONCURRENT_JOBS", &v)?;
        }
        if let Some(v) = get("MAX_RESULT_CHARS") {
            cfg.max_result_chars = parse("MAX_RESULT_CHARS", &v)?;
        }
        Ok(cfg)
    }

    /// Returns the concurrency limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the hard job timeout as an `Option`.
    #[inline]
    pub fn job_timeout(&self) -> Option<Duration> {
        non_zero(self.job_timeout)
    }

    /// Returns the watchdog window as an `Option`.
    #[inline]
    pub fn expected_completion(&self) -> Option<Duration> {
        non_zero(self.expected_completion)
    }

    /// Returns the publish timeout as an `Option`.
    #[inline]
    pub fn publish_timeout(&self) -> Option<Duration> {
        non_zero(self.publish_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO { None } else { Some(d) }
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        expected: "a non-negative integer",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_target_is_fatal() {
        let err = Config::from_lookup(lookup(&[("MODEL_IDENTIFIER", "m")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing { key: "NOTIFICATION_TARGET" });
    }

    #[test]
    fn blank_target_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[("NOTIFICATION_TARGET", "  ")])).unwrap_err();
        assert_eq!(err.as_label(), "config_missing");
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[("NOTIFICATION_TARGET", "topic")])).unwrap();
        assert_eq!(cfg.notification_target, "topic");
        assert_eq!(cfg.model_identifier, DEFAULT_MODEL);
        assert_eq!(cfg.session_name, DEFAULT_SESSION);
        assert_eq!(cfg.max_result_chars, 1000);
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.job_timeout(), None);
        assert_eq!(cfg.expected_completion(), None);
        assert_eq!(cfg.publish_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("NOTIFICATION_TARGET", "topic"),
            ("MODEL_IDENTIFIER", "big-model"),
            ("JOB_TIMEOUT_SECS", "7200"),
            ("EXPECTED_COMPLETION_SECS", "3600"),
            ("MAX_CONCURRENT_JOBS", "2"),
        ]))
        .unwrap();
        assert_eq!(cfg.model_identifier, "big-model");
        assert_eq!(cfg.job_timeout(), Some(Duration::from_secs(7200)));
        assert_eq!(cfg.expected_completion(), Some(Duration::from_secs(3600)));
        assert_eq!(cfg.concurrency_limit(), Some(2));
    }

    #[test]
    fn bad_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("NOTIFICATION_TARGET", "topic"),
            ("PUBLISH_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "PUBLISH_TIMEOUT_SECS", .. }
        ));
    }
}
