//! Configuration types for columnfetch

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for [`TransformClient`](crate::TransformClient)
///
/// All fields have sensible defaults except `endpoint`, which must point at
/// the transform service. The poll interval is explicit configuration passed
/// into the status poller at construction; there is no hidden process-wide
/// mutable state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the transform service (e.g. `http://localhost:5000/sx`)
    pub endpoint: String,

    /// Delay between consecutive status polls (default: 5s)
    ///
    /// Skipped entirely once the terminal status snapshot is seen.
    #[serde(default = "default_poll_interval", with = "duration_millis")]
    pub poll_interval: Duration,

    /// Staging directory for downloaded result files (default: "./staging")
    ///
    /// Each request gets its own subdirectory, and each object maps to a
    /// deterministic file name, so repeated runs do not collide.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Retry behavior for transient object store errors
    #[serde(default)]
    pub retry: RetryConfig,

    /// Optional overall deadline for a single request (None = unbounded)
    ///
    /// The status and download collaborators may hang; setting a deadline
    /// bounds the total time spent on one request.
    #[serde(default, with = "opt_duration_millis")]
    pub deadline: Option<Duration>,
}

impl Config {
    /// Create a configuration with the given service endpoint and defaults
    /// for everything else
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            poll_interval: default_poll_interval(),
            staging_dir: default_staging_dir(),
            retry: RetryConfig::default(),
            deadline: None,
        }
    }
}

/// Retry configuration for transient download and listing failures
///
/// Retries apply only to object store operations. Submit and status-query
/// errors are never retried; they fail the whole request immediately.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial try (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay before the first retry (default: 250ms)
    #[serde(default = "default_initial_delay", with = "duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound on the backoff delay (default: 10s)
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to retry delays to prevent thundering herd (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_true(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./staging")
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(250)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Serialize/deserialize a `Duration` as integer milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serialize/deserialize an `Option<Duration>` as integer milliseconds
mod opt_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis = Option::<u64>::deserialize(d)?;
        Ok(millis.map(Duration::from_millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("http://localhost:5000/sx");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.retry.jitter);
        assert!(config.deadline.is_none());
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: Config =
            serde_json::from_str(r#"{"endpoint": "http://localhost:5000/sx"}"#).unwrap();
        assert_eq!(config.endpoint, "http://localhost:5000/sx");
        assert_eq!(config.staging_dir, PathBuf::from("./staging"));
    }

    #[test]
    fn test_deserialize_poll_interval_millis() {
        let config: Config = serde_json::from_str(
            r#"{"endpoint": "http://x", "poll_interval": 10, "deadline": 60000}"#,
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.deadline, Some(Duration::from_secs(60)));
    }
}
