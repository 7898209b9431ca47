// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants;
use crate::endpoint::HecEndpoint;
use crate::errors::HecError;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which collector input the events are shaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    /// One JSON object per event, sent to `/services/collector/event`.
    #[default]
    Json,
    /// Opaque text lines, sent to `/services/collector/raw`.
    Raw,
}

impl FromStr for InputType {
    type Err = HecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "raw" => Ok(Self::Raw),
            other => Err(HecError::InvalidConfig(format!(
                "Invalid input type '{other}'. Must be one of: json, raw"
            ))),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// What `submit` does with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionMode {
    /// Accumulate into size-bounded batches; only rotations and flushes enqueue.
    #[default]
    Batched,
    /// Send each event as its own batch and wait until it has been delivered.
    Synchronous,
}

/// Retry policy for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Seconds. Retry `n` waits `backoff_factor * 2^(n - 1)`.
    pub backoff_factor: f64,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::MAX_RETRIES,
            backoff_factor: constants::BACKOFF_FACTOR,
            retryable_status_codes: constants::RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryConfig {
    /// Delay before the given retry (1-based), capped at
    /// [`constants::MAX_BACKOFF`].
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = (self.backoff_factor * 2_f64.powi(exponent))
            .min(constants::MAX_BACKOFF.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(constants::MAX_BACKOFF)
    }

    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// Configuration for the collector. Built once, never mutated after `start`.
#[derive(Debug, Clone)]
pub struct HecConfig {
    /// HEC token, sent as `Authorization: Splunk <token>`.
    pub token: String,
    pub endpoint: HecEndpoint,
    pub input_type: InputType,
    /// Value for the `host` field of JSON events. Local hostname when unset.
    pub host: Option<String>,
    pub verify_tls: bool,
    /// Drop falsy members of the `event` object before serializing.
    pub pop_null_fields: bool,
    pub max_batch_bytes: usize,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub retry: RetryConfig,
    pub request_timeout: Duration,
    pub https_proxy: Option<String>,
    pub submission_mode: SubmissionMode,
    pub log_level: String,
}

impl Default for HecConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            endpoint: HecEndpoint::default(),
            input_type: InputType::Json,
            host: None,
            verify_tls: false,
            pop_null_fields: false,
            max_batch_bytes: constants::MAX_BATCH_BYTES,
            worker_count: constants::WORKER_COUNT,
            queue_capacity: constants::WORKER_COUNT * constants::QUEUE_SLOTS_PER_WORKER,
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(constants::REQUEST_TIMEOUT_SECS),
            https_proxy: None,
            submission_mode: SubmissionMode::Batched,
            log_level: "info".to_string(),
        }
    }
}

impl HecConfig {
    #[must_use]
    pub fn new(token: impl Into<String>, endpoint: HecEndpoint) -> Self {
        Self {
            token: token.into(),
            endpoint,
            ..Default::default()
        }
    }

    /// Create configuration from `SPLUNK_HEC_*` environment variables
    pub fn from_env() -> Result<Self, HecError> {
        let defaults = Self::default();

        let token = env::var("SPLUNK_HEC_TOKEN").unwrap_or_default();
        let endpoint = HecEndpoint {
            server: env::var("SPLUNK_HEC_SERVER").unwrap_or_default(),
            port: parse_var("SPLUNK_HEC_PORT")?.unwrap_or(constants::DEFAULT_HEC_PORT),
            use_tls: bool_var("SPLUNK_HEC_SSL").unwrap_or(true),
            index: non_empty_var("SPLUNK_HEC_INDEX"),
            sourcetype: non_empty_var("SPLUNK_HEC_SOURCETYPE"),
            uri_override: non_empty_var("SPLUNK_HEC_URI"),
        };
        let input_type = match non_empty_var("SPLUNK_HEC_INPUT_TYPE") {
            Some(val) => val.parse()?,
            None => InputType::Json,
        };
        let submission_mode = if bool_var("SPLUNK_HEC_SYNCHRONOUS").unwrap_or(false) {
            SubmissionMode::Synchronous
        } else {
            SubmissionMode::Batched
        };

        let worker_count = parse_var("SPLUNK_HEC_WORKERS")?.unwrap_or(defaults.worker_count);
        let queue_capacity = parse_var("SPLUNK_HEC_QUEUE_CAPACITY")?
            .unwrap_or_else(|| worker_count.saturating_mul(constants::QUEUE_SLOTS_PER_WORKER));

        let retry = RetryConfig {
            max_retries: parse_var("SPLUNK_HEC_RETRIES")?.unwrap_or(constants::MAX_RETRIES),
            backoff_factor: parse_var("SPLUNK_HEC_BACKOFF_FACTOR")?
                .unwrap_or(constants::BACKOFF_FACTOR),
            ..RetryConfig::default()
        };

        let config = Self {
            token,
            endpoint,
            input_type,
            host: non_empty_var("SPLUNK_HEC_HOST"),
            verify_tls: bool_var("SPLUNK_HEC_VERIFY_TLS").unwrap_or(false),
            pop_null_fields: bool_var("SPLUNK_HEC_POP_NULL_FIELDS").unwrap_or(false),
            max_batch_bytes: parse_var("SPLUNK_HEC_MAX_BATCH_BYTES")?
                .unwrap_or(defaults.max_batch_bytes),
            worker_count,
            queue_capacity,
            retry,
            request_timeout: parse_var("SPLUNK_HEC_TIMEOUT_SECS")?
                .map_or(defaults.request_timeout, Duration::from_secs),
            https_proxy: env::var("SPLUNK_HEC_PROXY_HTTPS")
                .or_else(|_| env::var("HTTPS_PROXY"))
                .ok(),
            submission_mode,
            log_level: env::var("SPLUNK_HEC_LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), HecError> {
        if self.token.trim().is_empty() {
            return Err(HecError::InvalidConfig(
                "HEC token cannot be empty".to_string(),
            ));
        }

        match &self.endpoint.uri_override {
            Some(uri) => {
                if !(uri.starts_with("http://") || uri.starts_with("https://")) {
                    return Err(HecError::InvalidConfig(format!(
                        "Collector URI '{uri}' must start with http:// or https://"
                    )));
                }
            }
            None => {
                if self.endpoint.server.trim().is_empty() {
                    return Err(HecError::InvalidConfig(
                        "HEC server cannot be empty".to_string(),
                    ));
                }
                if self.endpoint.port == 0 {
                    return Err(HecError::InvalidConfig(
                        "HEC port must be greater than 0".to_string(),
                    ));
                }
            }
        }

        if self.worker_count == 0 {
            return Err(HecError::InvalidConfig(
                "worker_count must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(HecError::InvalidConfig(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.max_batch_bytes == 0 {
            return Err(HecError::InvalidConfig(
                "max_batch_bytes must be greater than 0".to_string(),
            ));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 0.0 {
            return Err(HecError::InvalidConfig(format!(
                "backoff_factor must be a non-negative number, got {}",
                self.retry.backoff_factor
            )));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(HecError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn bool_var(key: &str) -> Option<bool> {
    non_empty_var(key).map(|val| {
        let val = val.to_lowercase();
        val != "false" && val != "0" && val != "no"
    })
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, HecError> {
    match non_empty_var(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| HecError::InvalidConfig(format!("Invalid value for {key}: '{val}'"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: [&str; 20] = [
        "SPLUNK_HEC_TOKEN",
        "SPLUNK_HEC_SERVER",
        "SPLUNK_HEC_PORT",
        "SPLUNK_HEC_SSL",
        "SPLUNK_HEC_INDEX",
        "SPLUNK_HEC_SOURCETYPE",
        "SPLUNK_HEC_URI",
        "SPLUNK_HEC_INPUT_TYPE",
        "SPLUNK_HEC_SYNCHRONOUS",
        "SPLUNK_HEC_WORKERS",
        "SPLUNK_HEC_QUEUE_CAPACITY",
        "SPLUNK_HEC_RETRIES",
        "SPLUNK_HEC_BACKOFF_FACTOR",
        "SPLUNK_HEC_HOST",
        "SPLUNK_HEC_VERIFY_TLS",
        "SPLUNK_HEC_POP_NULL_FIELDS",
        "SPLUNK_HEC_MAX_BATCH_BYTES",
        "SPLUNK_HEC_TIMEOUT_SECS",
        "SPLUNK_HEC_PROXY_HTTPS",
        "SPLUNK_HEC_LOG_LEVEL",
    ];

    fn clear_env() {
        for key in ENV_VARS {
            env::remove_var(key);
        }
        env::remove_var("HTTPS_PROXY");
    }

    fn valid_config() -> HecConfig {
        HecConfig::new("token", HecEndpoint::new("localhost"))
    }

    #[test]
    fn test_default_queue_capacity_is_ten_per_worker() {
        let config = HecConfig::default();
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.max_batch_bytes, 100_000);
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_new_config_is_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_token() {
        let config = HecConfig::new("  ", HecEndpoint::new("localhost"));
        assert!(matches!(
            config.validate(),
            Err(HecError::InvalidConfig(msg)) if msg.contains("token")
        ));
    }

    #[test]
    fn test_validate_zero_workers() {
        let config = HecConfig {
            worker_count: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_queue_capacity() {
        let config = HecConfig {
            queue_capacity: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(HecError::InvalidConfig(msg)) if msg.contains("queue_capacity")
        ));
    }

    #[test]
    fn test_validate_bad_uri_override() {
        let config = HecConfig::new("token", HecEndpoint::from_uri("ftp://localhost"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_negative_backoff() {
        let mut config = valid_config();
        config.retry.backoff_factor = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let config = HecConfig {
            log_level: "verbose".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff(0), Duration::ZERO);
        assert_eq!(retry.backoff(1), Duration::from_secs_f64(0.3));
        assert_eq!(retry.backoff(2), Duration::from_secs_f64(0.6));
        assert_eq!(retry.backoff(3), Duration::from_secs_f64(1.2));
    }

    #[test]
    fn test_backoff_saturates_at_cap() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff(10), constants::MAX_BACKOFF);
        assert_eq!(retry.backoff(2_000), constants::MAX_BACKOFF);
        assert_eq!(retry.backoff(u32::MAX), constants::MAX_BACKOFF);
    }

    #[test]
    fn test_retryable_statuses() {
        let retry = RetryConfig::default();
        for status in [408, 500, 502, 503, 504] {
            assert!(retry.is_retryable(status));
        }
        for status in [200, 400, 401, 403, 404, 501] {
            assert!(!retry.is_retryable(status));
        }
    }

    #[test]
    fn test_input_type_parse() {
        assert_eq!("JSON".parse::<InputType>().unwrap(), InputType::Json);
        assert_eq!(" raw ".parse::<InputType>().unwrap(), InputType::Raw);
        assert!("xml".parse::<InputType>().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_requires_token() {
        clear_env();
        env::set_var("SPLUNK_HEC_SERVER", "localhost");
        let result = HecConfig::from_env();
        assert!(matches!(result, Err(HecError::InvalidConfig(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        env::set_var("SPLUNK_HEC_TOKEN", "abc");
        env::set_var("SPLUNK_HEC_SERVER", "splunk.local");
        let config = HecConfig::from_env().unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.endpoint.port, 8088);
        assert!(config.endpoint.use_tls);
        assert_eq!(config.input_type, InputType::Json);
        assert_eq!(config.submission_mode, SubmissionMode::Batched);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.retry, RetryConfig::default());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("SPLUNK_HEC_TOKEN", "abc");
        env::set_var("SPLUNK_HEC_URI", "http://127.0.0.1:9999/services/collector/raw");
        env::set_var("SPLUNK_HEC_INPUT_TYPE", "raw");
        env::set_var("SPLUNK_HEC_WORKERS", "4");
        env::set_var("SPLUNK_HEC_SSL", "false");
        env::set_var("SPLUNK_HEC_SYNCHRONOUS", "true");
        env::set_var("SPLUNK_HEC_BACKOFF_FACTOR", "0.01");
        env::set_var("HTTPS_PROXY", "http://proxy:3128");
        let config = HecConfig::from_env().unwrap();
        assert_eq!(config.input_type, InputType::Raw);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_capacity, 40);
        assert!(!config.endpoint.use_tls);
        assert_eq!(config.submission_mode, SubmissionMode::Synchronous);
        assert_eq!(config.retry.backoff_factor, 0.01);
        assert_eq!(config.https_proxy.as_deref(), Some("http://proxy:3128"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_number() {
        clear_env();
        env::set_var("SPLUNK_HEC_TOKEN", "abc");
        env::set_var("SPLUNK_HEC_SERVER", "localhost");
        env::set_var("SPLUNK_HEC_PORT", "not_a_port");
        let result = HecConfig::from_env();
        assert!(matches!(
            result,
            Err(HecError::InvalidConfig(msg)) if msg.contains("SPLUNK_HEC_PORT")
        ));
        clear_env();
    }
}
