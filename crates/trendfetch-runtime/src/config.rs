//! Run configuration loaded from YAML.
//!
//! ## Format
//!
//! ```yaml
//! topics: ["Python Programming", "Machine Learning"]
//! fetch:
//!   attempt_budget: 3
//!   backoff: { strategy: exponential, initial: "1s", factor: 2.0, max_delay: "60s" }
//!   deadline: "2m"
//!   concurrency: 4
//! transport:
//!   type: http
//!   base_url: "https://trends.example.com/api/interest"
//! output:
//!   dir: "trends"
//! ```
//!
//! Every section is optional. Durations use humantime syntax ("500ms", "2m").

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetcher::DEFAULT_ATTEMPT_BUDGET;
use crate::pipeline::{PipelineSettings, DEFAULT_CONCURRENCY};
use crate::resilience::{BackoffPolicy, DEFAULT_FACTOR, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY};

/// Directory records are written to unless configured otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "trends";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Keys to fetch when none are given on the command line
    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub fetch: FetchSection,

    /// Passed verbatim to the transport registry; must carry a `type`
    #[serde(default)]
    pub transport: Option<JsonValue>,

    #[serde(default)]
    pub output: OutputSection,
}

/// Retry and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchSection {
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: u32,

    #[serde(default)]
    pub backoff: BackoffSpec,

    #[serde(default, with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_attempt_budget() -> u32 {
    DEFAULT_ATTEMPT_BUDGET
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
            backoff: BackoffSpec::default(),
            deadline: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Serializable description of a [`BackoffPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffSpec {
    Exponential {
        #[serde(default = "default_initial", with = "humantime_serde")]
        initial: Duration,

        #[serde(default = "default_factor")]
        factor: f32,

        #[serde(default = "default_max_delay", with = "humantime_serde")]
        max_delay: Duration,
    },
    Constant {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    Immediate,
}

fn default_initial() -> Duration {
    DEFAULT_INITIAL_DELAY
}

fn default_factor() -> f32 {
    DEFAULT_FACTOR
}

fn default_max_delay() -> Duration {
    DEFAULT_MAX_DELAY
}

impl Default for BackoffSpec {
    fn default() -> Self {
        BackoffSpec::Exponential {
            initial: DEFAULT_INITIAL_DELAY,
            factor: DEFAULT_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffSpec {
    pub fn to_policy(&self) -> BackoffPolicy {
        match self {
            BackoffSpec::Exponential {
                initial,
                factor,
                max_delay,
            } => BackoffPolicy::Exponential {
                initial: *initial,
                factor: *factor,
                max_delay: *max_delay,
            },
            BackoffSpec::Constant { delay } => BackoffPolicy::Constant(*delay),
            BackoffSpec::Immediate => BackoffPolicy::Immediate,
        }
    }
}

/// Where records go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

mod humantime_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => humantime::parse_duration(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Reject settings the fetcher or pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.attempt_budget == 0 {
            return Err(ConfigError::Invalid(
                "fetch.attempt_budget must be at least 1".to_string(),
            ));
        }
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "fetch.concurrency must be at least 1".to_string(),
            ));
        }
        if let BackoffSpec::Exponential { factor, .. } = &self.fetch.backoff {
            if !factor.is_finite() || *factor < 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "fetch.backoff.factor must be a finite number >= 1.0, got {}",
                    factor
                )));
            }
        }
        if let Some(transport) = &self.transport {
            if !transport["type"].is_string() {
                return Err(ConfigError::Invalid(
                    "transport section requires a string 'type'".to_string(),
                ));
            }
        }
        if self.topics.iter().any(|t| t.trim().is_empty()) {
            tracing::warn!("Configuration lists a blank topic; it will be rejected at fetch time");
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            attempt_budget: self.fetch.attempt_budget,
            backoff: self.fetch.backoff.to_policy(),
            concurrency: self.fetch.concurrency,
            deadline: self.fetch.deadline,
        }
    }
}
