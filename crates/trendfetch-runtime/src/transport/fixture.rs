//! Offline transport serving canned payloads.
//!
//! ## Fixture Format
//! ```json
//! {
//!   "topics": {
//!     "Machine Learning": [{"date": "2024-01-01", "value": 10}]
//!   },
//!   "failures": {
//!     "Flaky Topic": {"kind": "transient", "message": "503", "times": 2},
//!     "Locked Topic": {"kind": "fatal", "message": "bad auth"}
//!   }
//! }
//! ```
//!
//! A failure with `times: n` fires on the first `n` calls for its key and
//! then the topic's payload is served; without `times` it always fires.
//! Unknown keys get an empty payload.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use super::{Transport, TransportError, TransportFactory};

/// Canned upstream behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureSpec {
    /// Raw payload served per key
    #[serde(default)]
    pub topics: BTreeMap<String, JsonValue>,

    /// Scripted failures per key
    #[serde(default)]
    pub failures: BTreeMap<String, FixtureFailure>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FixtureFailureKind {
    Transient,
    Fatal,
}

/// A scripted failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureFailure {
    pub kind: FixtureFailureKind,

    #[serde(default = "default_failure_message")]
    pub message: String,

    /// Number of leading calls that fail; `None` fails forever
    #[serde(default)]
    pub times: Option<u32>,
}

fn default_failure_message() -> String {
    "scripted failure".to_string()
}

impl FixtureFailure {
    fn to_error(&self) -> TransportError {
        match self.kind {
            FixtureFailureKind::Transient => TransportError::Transient(self.message.clone()),
            FixtureFailureKind::Fatal => TransportError::Fatal(self.message.clone()),
        }
    }
}

/// Transport backed by a [`FixtureSpec`].
#[derive(Debug)]
pub struct FixtureTransport {
    spec: FixtureSpec,
    calls: Mutex<HashMap<String, u32>>,
}

impl FixtureTransport {
    pub fn new(spec: FixtureSpec) -> Self {
        Self {
            spec,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Parse a fixture from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        let spec: FixtureSpec = serde_json::from_str(json)
            .map_err(|e| TransportError::NotConfigured(format!("invalid fixture: {}", e)))?;
        Ok(Self::new(spec))
    }

    /// Load a fixture from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TransportError::NotConfigured(format!(
                "failed to read fixture {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }

    /// How many times `key` has been fetched.
    pub fn calls(&self, key: &str) -> u32 {
        self.calls.lock().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn fetch(&self, key: &str) -> Result<JsonValue, TransportError> {
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(key.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(failure) = self.spec.failures.get(key) {
            let fires = failure.times.map_or(true, |times| call <= times);
            if fires {
                return Err(failure.to_error());
            }
        }

        Ok(self
            .spec
            .topics
            .get(key)
            .cloned()
            .unwrap_or_else(|| JsonValue::Array(Vec::new())))
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Factory for fixture transports.
///
/// ## Configuration Format
/// ```json
/// { "type": "fixture", "path": "fixtures/trends.json" }
/// ```
/// or the fixture inline:
/// ```json
/// { "type": "fixture", "topics": {...}, "failures": {...} }
/// ```
pub struct FixtureTransportFactory;

impl TransportFactory for FixtureTransportFactory {
    fn transport_type(&self) -> &'static str {
        "fixture"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn Transport>, TransportError> {
        self.validate_config(config)?;

        let transport = match config["path"].as_str() {
            Some(path) => FixtureTransport::from_file(path)?,
            None => {
                let spec: FixtureSpec = serde_json::from_value(config.clone()).map_err(|e| {
                    TransportError::NotConfigured(format!("invalid inline fixture: {}", e))
                })?;
                FixtureTransport::new(spec)
            }
        };

        Ok(Arc::new(transport))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), TransportError> {
        if !config["path"].is_null() && !config["path"].is_string() {
            return Err(TransportError::NotConfigured(
                "fixture 'path' must be a string".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIXTURE: &str = r#"{
        "topics": {
            "AI": [{"date": "2024-01-01", "value": 10}],
            "Flaky": [{"date": "2024-01-01", "value": 3}]
        },
        "failures": {
            "Flaky": {"kind": "transient", "message": "503", "times": 2},
            "Locked": {"kind": "fatal", "message": "bad auth"}
        }
    }"#;

    #[tokio::test]
    async fn test_serves_topic_payload() {
        let transport = FixtureTransport::from_json(FIXTURE).unwrap();
        let payload = transport.fetch("AI").await.unwrap();
        assert_eq!(payload, json!([{"date": "2024-01-01", "value": 10}]));
        assert_eq!(transport.calls("AI"), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_empty() {
        let transport = FixtureTransport::from_json(FIXTURE).unwrap();
        assert_eq!(transport.fetch("Nothing").await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_limited_failure_then_payload() {
        let transport = FixtureTransport::from_json(FIXTURE).unwrap();
        assert_eq!(
            transport.fetch("Flaky").await,
            Err(TransportError::Transient("503".to_string()))
        );
        assert!(transport.fetch("Flaky").await.is_err());
        assert!(transport.fetch("Flaky").await.is_ok());
        assert_eq!(transport.calls("Flaky"), 3);
    }

    #[tokio::test]
    async fn test_unlimited_failure() {
        let transport = FixtureTransport::from_json(FIXTURE).unwrap();
        for _ in 0..5 {
            assert_eq!(
                transport.fetch("Locked").await,
                Err(TransportError::Fatal("bad auth".to_string()))
            );
        }
    }

    #[test]
    fn test_factory_inline_and_file() {
        let factory = FixtureTransportFactory;
        assert_eq!(factory.transport_type(), "fixture");

        let inline = json!({"type": "fixture", "topics": {"AI": []}});
        assert!(factory.create(&inline).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        std::fs::write(&path, FIXTURE).unwrap();
        let from_file = json!({"type": "fixture", "path": path.to_str().unwrap()});
        assert_eq!(factory.create(&from_file).unwrap().name(), "fixture");
    }

    #[test]
    fn test_factory_missing_file() {
        let factory = FixtureTransportFactory;
        let config = json!({"path": "/nonexistent/trendfetch/fixture.json"});
        assert!(matches!(
            factory.create(&config),
            Err(TransportError::NotConfigured(_))
        ));
        assert!(factory.validate_config(&json!({"path": 3})).is_err());
    }
}
