//! Factory pattern for creating transports from configuration.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = TransportRegistry::with_defaults();
//! let transport = registry.create("fixture", &serde_json::json!({"path": "fixture.json"}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{Transport, TransportError};

/// Factory for creating transports from configuration.
///
/// Each factory validates its own configuration format and is addressed by
/// a unique type name (the `type` key of the config's `transport` section).
pub trait TransportFactory: Send + Sync {
    /// Unique identifier for this transport type, e.g. "http" or "fixture".
    fn transport_type(&self) -> &'static str;

    /// Create a transport from JSON configuration.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn Transport>, TransportError>;

    /// Check configuration before anything is opened or connected.
    fn validate_config(&self, config: &JsonValue) -> Result<(), TransportError>;
}

/// Registry of available transport factories.
#[derive(Default)]
pub struct TransportRegistry {
    factories: BTreeMap<String, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn TransportFactory>) {
        self.factories
            .insert(factory.transport_type().to_string(), factory);
    }

    /// Create a transport from type name and configuration.
    pub fn create(
        &self,
        transport_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self.factories
            .get(transport_type)
            .ok_or_else(|| {
                TransportError::NotConfigured(format!(
                    "Unknown transport type: '{}'. Available: {:?}",
                    transport_type,
                    self.available_types()
                ))
            })?
            .create(config)
    }

    /// Create a transport from a config section carrying its own `type` key.
    pub fn create_from_section(&self, section: &JsonValue) -> Result<Arc<dyn Transport>, TransportError> {
        let transport_type = section["type"].as_str().ok_or_else(|| {
            TransportError::NotConfigured("transport section has no 'type'".to_string())
        })?;
        self.create(transport_type, section)
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Create a registry with all built-in transports registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::FixtureTransportFactory));
        #[cfg(feature = "http")]
        registry.register(Arc::new(super::HttpTransportFactory));
        registry
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("transports", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticTransport {
        name: String,
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn fetch(&self, _key: &str) -> Result<JsonValue, TransportError> {
            Ok(serde_json::json!([]))
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct StaticTransportFactory;

    impl TransportFactory for StaticTransportFactory {
        fn transport_type(&self) -> &'static str {
            "static"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn Transport>, TransportError> {
            let name = config["name"].as_str().unwrap_or("static").to_string();
            Ok(Arc::new(StaticTransport { name }))
        }

        fn validate_config(&self, _config: &JsonValue) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = TransportRegistry::new();
        registry.register(Arc::new(StaticTransportFactory));

        assert_eq!(registry.available_types(), vec!["static"]);

        let transport = registry
            .create("static", &serde_json::json!({"name": "test-static"}))
            .unwrap();
        assert_eq!(transport.name(), "test-static");
    }

    #[test]
    fn test_registry_unknown_transport() {
        let registry = TransportRegistry::new();
        match registry.create("unknown", &serde_json::json!({})) {
            Err(TransportError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown transport type"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
    }

    #[test]
    fn test_create_from_section_requires_type() {
        let mut registry = TransportRegistry::new();
        registry.register(Arc::new(StaticTransportFactory));

        assert!(registry
            .create_from_section(&serde_json::json!({"type": "static"}))
            .is_ok());
        assert!(registry.create_from_section(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_defaults_include_fixture() {
        let registry = TransportRegistry::with_defaults();
        assert!(registry.available_types().contains(&"fixture"));
        assert!(registry
            .create("fixture", &serde_json::json!({"path": 3}))
            .is_err());
    }
}
