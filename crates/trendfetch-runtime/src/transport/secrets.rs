//! Upstream API keys.
//!
//! An [`ApiCredential`] never prints its value: `Debug` and `Display` are
//! redacted and the only way to read the key is [`ApiCredential::expose`].

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

/// Where a credential came from. Logged instead of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "programmatic",
        }
    }
}

/// A bearer token for the upstream.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
        }
    }

    /// Read `config[config_key]`, else the `env_var` environment variable.
    ///
    /// Blank values count as unset; anonymous upstreams need no key.
    pub fn optional_from_config_or_env(config: &JsonValue, config_key: &str, env_var: &str) -> Option<Self> {
        if let Some(value) = config[config_key].as_str().filter(|v| !v.trim().is_empty()) {
            return Some(Self::new(value, CredentialSource::Config));
        }

        let from_env = std::env::var(env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(v, CredentialSource::Environment));

        if from_env.is_some() {
            tracing::debug!(env_var, "Using upstream API key from environment");
        }
        from_env
    }

    /// The raw key. Call only while building a request.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("source", &self.source.as_str())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<api key from {}>", self.source.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "tf-super-secret-key-12345";
    const UNSET: &str = "TRENDFETCH_TEST_UNSET_VARIABLE";

    #[test]
    fn test_formatting_never_shows_value() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Config);
        assert!(!format!("{:?}", cred).contains(SECRET));
        assert_eq!(cred.to_string(), "<api key from config>");
        assert_eq!(cred.expose(), SECRET);
    }

    #[test]
    fn test_config_value_is_used() {
        let config = serde_json::json!({"api_key": "from-config"});
        let cred = ApiCredential::optional_from_config_or_env(&config, "api_key", UNSET).unwrap();
        assert_eq!(cred.expose(), "from-config");
        assert_eq!(cred.source(), CredentialSource::Config);
    }

    #[test]
    fn test_blank_or_missing_is_none() {
        let blank = serde_json::json!({"api_key": "  "});
        assert!(ApiCredential::optional_from_config_or_env(&blank, "api_key", UNSET).is_none());
        assert!(ApiCredential::optional_from_config_or_env(&serde_json::json!({}), "api_key", UNSET).is_none());
    }
}
