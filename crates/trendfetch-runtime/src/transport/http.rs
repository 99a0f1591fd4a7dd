//! HTTP transport for a trends-style JSON endpoint.
//!
//! Issues `GET <base_url>?q=<key>&geo=..&timeframe=..&cat=..` and returns the
//! response body (or the part of it addressed by `payload_pointer`).
//!
//! ## Security
//!
//! The optional bearer token is held in an [`ApiCredential`] and exposed
//! only when building the request.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

use super::{
    factory::TransportFactory,
    secrets::ApiCredential,
    Transport, TransportError,
};

/// Environment variable holding the upstream API key.
pub const HTTP_API_KEY_ENV: &str = "TRENDFETCH_API_KEY";

const DEFAULT_GEO: &str = "IN";
const DEFAULT_TIMEFRAME: &str = "now 1-d";
const DEFAULT_CATEGORY: u32 = 0;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP upstream transport.
pub struct HttpTransport {
    base_url: String,
    credential: Option<ApiCredential>,
    client: reqwest::Client,
    geo: String,
    timeframe: String,
    category: u32,
    payload_pointer: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .field("geo", &self.geo)
            .field("timeframe", &self.timeframe)
            .field("category", &self.category)
            .field("payload_pointer", &self.payload_pointer)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport for `base_url` with default query parameters.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::NotConfigured(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            credential: None,
            client,
            geo: DEFAULT_GEO.to_string(),
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            category: DEFAULT_CATEGORY,
            payload_pointer: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Create from JSON configuration with environment fallback for the key.
    pub fn from_config(config: &JsonValue) -> Result<Self, TransportError> {
        let base_url = config["base_url"].as_str().ok_or_else(|| {
            TransportError::NotConfigured("http transport requires 'base_url'".to_string())
        })?;

        let mut transport = Self::new(base_url)?;
        transport.credential =
            ApiCredential::optional_from_config_or_env(config, "api_key", HTTP_API_KEY_ENV);

        if let Some(geo) = config["geo"].as_str() {
            transport.geo = geo.to_string();
        }
        if let Some(timeframe) = config["timeframe"].as_str() {
            transport.timeframe = timeframe.to_string();
        }
        if let Some(category) = config["category"].as_u64() {
            transport.category = u32::try_from(category).map_err(|_| {
                TransportError::NotConfigured(format!("category out of range: {}", category))
            })?;
        }
        if let Some(pointer) = config["payload_pointer"].as_str() {
            transport.payload_pointer = Some(pointer.to_string());
        }
        if let Some(timeout) = config["timeout"].as_str() {
            transport.timeout = humantime::parse_duration(timeout).map_err(|e| {
                TransportError::NotConfigured(format!("invalid timeout '{}': {}", timeout, e))
            })?;
        }

        Ok(transport)
    }

    pub fn with_credential(mut self, credential: ApiCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = geo.into();
        self
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = timeframe.into();
        self
    }

    /// Extract the payload from an envelope with a JSON pointer (e.g. "/data").
    pub fn with_payload_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.payload_pointer = Some(pointer.into());
        self
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Map a non-success HTTP status to a transport error.
fn classify_status(status: u16, body: &str) -> TransportError {
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, truncate(body, 200))
    };

    match status {
        408 | 429 | 500..=599 => TransportError::Transient(message),
        _ => TransportError::Fatal(message),
    }
}

fn classify_request_error(error: &reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::Fatal(format!("invalid request: {}", error))
    } else {
        TransportError::Transient(error.to_string())
    }
}

/// Pick the payload out of the response body.
///
/// A pointer that addresses nothing yields an empty payload.
fn extract_payload(body: JsonValue, pointer: Option<&str>) -> JsonValue {
    match pointer {
        Some(pointer) => body.pointer(pointer).cloned().unwrap_or(JsonValue::Null),
        None => body,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, key: &str) -> Result<JsonValue, TransportError> {
        let category = self.category.to_string();
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", key),
                ("geo", self.geo.as_str()),
                ("timeframe", self.timeframe.as_str()),
                ("cat", category.as_str()),
            ])
            .timeout(self.timeout);

        // SECURITY: Only expose the credential here, at the point of use
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        // A body cut off mid-read is a network failure; only bad JSON is fatal.
        let bytes = response.bytes().await.map_err(|e| {
            TransportError::Transient(format!("failed to read response body: {}", e))
        })?;
        let body: JsonValue = serde_json::from_slice(&bytes).map_err(|e| {
            TransportError::Fatal(format!("undecodable response body: {}", e))
        })?;

        Ok(extract_payload(body, self.payload_pointer.as_deref()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Factory for HTTP transports.
///
/// ## Configuration Format
/// ```json
/// {
///   "type": "http",
///   "base_url": "https://trends.example.com/api/interest",
///   "api_key": "...",            // Optional, falls back to TRENDFETCH_API_KEY env
///   "geo": "IN",                 // Optional
///   "timeframe": "now 1-d",      // Optional
///   "category": 0,               // Optional
///   "payload_pointer": "/data",  // Optional
///   "timeout": "30s"             // Optional, humantime
/// }
/// ```
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn transport_type(&self) -> &'static str {
        "http"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn Transport>, TransportError> {
        self.validate_config(config)?;
        Ok(Arc::new(HttpTransport::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), TransportError> {
        let url = config["base_url"].as_str().ok_or_else(|| {
            TransportError::NotConfigured("http transport requires 'base_url'".to_string())
        })?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TransportError::NotConfigured(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        if let Some(pointer) = config["payload_pointer"].as_str() {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(TransportError::NotConfigured(
                    "payload_pointer must be empty or start with '/'".to_string(),
                ));
            }
        }

        Ok(())
    }
}
