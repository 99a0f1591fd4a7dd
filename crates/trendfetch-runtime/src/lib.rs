//! # trendfetch-runtime
//!
//! Resilient fetching for trendfetch.
//!
//! This crate owns everything with side effects: transports that talk to
//! the upstream, the retry loop with backoff, persistence of results, and
//! the pipeline that drives a batch of keys.
//!
//! ## Guarantees
//!
//! - A fetch calls its transport at most `attempt_budget` times
//! - Only transient transport errors are retried
//! - Empty and malformed payloads are terminal on the attempt that saw them
//! - Records are written atomically; failures are never persisted
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trendfetch_runtime::{FetchRequest, FixtureTransport, ResilientFetcher};
//!
//! let transport = Arc::new(FixtureTransport::from_file("fixture.json")?);
//! let fetcher = ResilientFetcher::builder().transport(transport).build()?;
//!
//! let outcome = fetcher
//!     .fetch(&FetchRequest::new("Machine Learning").with_attempt_budget(3))
//!     .await?;
//! ```

pub mod config;
pub mod fetcher;
pub mod observer;
pub mod persist;
pub mod pipeline;
pub mod resilience;
pub mod transport;

pub use config::{BackoffSpec, ConfigError, FetchSection, OutputSection, RuntimeConfig, DEFAULT_OUTPUT_DIR};
pub use fetcher::{
    FetchError, FetchRequest, ResilientFetcher, ResilientFetcherBuilder, DEFAULT_ATTEMPT_BUDGET,
};
pub use observer::{FetchObserver, NoopObserver, TracingObserver};
pub use persist::{JsonFilePersister, MemoryPersister, PersistAck, PersistError, ResultPersister};
pub use pipeline::{FetchPipeline, PipelineSettings, DEFAULT_CONCURRENCY};
pub use resilience::BackoffPolicy;
pub use transport::{
    ApiCredential, FixtureTransport, Transport, TransportError, TransportFactory, TransportRegistry,
};

#[cfg(feature = "http")]
pub use transport::HttpTransport;
