//! Durable recording of fetch results.
//!
//! Only `Success` and `EmptyResult` outcomes are persisted. Each key maps to
//! one `<sanitized key>_trends.json` file holding a [`TrendRecord`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use trendfetch_core::{record_file_name, FetchOutcome, RecordError, TrendRecord};

/// Errors from persisting an outcome.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Outcome is not persistable: {0}")]
    NotPersistable(String),

    #[error("Key '{0}' has no characters usable in a file name")]
    InvalidKey(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(String),
}

impl From<RecordError> for PersistError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotPersistable(kind) => PersistError::NotPersistable(kind),
            other => PersistError::Serialize(other.to_string()),
        }
    }
}

/// Acknowledgement of a durable write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistAck {
    /// Where the record landed (a path, or a `memory://` name)
    pub location: String,
}

/// Records fetch outcomes.
#[async_trait]
pub trait ResultPersister: Send + Sync {
    /// Persist the outcome for `key`. `Failure` outcomes are rejected.
    async fn persist(&self, key: &str, outcome: &FetchOutcome) -> Result<PersistAck, PersistError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Build the record and its file name, rejecting what cannot be persisted.
fn prepare(key: &str, outcome: &FetchOutcome) -> Result<(String, TrendRecord), PersistError> {
    let record = TrendRecord::from_outcome(key, outcome)?;
    let file_name =
        record_file_name(key).ok_or_else(|| PersistError::InvalidKey(key.to_string()))?;
    Ok((file_name, record))
}

/// Writes one pretty-printed JSON file per key into a directory.
///
/// Each write goes to a temporary file in the target directory and is
/// renamed over the destination, so readers see either the previous record
/// or the complete new one. The write runs on the blocking pool; a caller
/// that stops waiting does not interrupt it, and an unrenamed temp file is
/// removed when it is dropped.
#[derive(Debug)]
pub struct JsonFilePersister {
    dir: PathBuf,
}

impl JsonFilePersister {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path for `key`, if it sanitizes to a usable name.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        record_file_name(key).map(|name| self.dir.join(name))
    }
}

/// Write `contents` to a temp file in `dir` and rename it to `path`.
fn atomic_write(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), PersistError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| PersistError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    tmp.write_all(contents).map_err(|source| PersistError::Io {
        path: tmp.path().to_path_buf(),
        source,
    })?;

    // On failure the temp file comes back inside the error and is removed with it.
    tmp.persist(path).map_err(|err| PersistError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

#[async_trait]
impl ResultPersister for JsonFilePersister {
    async fn persist(&self, key: &str, outcome: &FetchOutcome) -> Result<PersistAck, PersistError> {
        let (file_name, record) = prepare(key, outcome)?;
        let json = record.to_json_pretty()?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(&file_name);
        let (dir, target) = (self.dir.clone(), path.clone());

        tokio::task::spawn_blocking(move || atomic_write(&dir, &target, json.as_bytes()))
            .await
            .map_err(|err| PersistError::Io {
                path: path.clone(),
                source: std::io::Error::other(err),
            })??;

        tracing::debug!(key, path = %path.display(), "Persisted record");
        Ok(PersistAck {
            location: path.display().to_string(),
        })
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

/// Keeps records in process memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryPersister {
    records: RwLock<BTreeMap<String, TrendRecord>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record stored under a file name, e.g. `"AI_trends.json"`.
    pub fn get(&self, file_name: &str) -> Option<TrendRecord> {
        self.records.read().get(file_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Stored file names in sorted order.
    pub fn file_names(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }
}

#[async_trait]
impl ResultPersister for MemoryPersister {
    async fn persist(&self, key: &str, outcome: &FetchOutcome) -> Result<PersistAck, PersistError> {
        let (file_name, record) = prepare(key, outcome)?;
        let location = format!("memory://{}", file_name);
        self.records.write().insert(file_name, record);
        Ok(PersistAck { location })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
