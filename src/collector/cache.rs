//! Append-only batch store shared by every collector request.
//!
//! The in-memory list is authoritative; when a cache directory is configured
//! every append is written through to `<dir>/results.json` before it becomes
//! visible. One async mutex covers the whole read-append-write cycle, so
//! concurrent submissions are never lost.

use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::schema::{Batch, Summary};

const CACHE_FILE: &str = "results.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("cache file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode batches: {0}")]
    Encode(#[source] serde_json::Error),
}

/// How many batches to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Never expire anything.
    #[default]
    Unbounded,
    /// Drop the oldest batches beyond this count.
    KeepLast(NonZeroUsize),
}

pub struct BatchCache {
    batches: Mutex<Vec<Batch>>,
    file: Option<PathBuf>,
    retention: RetentionPolicy,
}

impl BatchCache {
    pub fn in_memory() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            file: None,
            retention: RetentionPolicy::Unbounded,
        }
    }

    /// Open (or create) a file-backed cache in `dir`.
    pub async fn open(dir: &Path) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(dir).await?;
        let file = dir.join(CACHE_FILE);
        let batches: Vec<Batch> = match tokio::fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                path: file.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %file.display(), batches = batches.len(), "opened result cache");
        Ok(Self {
            batches: Mutex::new(batches),
            file: Some(file),
            retention: RetentionPolicy::Unbounded,
        })
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Append one submission and return the number of stored batches.
    pub async fn append(&self, batch: Batch) -> Result<usize, CacheError> {
        let mut batches = self.batches.lock().await;

        let mut next = batches.clone();
        next.push(batch);
        if let RetentionPolicy::KeepLast(keep) = self.retention {
            let excess = next.len().saturating_sub(keep.get());
            next.drain(..excess);
        }

        if let Some(file) = &self.file {
            persist(file, &next).await?;
        }
        *batches = next;
        debug!(batches = batches.len(), "batch appended");
        Ok(batches.len())
    }

    pub async fn snapshot(&self) -> Vec<Batch> {
        self.batches.lock().await.clone()
    }

    pub async fn summary(&self) -> Summary {
        Summary::from_batches(&self.batches.lock().await)
    }
}

async fn persist(file: &Path, batches: &[Batch]) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec(batches).map_err(CacheError::Encode)?;
    let tmp = file.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, file).await?;
    Ok(())
}
