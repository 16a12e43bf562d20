//! Persistent export cache.
//!
//! Maps a fingerprint (`<key>_<day bucket>`) to the archive written for it so
//! a rerun on the same UTC day skips spaces that were already exported. The
//! map lives in `<output_dir>/export_cache.json` and is rewritten in full
//! after every commit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::export::constants::SECONDS_PER_DAY;

/// Errors raised while persisting the cache.
///
/// These never fail an export; callers log them and move on.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Writing or renaming the cache file failed.
    #[error("failed to write cache file {path}: {source}")]
    Io {
        /// Cache file or its temp sibling.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The map could not be serialized.
    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Fingerprint for `key` at `now`: `"{key}_{unix_secs / 86400}"`.
#[must_use]
pub fn fingerprint(key: &str, now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{key}_{}", secs / SECONDS_PER_DAY)
}

/// Fingerprint → artifact path map backed by a JSON file.
#[derive(Debug)]
pub struct ExportCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl ExportCache {
    /// Loads the cache from `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty cache; the
    /// corrupt case is logged as a warning.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    info!(path = %path.display(), entries = entries.len(), "loaded export cache");
                    entries
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "ignoring corrupt export cache");
                    BTreeMap::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no export cache yet");
                BTreeMap::new()
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "could not read export cache");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Creates an empty cache that will persist to `path`.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the artifact recorded for `fingerprint`, if any.
    pub async fn lookup(&self, fingerprint: &str) -> Option<PathBuf> {
        self.entries
            .lock()
            .await
            .get(fingerprint)
            .map(PathBuf::from)
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Records `artifact` for `fingerprint` and persists the whole map.
    ///
    /// The lock is held across insert and write so concurrent commits never
    /// lose each other's entries. A failed write leaves the in-memory entry in
    /// place and only logs a warning.
    pub async fn commit(&self, fingerprint: &str, artifact: &Path) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            fingerprint.to_string(),
            artifact.to_string_lossy().into_owned(),
        );
        if let Err(error) = persist(&self.path, &entries).await {
            warn!(fingerprint, error = %error, "failed to persist export cache");
        }
    }
}

async fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
    let json = serde_json::to_string_pretty(entries)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp, json)
        .await
        .map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
}
