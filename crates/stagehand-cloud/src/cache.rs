//! Persisted record of what was last uploaded to a bucket.
//!
//! Stored as JSON:
//!
//! ```json
//! { "bucket": "www.example.com", "entries": { "index.html": "<sha256>" } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Remote key → content fingerprint of the last successful upload.
///
/// A cache belongs to exactly one bucket; loading it for another bucket
/// yields an empty cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishCache {
    bucket: String,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl PublishCache {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Read the cache at `path` for `bucket`.
    ///
    /// A missing file, an unreadable document or a cache written for a
    /// different bucket all produce an empty cache, so the next publish
    /// uploads everything.
    pub fn load(path: &Path, bucket: &str) -> Result<Self, CacheError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no publish cache yet");
                return Ok(Self::new(bucket));
            }
            Err(e) => {
                return Err(CacheError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let cache: Self = match serde_json::from_str(&content) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "publish cache is corrupt, starting fresh");
                return Ok(Self::new(bucket));
            }
        };

        if cache.bucket != bucket {
            tracing::warn!(
                path = %path.display(),
                cached = %cache.bucket,
                %bucket,
                "publish cache belongs to another bucket, starting fresh"
            );
            return Ok(Self::new(bucket));
        }

        Ok(cache)
    }

    /// Write the cache to `path` via a temporary file and rename.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self).map_err(CacheError::Serialize)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(|e| CacheError::Write {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, path).map_err(|e| CacheError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether `key` was last uploaded with exactly this fingerprint.
    pub fn is_current(&self, key: &str, fingerprint: &str) -> bool {
        self.get(key) == Some(fingerprint)
    }

    pub fn record(&mut self, key: impl Into<String>, fingerprint: impl Into<String>) {
        self.entries.insert(key.into(), fingerprint.into());
    }

    /// Keep only the keys accepted by `keep`. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| keep(key));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Full SHA-256 hex digest of `content`.
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read publish cache {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize publish cache")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write publish cache {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
