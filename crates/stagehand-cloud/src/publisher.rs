use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use stagehand_core::DeployConfig;

use crate::aws::AwsError;
use crate::cache::{self, CacheError, PublishCache};
use crate::client::AwsClient;
use crate::executor::{AwsExecutor, RealExecutor};

/// Base delay between upload attempts; grows linearly with the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Publisher settings taken from `[deploy]`.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    /// Publish cache location, already resolved against the project root
    pub cache_path: PathBuf,
    pub cache_control: String,
    pub concurrency: usize,
    pub retries: u32,
    pub index_root_path: bool,
}

impl PublishSettings {
    pub fn from_config(config: &DeployConfig, project_dir: &Path) -> Self {
        Self {
            cache_path: project_dir.join(&config.cache_file),
            cache_control: config.cache_control.clone(),
            concurrency: config.concurrency.max(1),
            retries: config.retries,
            index_root_path: config.index_root_path,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Upload every file regardless of the publish cache
    pub force: bool,
}

/// A file whose upload failed after all attempts.
#[derive(Debug)]
pub struct UploadFailure {
    pub key: String,
    pub error: UploadError,
}

#[derive(Debug)]
pub enum InvalidationStatus {
    /// Nothing was uploaded
    NotNeeded,
    Submitted { id: String, paths: Vec<String> },
    Failed {
        paths: Vec<String>,
        error: InvalidationError,
    },
}

/// Outcome of one publish run. Keys are sorted.
#[derive(Debug)]
pub struct PublishReport {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<UploadFailure>,
    pub invalidation: InvalidationStatus,
}

impl PublishReport {
    /// Every file is at the origin (the invalidation outcome is not considered).
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Candidate {
    key: String,
    path: PathBuf,
    fingerprint: String,
}

/// Uploads the output directory to the bucket and invalidates changed paths.
pub struct Publisher<E: AwsExecutor = RealExecutor> {
    client: AwsClient<E>,
    out_dir: PathBuf,
    settings: PublishSettings,
}

impl<E: AwsExecutor> Publisher<E> {
    pub fn new(client: AwsClient<E>, out_dir: &Path, settings: PublishSettings) -> Self {
        Self {
            client,
            out_dir: out_dir.to_path_buf(),
            settings,
        }
    }

    pub fn client(&self) -> &AwsClient<E> {
        &self.client
    }

    /// Upload every new or changed file, then request one CDN invalidation
    /// covering exactly the uploaded paths.
    ///
    /// Per-file upload failures and a failed invalidation are reported in the
    /// returned [`PublishReport`]; only problems with the output directory or
    /// the publish cache abort the run.
    pub async fn publish(&self, options: PublishOptions) -> Result<PublishReport, PublishError> {
        let files = self.list_output()?;
        let bucket = &self.client.target().bucket;
        let mut cache = PublishCache::load(&self.settings.cache_path, bucket)?;
        let live: BTreeSet<String> = files.iter().map(|(key, _)| key.clone()).collect();

        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        let mut candidates = Vec::new();

        for (key, path) in files {
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "cannot read file for upload");
                    failed.push(UploadFailure {
                        key,
                        error: UploadError::Read { path, source: e },
                    });
                    continue;
                }
            };
            let fingerprint = cache::fingerprint(&content);

            if !options.force && cache.is_current(&key, &fingerprint) {
                tracing::debug!(%key, "unchanged, skipping");
                skipped.push(key);
                continue;
            }
            candidates.push(Candidate {
                key,
                path,
                fingerprint,
            });
        }

        tracing::info!(
            upload = candidates.len(),
            skip = skipped.len(),
            force = options.force,
            %bucket,
            "publishing"
        );

        let results: Vec<(Candidate, Result<(), UploadError>)> = stream::iter(candidates)
            .map(|candidate| async move {
                let result = self.upload(&candidate).await;
                (candidate, result)
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut uploaded = Vec::new();
        for (candidate, result) in results {
            match result {
                Ok(()) => {
                    cache.record(candidate.key.clone(), candidate.fingerprint);
                    uploaded.push(candidate.key);
                }
                Err(error) => {
                    tracing::warn!(key = %candidate.key, %error, "upload failed");
                    failed.push(UploadFailure {
                        key: candidate.key,
                        error,
                    });
                }
            }
        }
        uploaded.sort();
        skipped.sort();
        failed.sort_by(|a, b| a.key.cmp(&b.key));

        let pruned = cache.retain(|key| live.contains(key));
        if pruned > 0 {
            tracing::debug!(pruned, "dropped cache entries for files no longer in the output");
        }

        // Saved before invalidating: an unsaved cache re-uploads and
        // re-invalidates these files on the next run.
        cache.save(&self.settings.cache_path)?;

        let invalidation = self.invalidate(&uploaded).await;

        Ok(PublishReport {
            uploaded,
            skipped,
            failed,
            invalidation,
        })
    }

    async fn upload(&self, candidate: &Candidate) -> Result<(), UploadError> {
        let content_type = mime_guess::from_path(&candidate.path)
            .first_or_octet_stream()
            .to_string();
        let attempts = self.settings.retries.saturating_add(1);

        let mut attempt = 1;
        loop {
            let result = self
                .client
                .put_object(
                    &candidate.key,
                    &candidate.path,
                    &self.settings.cache_control,
                    &content_type,
                )
                .await;

            match result {
                Ok(()) => {
                    tracing::debug!(key = %candidate.key, %content_type, attempt, "uploaded");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(key = %candidate.key, attempt, error = %e, "upload attempt failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(UploadError::Aws {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }

    async fn invalidate(&self, uploaded: &[String]) -> InvalidationStatus {
        let paths = invalidation_paths(uploaded, self.settings.index_root_path);
        if paths.is_empty() {
            tracing::info!("nothing uploaded, skipping CDN invalidation");
            return InvalidationStatus::NotNeeded;
        }

        match self.client.create_invalidation(&paths).await {
            Ok(id) => {
                tracing::info!(%id, paths = paths.len(), "CDN invalidation submitted");
                InvalidationStatus::Submitted { id, paths }
            }
            Err(e) => {
                let error = InvalidationError {
                    distribution: self.client.target().distribution.clone(),
                    source: e,
                };
                tracing::warn!(%error, "CDN invalidation failed");
                InvalidationStatus::Failed { paths, error }
            }
        }
    }

    /// `(object key, absolute path)` for every file under the output directory.
    fn list_output(&self) -> Result<Vec<(String, PathBuf)>, PublishError> {
        if !self.out_dir.is_dir() {
            return Err(PublishError::MissingOutput(self.out_dir.clone()));
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.out_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| PublishError::Scan {
                path: self.out_dir.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.out_dir) {
                files.push((object_key(relative), entry.path().to_path_buf()));
            }
        }
        Ok(files)
    }
}

/// Relative path with `/` separators.
fn object_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// CDN paths for the uploaded keys, sorted and deduplicated.
///
/// With `index_root_path`, an `index.html` also invalidates its directory
/// (`docs/index.html` → `/docs/`).
pub fn invalidation_paths(uploaded: &[String], index_root_path: bool) -> Vec<String> {
    let mut paths: Vec<String> = uploaded.iter().map(|key| format!("/{key}")).collect();
    if index_root_path {
        for key in uploaded {
            if key == "index.html" {
                paths.push("/".to_owned());
            } else if let Some(dir) = key.strip_suffix("/index.html") {
                paths.push(format!("/{dir}/"));
            }
        }
    }
    paths.sort();
    paths.dedup();
    paths
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("upload failed after {attempts} attempt(s)")]
    Aws { attempts: u32, source: AwsError },
}

#[derive(Debug, thiserror::Error)]
#[error("CDN invalidation for distribution {distribution} failed")]
pub struct InvalidationError {
    pub distribution: String,
    pub source: AwsError,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("output directory {0} does not exist; run a build first")]
    MissingOutput(PathBuf),
    #[error("failed to scan output directory {path}")]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}
