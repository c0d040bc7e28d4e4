//! Single-artifact fetch with validation and race-safe publish.
//!
//! Lifecycle of one canonical path:
//!
//! ```text
//! absent ─► downloading ({artifact}.{uuid}.tmp) ─► validated ─► published (rename)
//!                                                                   │
//!                          evicted on failed validation ◄───────────┘
//! ```
//!
//! Evict and publish run under the path lock; network transfers never do.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use forecast_common::{BoundingBox, Catalog, ModelRun, VariableConfig};
use grib_reader::DatasetReader;
use storage::{temp_sibling, CacheLayout, PathLock};
use tracing::{debug, error, info, instrument, warn};

use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::source::{artifact_url, ArtifactSource};

/// Default minimum plausible artifact size.
pub const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 1000;

/// Limits applied to every fetch.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub min_artifact_bytes: u64,
    pub retry: RetryPolicy,
    /// Hard bound on one download attempt.
    pub download_timeout: Duration,
    /// Subregion requested from upstream.
    pub download_bbox: BoundingBox,
}

/// Downloads one (model, variable, run, hour) artifact into the cache.
pub struct ArtifactFetcher {
    source: Arc<dyn ArtifactSource>,
    reader: Arc<dyn DatasetReader>,
    layout: CacheLayout,
    catalog: Arc<Catalog>,
    settings: FetchSettings,
}

impl ArtifactFetcher {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        reader: Arc<dyn DatasetReader>,
        layout: CacheLayout,
        catalog: Arc<Catalog>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            source,
            reader,
            layout,
            catalog,
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Canonical cache path of an artifact.
    pub fn artifact_path(
        &self,
        model_id: &str,
        variable_id: &str,
        run: &ModelRun,
        forecast_hour: u32,
    ) -> Result<PathBuf, FetchError> {
        let model = self.catalog.model(model_id)?;
        Ok(self
            .layout
            .artifact_path(&model.source, model_id, &run.run_id(), variable_id, forecast_hour))
    }

    /// Return the cached artifact if it validates, otherwise download it.
    ///
    /// A cached file that fails validation is evicted. Each download attempt
    /// writes a private temp file, checks its size, validates it and then
    /// publishes it by rename under the path lock. When another fetcher has
    /// already published a valid artifact the local copy is discarded.
    #[instrument(
        skip(self, run),
        fields(model = %model_id, variable = %variable_id, run = %run.run_id(), hour = forecast_hour)
    )]
    pub async fn fetch_artifact(
        &self,
        model_id: &str,
        variable_id: &str,
        run: &ModelRun,
        forecast_hour: u32,
    ) -> Result<PathBuf, FetchError> {
        let model = self.catalog.model(model_id)?;
        let variable = self.catalog.variable(variable_id)?;
        let final_path = self
            .layout
            .artifact_path(&model.source, model_id, &run.run_id(), variable_id, forecast_hour);

        if self.check_cached(&final_path, variable).await? {
            info!(path = %final_path.display(), "Cache hit");
            return Ok(final_path);
        }

        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        let url = artifact_url(model, variable, run, forecast_hour, &self.settings.download_bbox);
        let (url_ref, path_ref) = (url.as_str(), final_path.as_path());
        let result = self
            .settings
            .retry
            .run("download", move |_attempt| self.attempt(url_ref, path_ref, variable))
            .await;

        match result {
            Ok(path) => Ok(path),
            Err(exhausted) => {
                error!(
                    path = %final_path.display(),
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "Download exhausted"
                );
                Err(FetchError::DownloadExhausted {
                    path: final_path,
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error.to_string(),
                })
            }
        }
    }

    /// One download attempt; the temp file never outlives a failure.
    async fn attempt(&self, url: &str, final_path: &Path, variable: &VariableConfig) -> Result<PathBuf, FetchError> {
        let tmp = temp_sibling(final_path);
        let outcome = self.download_and_publish(url, &tmp, final_path, variable).await;
        if outcome.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        outcome
    }

    async fn download_and_publish(
        &self,
        url: &str,
        tmp: &Path,
        final_path: &Path,
        variable: &VariableConfig,
    ) -> Result<PathBuf, FetchError> {
        match tokio::time::timeout(self.settings.download_timeout, self.source.download_to(url, tmp)).await {
            Ok(result) => {
                result?;
            }
            Err(_) => return Err(FetchError::transient(url, "download timed out")),
        }

        let size = tokio::fs::metadata(tmp)
            .await
            .map_err(|e| FetchError::io(tmp, e))?
            .len();
        if size < self.settings.min_artifact_bytes {
            return Err(FetchError::TooSmall {
                path: tmp.to_path_buf(),
                size,
                min: self.settings.min_artifact_bytes,
            });
        }

        self.validate(tmp, variable).await?;
        self.publish(tmp, final_path, variable).await
    }

    async fn validate(&self, path: &Path, variable: &VariableConfig) -> Result<(), FetchError> {
        let reader = self.reader.clone();
        let path = path.to_path_buf();
        let variable = variable.clone();
        blocking(move || validate_artifact(reader.as_ref(), &path, &variable)).await?
    }

    async fn publish(&self, tmp: &Path, final_path: &Path, variable: &VariableConfig) -> Result<PathBuf, FetchError> {
        let reader = self.reader.clone();
        let tmp = tmp.to_path_buf();
        let final_path = final_path.to_path_buf();
        let variable = variable.clone();

        blocking(move || {
            let _lock = PathLock::acquire(&final_path)?;
            if final_path.exists() && validate_artifact(reader.as_ref(), &final_path, &variable).is_ok() {
                debug!(path = %final_path.display(), "Already published by another fetcher");
                let _ = fs::remove_file(&tmp);
                return Ok(final_path);
            }
            fs::rename(&tmp, &final_path).map_err(|e| FetchError::io(&final_path, e))?;
            info!(path = %final_path.display(), "Published artifact");
            Ok(final_path)
        })
        .await?
    }

    /// Whether a valid artifact is already cached. An invalid one is evicted
    /// together with temp files too old to belong to a live download.
    async fn check_cached(&self, final_path: &Path, variable: &VariableConfig) -> Result<bool, FetchError> {
        let size = match tokio::fs::metadata(final_path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(FetchError::io(final_path, e)),
        };
        let min = self.settings.min_artifact_bytes;
        if size >= min && self.validate(final_path, variable).await.is_ok() {
            return Ok(true);
        }

        let reader = self.reader.clone();
        let path = final_path.to_path_buf();
        let variable = variable.clone();
        let stale_after = self.settings.download_timeout;
        blocking(move || {
            let _lock = PathLock::acquire(&path)?;
            // A concurrent fetcher may have replaced it since the check above
            match fs::metadata(&path) {
                Ok(meta) if meta.len() >= min && validate_artifact(reader.as_ref(), &path, &variable).is_ok() => {
                    return Ok(true);
                }
                Ok(_) => {
                    fs::remove_file(&path).map_err(|e| FetchError::io(&path, e))?;
                    warn!(path = %path.display(), "Evicted corrupt artifact");
                }
                Err(_) => {}
            }
            remove_stale_temps(&path, stale_after);
            Ok(false)
        })
        .await?
    }
}

/// Open the artifact and materialize the variable's field.
fn validate_artifact(reader: &dyn DatasetReader, path: &Path, variable: &VariableConfig) -> Result<(), FetchError> {
    let corrupt = |message: String| FetchError::Corrupt {
        path: path.to_path_buf(),
        message,
    };
    let dataset = reader.open(path).map_err(|e| corrupt(e.to_string()))?;
    let field = tile_engine::find_field(&dataset, variable).map_err(|e| corrupt(e.to_string()))?;
    if field.values.is_empty() {
        return Err(corrupt(format!("field {} has no values", field.source)));
    }
    Ok(())
}

/// Remove `{artifact}.*.tmp` siblings last modified before `older_than` ago.
fn remove_stale_temps(final_path: &Path, older_than: Duration) {
    let (Some(dir), Some(name)) = (final_path.parent(), final_path.file_name().and_then(|n| n.to_str())) else {
        return;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let prefix = format!("{name}.");
    for entry in entries.filter_map(|e| e.ok()) {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !(file_name.starts_with(&prefix) && file_name.ends_with(".tmp")) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        if age.is_some_and(|age| age > older_than) {
            let _ = fs::remove_file(entry.path());
            debug!(path = %entry.path().display(), "Removed stale temp file");
        }
    }
}

/// Run synchronous file work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, FetchError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FetchError::Task(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_temps_removed_fresh_kept() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("grib_01.grib2");
        let stale = dir.path().join("grib_01.grib2.abc.tmp");
        let other = dir.path().join("grib_02.grib2.abc.tmp");
        fs::write(&stale, b"x").unwrap();
        fs::write(&other, b"x").unwrap();

        remove_stale_temps(&target, Duration::from_secs(3600));
        assert!(stale.exists());

        std::thread::sleep(Duration::from_millis(20));
        remove_stale_temps(&target, Duration::from_millis(1));
        assert!(!stale.exists());
        assert!(other.exists());
    }
}
