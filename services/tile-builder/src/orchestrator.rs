//! Bounded-concurrency download of every hour of a run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use forecast_common::{schedule, ModelRun};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::error::FetchError;
use crate::fetcher::ArtifactFetcher;

/// Fans hour fetches out over a bounded pool.
#[derive(Clone)]
pub struct FetchOrchestrator {
    fetcher: Arc<ArtifactFetcher>,
    max_concurrent: usize,
}

impl FetchOrchestrator {
    pub fn new(fetcher: Arc<ArtifactFetcher>, max_concurrent: usize) -> Self {
        Self {
            fetcher,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn fetcher(&self) -> &Arc<ArtifactFetcher> {
        &self.fetcher
    }

    /// Fetch the given hours. A failed hour is absent from the result and
    /// never aborts its siblings.
    #[instrument(
        skip(self, run, hours),
        fields(model = %model_id, variable = %variable_id, run = %run.run_id(), hours = hours.len())
    )]
    pub async fn download_hours(
        &self,
        model_id: &str,
        variable_id: &str,
        run: &ModelRun,
        hours: &[u32],
    ) -> BTreeMap<u32, PathBuf> {
        let results: Vec<(u32, Result<PathBuf, FetchError>)> = stream::iter(hours.iter().copied())
            .map(|hour| async move {
                let result = self.fetcher.fetch_artifact(model_id, variable_id, run, hour).await;
                (hour, result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut paths = BTreeMap::new();
        let mut failed = 0usize;
        for (hour, result) in results {
            match result {
                Ok(path) => {
                    paths.insert(hour, path);
                }
                Err(e) => {
                    warn!(
                        model = model_id,
                        variable = variable_id,
                        hour,
                        error = %e,
                        "Forecast hour dropped"
                    );
                    failed += 1;
                }
            }
        }

        info!(succeeded = paths.len(), failed, "Download cycle complete");
        paths
    }

    /// Fetch every hour of the model's base schedule for the run, capped at
    /// `max_hours` when given.
    pub async fn download_all_hours(
        &self,
        model_id: &str,
        variable_id: &str,
        run: &ModelRun,
        max_hours: Option<u32>,
    ) -> Result<BTreeMap<u32, PathBuf>, FetchError> {
        let model = self.fetcher.catalog().model(model_id)?;
        let hours = schedule::expected_hours(&model.schedule, run.init_hour, max_hours, false);
        Ok(self.download_hours(model_id, variable_id, run, &hours).await)
    }
}
