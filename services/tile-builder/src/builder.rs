//! End-to-end build: resolve runs, fetch hours, aggregate, persist.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use forecast_common::{BoundingBox, Catalog, ModelConfig, RegionConfig, VariableConfig};
use grib_reader::DatasetReader;
use serde::Serialize;
use storage::{CacheLayout, FsTileStore, RetentionManager, RunStatus, TileKey, TileRepository};
use tile_engine::TileAggregator;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Settings;
use crate::fetcher::ArtifactFetcher;
use crate::orchestrator::FetchOrchestrator;
use crate::resolver::{RunInfo, ScheduleResolver};
use crate::source::ArtifactSource;

/// What to build on each cycle.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Region ids; empty means every configured region.
    pub regions: Vec<String>,
    /// Variable ids; empty means every configured variable.
    pub variables: Vec<String>,
    /// Variable whose tile decides whether a run is already built.
    pub proxy_variable: String,
    pub max_runs: usize,
    pub max_hours: Option<u32>,
    /// Overrides each model's `retention.keep_runs`.
    pub keep_runs: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            variables: Vec::new(),
            proxy_variable: "t2m".to_string(),
            max_runs: 1,
            max_hours: None,
            keep_runs: None,
        }
    }
}

/// Outcome of building one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub model_id: String,
    pub run_id: String,
    pub tiles_written: usize,
    pub tiles_failed: usize,
    /// Regions whose tiles were already valid and complete.
    pub regions_skipped: usize,
    pub hours_fetched: usize,
    /// Requested hours that could not be fetched for at least one variable.
    pub hours_missing: Vec<u32>,
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub runs: Vec<RunSummary>,
    pub models_failed: usize,
    pub runs_removed: usize,
}

/// Drives the fetch and aggregation pipeline for every configured region.
pub struct TileBuilder {
    catalog: Arc<Catalog>,
    resolver: ScheduleResolver,
    orchestrator: FetchOrchestrator,
    aggregator: TileAggregator,
    store: Arc<FsTileStore>,
    retention: RetentionManager,
    options: BuildOptions,
}

impl TileBuilder {
    pub fn new(
        catalog: Arc<Catalog>,
        resolver: ScheduleResolver,
        orchestrator: FetchOrchestrator,
        aggregator: TileAggregator,
        store: Arc<FsTileStore>,
        retention: RetentionManager,
        options: BuildOptions,
    ) -> Self {
        Self {
            catalog,
            resolver,
            orchestrator,
            aggregator,
            store,
            retention,
            options,
        }
    }

    /// Wire the whole pipeline from runtime settings.
    ///
    /// Artifacts are requested for the union of the selected regions so one
    /// download serves every region.
    pub fn from_settings(
        settings: &Settings,
        catalog: Arc<Catalog>,
        source: Arc<dyn ArtifactSource>,
        reader: Arc<dyn DatasetReader>,
    ) -> Result<Self> {
        let options = settings.build_options();
        let regions = select_regions(&catalog, &options.regions)?;
        let bbox = union_bbox(&regions).ok_or_else(|| anyhow!("No regions configured"))?;

        let layout = CacheLayout::new(&settings.cache_dir, &settings.tiles_dir);
        let fetcher = Arc::new(ArtifactFetcher::new(
            source.clone(),
            reader.clone(),
            layout.clone(),
            catalog.clone(),
            settings.fetch_settings(bbox),
        ));
        let resolver = ScheduleResolver::new(source, catalog.clone(), bbox, settings.probe_timeout())
            .with_lookback(settings.lookback_hours);

        Ok(Self::new(
            catalog,
            resolver,
            FetchOrchestrator::new(fetcher, settings.max_concurrent),
            TileAggregator::new(reader),
            Arc::new(FsTileStore::new(layout.clone())),
            RetentionManager::new(layout),
            options,
        ))
    }

    pub fn store(&self) -> &Arc<FsTileStore> {
        &self.store
    }

    /// Build the newest published runs of a model.
    pub async fn build_model(&self, model_id: &str) -> Result<Vec<RunSummary>> {
        self.build_model_at(model_id, Utc::now()).await
    }

    /// [`Self::build_model`] relative to a fixed `now`.
    #[instrument(skip(self, now))]
    pub async fn build_model_at(&self, model_id: &str, now: DateTime<Utc>) -> Result<Vec<RunSummary>> {
        let runs = self
            .resolver
            .resolve_runs_at(model_id, self.options.max_runs, now)
            .await
            .with_context(|| format!("Failed to resolve runs for {model_id}"))?;

        let mut summaries = Vec::with_capacity(runs.len());
        for info in &runs {
            summaries.push(self.build_run(model_id, info).await?);
        }
        Ok(summaries)
    }

    /// Build every selected variable of one run for every region that lacks
    /// a valid, complete proxy tile.
    #[instrument(skip(self, info), fields(model = %model_id, run = %info.run_id()))]
    pub async fn build_run(&self, model_id: &str, info: &RunInfo) -> Result<RunSummary> {
        let run_id = info.run_id();
        let hours: Vec<u32> = match self.options.max_hours {
            Some(max) => info.forecast_hours.iter().copied().filter(|&h| h <= max).collect(),
            None => info.forecast_hours.clone(),
        };
        let mut summary = RunSummary {
            model_id: model_id.to_string(),
            run_id: run_id.clone(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for region in select_regions(&self.catalog, &self.options.regions)? {
            if self.is_built(model_id, &run_id, &region, &hours) {
                info!(region = %region.id, "Run already built");
                summary.regions_skipped += 1;
            } else {
                pending.push(region);
            }
        }
        if pending.is_empty() {
            return Ok(summary);
        }

        for variable in self.select_variables()? {
            let paths = self
                .orchestrator
                .download_hours(model_id, &variable.id, &info.run, &hours)
                .await;
            summary.hours_fetched += paths.len();
            for hour in hours.iter().filter(|h| !paths.contains_key(h)) {
                if !summary.hours_missing.contains(hour) {
                    summary.hours_missing.push(*hour);
                }
            }
            if paths.is_empty() {
                warn!(variable = %variable.id, "No hours available");
                summary.tiles_failed += pending.len();
                continue;
            }

            for region in &pending {
                let key = TileKey::new(
                    &region.id,
                    region.default_resolution_deg,
                    model_id,
                    &run_id,
                    &variable.id,
                );
                match self.build_tile(&key, &paths, &variable, region, info).await {
                    Ok(_) => summary.tiles_written += 1,
                    Err(e) => {
                        warn!(tile = %key, error = %e, "Tile build failed");
                        summary.tiles_failed += 1;
                    }
                }
            }
        }

        for region in &pending {
            let proxy = TileKey::new(
                &region.id,
                region.default_resolution_deg,
                model_id,
                &run_id,
                &self.options.proxy_variable,
            );
            if self.store.tile_exists(&proxy) {
                self.store
                    .write_latest(&region.id, region.default_resolution_deg, model_id, &run_id)
                    .with_context(|| format!("Failed to record latest run for {}", region.id))?;
            }
        }

        summary.hours_missing.sort_unstable();
        info!(
            succeeded = summary.tiles_written,
            failed = summary.tiles_failed,
            skipped_regions = summary.regions_skipped,
            hours = summary.hours_fetched,
            missing = ?summary.hours_missing,
            "Run build complete"
        );
        Ok(summary)
    }

    fn is_built(&self, model_id: &str, run_id: &str, region: &RegionConfig, hours: &[u32]) -> bool {
        let resolution = region.default_resolution_deg;
        let proxy = TileKey::new(&region.id, resolution, model_id, run_id, &self.options.proxy_variable);
        match self.store.validate_tile(&proxy, region, resolution) {
            Ok(metadata) => metadata.hours == hours,
            Err(e) if e.is_cache_miss() => {
                debug!(tile = %proxy, error = %e, "Proxy tile missing or stale");
                false
            }
            Err(e) => {
                warn!(tile = %proxy, error = %e, "Cannot check proxy tile, rebuilding");
                false
            }
        }
    }

    async fn build_tile(
        &self,
        key: &TileKey,
        paths: &BTreeMap<u32, PathBuf>,
        variable: &VariableConfig,
        region: &RegionConfig,
        info: &RunInfo,
    ) -> Result<PathBuf> {
        let aggregator = self.aggregator.clone();
        let store = self.store.clone();
        let key = key.clone();
        let paths = paths.clone();
        let variable = variable.clone();
        let bbox = region.bbox;
        let resolution = region.default_resolution_deg;
        let init_time = info.run.init_time();

        tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            let stack = aggregator.build_tiles(&paths, &variable, &bbox, resolution)?;
            let path = store.save_tiles(&key, &stack, &variable.units, init_time)?;
            Ok(path)
        })
        .await
        .context("Tile build task failed")?
    }

    fn select_variables(&self) -> Result<Vec<VariableConfig>> {
        if self.options.variables.is_empty() {
            return Ok(self.catalog.variables().cloned().collect());
        }
        self.options
            .variables
            .iter()
            .map(|id| Ok(self.catalog.variable(id)?.clone()))
            .collect()
    }

    fn models_to_build(&self, model: Option<&str>) -> Result<Vec<ModelConfig>> {
        match model {
            Some(id) => Ok(vec![self.catalog.model(id)?.clone()]),
            None => Ok(self.catalog.models().filter(|m| m.model.enabled).cloned().collect()),
        }
    }

    /// Build one model (or every enabled model), then apply retention.
    ///
    /// A model that fails is logged and counted; the others still run.
    pub async fn run_cycle(&self, model: Option<&str>) -> Result<CycleSummary> {
        let mut cycle = CycleSummary::default();
        for config in self.models_to_build(model)? {
            let model_id = config.model.id.as_str();
            match self.build_model(model_id).await {
                Ok(runs) => cycle.runs.extend(runs),
                Err(e) => {
                    error!(model = %model_id, error = %format!("{e:#}"), "Model build failed");
                    cycle.models_failed += 1;
                }
            }
            cycle.runs_removed += self.apply_retention(&config);
        }
        Ok(cycle)
    }

    /// Prune tile runs in each region and raw artifact runs; returns the
    /// number of tile runs removed.
    pub fn apply_retention(&self, model: &ModelConfig) -> usize {
        let keep = self.options.keep_runs.unwrap_or(model.retention.keep_runs);
        let model_id = model.model.id.as_str();
        let regions = match select_regions(&self.catalog, &self.options.regions) {
            Ok(regions) => regions,
            Err(e) => {
                error!(error = %e, "Cannot select regions for retention");
                return 0;
            }
        };

        let mut removed = 0;
        for region in &regions {
            match self
                .retention
                .cleanup_old_runs(&region.id, region.default_resolution_deg, model_id, keep)
            {
                Ok(runs) => removed += runs.len(),
                Err(e) => error!(region = %region.id, model = %model_id, error = %e, "Tile retention failed"),
            }
        }
        if let Err(e) = self.retention.cleanup_grib_runs(model_id, keep) {
            error!(model = %model_id, error = %e, "Artifact retention failed");
        }
        removed
    }

    /// Cached run status of every enabled model in each selected region.
    pub fn cache_status(&self) -> Result<BTreeMap<String, Vec<RunStatus>>> {
        let models: Vec<&ModelConfig> = self.catalog.models().filter(|m| m.model.enabled).collect();
        let mut out = BTreeMap::new();
        for region in select_regions(&self.catalog, &self.options.regions)? {
            let status = self.store.cache_status(
                &region.id,
                region.default_resolution_deg,
                models.iter().copied(),
                &self.options.proxy_variable,
            )?;
            out.insert(region.id.clone(), status);
        }
        Ok(out)
    }

    /// Run build cycles until a shutdown signal arrives.
    pub async fn run_forever(
        &self,
        model: Option<&str>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            match self.run_cycle(model).await {
                Ok(cycle) => info!(
                    runs = cycle.runs.len(),
                    models_failed = cycle.models_failed,
                    runs_removed = cycle.runs_removed,
                    "Build cycle complete"
                ),
                Err(e) => error!(error = %format!("{e:#}"), "Build cycle failed"),
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down tile builder");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
        Ok(())
    }
}

/// Selected regions, or every configured region when `ids` is empty.
pub fn select_regions(catalog: &Catalog, ids: &[String]) -> Result<Vec<RegionConfig>> {
    if ids.is_empty() {
        return Ok(catalog.regions().cloned().collect());
    }
    ids.iter()
        .map(|id| Ok(catalog.region(id)?.clone()))
        .collect()
}

/// Smallest box covering every region.
pub fn union_bbox(regions: &[RegionConfig]) -> Option<BoundingBox> {
    regions
        .iter()
        .map(|r| r.bbox)
        .reduce(|acc, bbox| acc.union(&bbox))
}
