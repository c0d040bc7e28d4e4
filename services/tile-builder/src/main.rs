//! Forecast tile builder service.
//!
//! Polls the upstream filter service for new model runs and builds
//! per-region min/max/mean tiles from them:
//! - Run discovery with lightweight availability probes
//! - Validated, race-safe artifact cache with retry and backoff
//! - Per-region tile aggregation and persistence
//! - Retention of old tile and artifact runs

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use forecast_common::Catalog;
use grib_reader::{DatasetReader, GribReader};
use tile_builder::{ArtifactSource, HttpSource, Settings, TileBuilder};
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let settings = Settings::parse();

    let level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tile builder");

    let catalog = Catalog::load(&settings.config_dir)
        .with_context(|| format!("Failed to load catalog from {}", settings.config_dir.display()))?;
    let catalog = Arc::new(catalog);

    tokio::fs::create_dir_all(&settings.cache_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.cache_dir.display()))?;
    tokio::fs::create_dir_all(&settings.tiles_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.tiles_dir.display()))?;

    let source: Arc<dyn ArtifactSource> = Arc::new(HttpSource::new(
        settings.probe_timeout(),
        settings.download_timeout(),
    )?);
    let reader: Arc<dyn DatasetReader> = Arc::new(GribReader::default());
    let builder = TileBuilder::from_settings(&settings, catalog, source, reader)?;

    if settings.once {
        info!("Running single build cycle");
        let cycle = builder.run_cycle(settings.model.as_deref()).await?;
        info!(
            runs = cycle.runs.len(),
            models_failed = cycle.models_failed,
            runs_removed = cycle.runs_removed,
            "Build cycle complete"
        );

        for (region, runs) in builder.cache_status()? {
            for run in runs {
                info!(
                    region = %region,
                    model = %run.model_id,
                    run = %run.run_id,
                    hours = run.hours_present,
                    expected = run.expected_hours,
                    status = ?run.status,
                    "Cache status"
                );
            }
        }
    } else {
        info!(interval_secs = settings.poll_interval_secs, "Starting continuous polling");

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let shutdown_rx = shutdown_tx.subscribe();

        // Handle Ctrl+C
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx.send(()).ok();
        });

        builder
            .run_forever(settings.model.as_deref(), settings.poll_interval(), shutdown_rx)
            .await?;
    }

    info!("Tile builder stopped");
    Ok(())
}
