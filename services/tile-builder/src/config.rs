//! Runtime settings from the command line and environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use forecast_common::BoundingBox;

use crate::builder::BuildOptions;
use crate::fetcher::FetchSettings;
use crate::retry::RetryPolicy;

#[derive(Parser, Debug, Clone)]
#[command(name = "tile-builder")]
#[command(about = "Fetches forecast model output and builds per-region statistic tiles")]
pub struct Settings {
    /// Run one build cycle and exit (vs continuous polling)
    #[arg(long)]
    pub once: bool,

    /// Specific model to build (default: all enabled)
    #[arg(short, long, env = "MODEL")]
    pub model: Option<String>,

    /// Regions to build, comma separated (default: all configured)
    #[arg(long, env = "REGIONS", value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Variables to build, comma separated (default: all configured)
    #[arg(long, env = "VARIABLES", value_delimiter = ',')]
    pub variables: Vec<String>,

    /// Configuration directory (contains models/*.yaml, variables.yaml, regions.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    /// Root of the raw artifact cache
    #[arg(long, env = "GRIB_CACHE_DIR", default_value = "/data/grib_cache")]
    pub cache_dir: PathBuf,

    /// Root of the tile cache
    #[arg(long, env = "TILES_DIR", default_value = "/data/tiles")]
    pub tiles_dir: PathBuf,

    /// Maximum concurrent hour downloads
    #[arg(long, env = "MAX_CONCURRENT", default_value = "6")]
    pub max_concurrent: usize,

    /// Download attempts per artifact
    #[arg(long, env = "MAX_ATTEMPTS", default_value = "3")]
    pub max_attempts: u32,

    #[arg(long, default_value = "2")]
    pub retry_initial_delay_secs: u64,

    #[arg(long, default_value = "30")]
    pub retry_max_delay_secs: u64,

    /// Timeout for availability probes
    #[arg(long, env = "PROBE_TIMEOUT_SECS", default_value = "10")]
    pub probe_timeout_secs: u64,

    /// Timeout for one download attempt
    #[arg(long, env = "DOWNLOAD_TIMEOUT_SECS", default_value = "300")]
    pub download_timeout_secs: u64,

    /// Artifacts smaller than this are rejected
    #[arg(long, default_value = "1000")]
    pub min_artifact_bytes: u64,

    /// Runs to build per model per cycle
    #[arg(long, default_value = "1")]
    pub max_runs: usize,

    /// Cap on forecast hours per run
    #[arg(long)]
    pub max_hours: Option<u32>,

    /// Hours to search back for a published run (default: per model)
    #[arg(long, env = "LOOKBACK_HOURS")]
    pub lookback_hours: Option<u32>,

    /// Variable whose tile decides whether a run is already built
    #[arg(long, default_value = "t2m")]
    pub proxy_variable: String,

    /// Runs kept per model (default: per model retention)
    #[arg(long, env = "KEEP_RUNS")]
    pub keep_runs: Option<usize>,

    /// Seconds between build cycles
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "600")]
    pub poll_interval_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.retry_initial_delay_secs),
            Duration::from_secs(self.retry_max_delay_secs),
        )
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_settings(&self, download_bbox: BoundingBox) -> FetchSettings {
        FetchSettings {
            min_artifact_bytes: self.min_artifact_bytes,
            retry: self.retry_policy(),
            download_timeout: self.download_timeout(),
            download_bbox,
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            regions: self.regions.clone(),
            variables: self.variables.clone(),
            proxy_variable: self.proxy_variable.clone(),
            max_runs: self.max_runs,
            max_hours: self.max_hours,
            keep_runs: self.keep_runs,
        }
    }
}
