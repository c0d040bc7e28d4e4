//! Forecast tile builder.
//!
//! Finds the newest published model runs, fetches every forecast hour of
//! each selected variable with bounded concurrency, reduces the hours onto
//! each region's regular grid and persists the stacked tiles:
//!
//! ```text
//! ScheduleResolver ─► FetchOrchestrator ─► ArtifactFetcher ─► grib cache
//!                                                                 │
//!              tile cache ◄── TileRepository ◄── TileAggregator ◄─┘
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod resolver;
pub mod retry;
pub mod source;

pub use builder::{BuildOptions, CycleSummary, RunSummary, TileBuilder};
pub use config::Settings;
pub use error::{FetchError, ResolveError};
pub use fetcher::{ArtifactFetcher, FetchSettings, DEFAULT_MIN_ARTIFACT_BYTES};
pub use orchestrator::FetchOrchestrator;
pub use resolver::{RunInfo, ScheduleResolver};
pub use retry::{Exhausted, RetryPolicy};
pub use source::{artifact_url, build_variable_query, probe_url, ArtifactSource, HttpSource};
