//! Common types and configuration shared across the forecast tile crates.

pub mod bbox;
pub mod config;
pub mod error;
pub mod run;
pub mod schedule;
pub mod units;

pub use bbox::{BoundingBox, BOUNDS_TOLERANCE_DEG};
pub use config::{
    Catalog, HourSegment, ModelConfig, ModelInfo, RegionConfig, RetentionConfig, ScheduleConfig,
    SourceConfig, VariableConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use run::{is_run_id, ModelRun};
pub use units::UnitConversion;

/// Directory name for a tile resolution, e.g. `0.100deg`.
pub fn resolution_dir(resolution_deg: f64) -> String {
    format!("{:.3}deg", resolution_deg)
}
