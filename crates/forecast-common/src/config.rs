//! Static catalog of models, variables and regions.
//!
//! Loaded once from a config directory laid out as:
//!
//! ```text
//! config/
//!   models/*.yaml      one file per model
//!   variables.yaml
//!   regions.yaml
//! ```
//!
//! The resulting [`Catalog`] is immutable and is shared behind an `Arc` by
//! every component that needs it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::bbox::BoundingBox;
use crate::error::{ConfigError, ConfigResult};
use crate::units::UnitConversion;

/// Root configuration loaded from a model YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model: ModelInfo,
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Basic model identification.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Upstream filter service settings for one model.
///
/// `dir_pattern` and `file_pattern` accept the placeholders `{date}`
/// (YYYYMMDD), `{init_hour}` (two digits) and `{forecast_hour}` (zero padded
/// to `forecast_hour_digits`).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub dir_pattern: String,
    pub file_pattern: String,
    /// Query parameter used for lightweight availability probes.
    #[serde(default = "default_availability_var")]
    pub availability_check_var: String,
    #[serde(default = "default_hour_digits")]
    pub forecast_hour_digits: usize,
    #[serde(default = "default_extension")]
    pub file_extension: String,
}

fn default_availability_var() -> String {
    "var_REFC".to_string()
}

fn default_hour_digits() -> usize {
    2
}

fn default_extension() -> String {
    "grib2".to_string()
}

impl SourceConfig {
    /// Zero-padded forecast hour as it appears in file names and cache paths.
    pub fn format_hour(&self, forecast_hour: u32) -> String {
        format!("{:0width$}", forecast_hour, width = self.forecast_hour_digits)
    }

    /// Expand the directory pattern for a run.
    pub fn dir_for(&self, date_str: &str, init_hour: &str) -> String {
        self.dir_pattern
            .replace("{date}", date_str)
            .replace("{init_hour}", init_hour)
    }

    /// Expand the file pattern for a run and forecast hour.
    pub fn file_for(&self, init_hour: &str, forecast_hour: u32) -> String {
        self.file_pattern
            .replace("{init_hour}", init_hour)
            .replace("{forecast_hour}", &self.format_hour(forecast_hour))
    }
}

/// One segment of a forecast-hour schedule.
///
/// A segment without `start` begins at the first multiple of `step` after the
/// previous segment's end (or at `step` for the first segment). A segment
/// without `end` runs to the requested horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HourSegment {
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub end: Option<u32>,
    pub step: u32,
}

/// Run cadence and forecast-hour layout of a model.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Explicit init hours published by the model. Empty means derived from
    /// `update_frequency_hours`.
    #[serde(default)]
    pub cycle_hours: Vec<u32>,
    #[serde(default = "default_update_frequency")]
    pub update_frequency_hours: u32,
    pub max_forecast_hours: u32,
    /// Per-init-hour horizon keyed by two-digit hour, plus an optional `default`.
    #[serde(default)]
    pub max_hours_by_init: BTreeMap<String, u32>,
    pub forecast_hours: Vec<HourSegment>,
    /// Prepend hourly steps `1..=N` when the run publishes them.
    #[serde(default)]
    pub hourly_override_first_hours: u32,
    #[serde(default = "default_lookback")]
    pub lookback_hours: u32,
}

fn default_update_frequency() -> u32 {
    1
}

fn default_lookback() -> u32 {
    24
}

impl ScheduleConfig {
    /// Whether the model publishes a run at this init hour.
    pub fn is_cycle_hour(&self, init_hour: u32) -> bool {
        if !self.cycle_hours.is_empty() {
            return self.cycle_hours.contains(&init_hour);
        }
        if self.update_frequency_hours >= 6 {
            return init_hour % 6 == 0;
        }
        true
    }

    /// Horizon for a run initialized at `init_hour`.
    ///
    /// Looks up the two-digit hour, then `default`, then `fallback`.
    pub fn max_hours_for_init(&self, init_hour: u32, fallback: u32) -> u32 {
        let key = format!("{:02}", init_hour);
        self.max_hours_by_init
            .get(&key)
            .or_else(|| self.max_hours_by_init.get("default"))
            .copied()
            .unwrap_or(fallback)
    }
}

/// Data retention settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_keep_runs")]
    pub keep_runs: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_runs: default_keep_runs(),
        }
    }
}

fn default_keep_runs() -> usize {
    5
}

/// A variable that can be fetched and aggregated.
#[derive(Debug, Clone, Deserialize)]
pub struct VariableConfig {
    pub id: String,
    pub display_name: String,
    pub units: String,
    /// Upstream variable names, sent as `var_{name}=on`.
    #[serde(default)]
    pub nomads_params: Vec<String>,
    /// Upstream level selectors, sent verbatim (e.g. `lev_2_m_above_ground=on`).
    #[serde(default)]
    pub level_params: Vec<String>,
    /// Preferred native field name.
    pub field: String,
    #[serde(default)]
    pub alternate_fields: Vec<String>,
    /// Orthogonal components combined into a magnitude when `field` is absent.
    #[serde(default)]
    pub components: Option<[String; 2]>,
    #[serde(default)]
    pub conversion: Option<UnitConversion>,
    /// Conversions keyed by the native field's unit string; these win over
    /// `conversion`.
    #[serde(default)]
    pub unit_conversions_by_units: BTreeMap<String, UnitConversion>,
    #[serde(default)]
    pub category: Option<String>,
}

impl VariableConfig {
    /// Conversion to apply to a native field carrying `source_units`.
    pub fn conversion_for(&self, source_units: Option<&str>) -> Option<UnitConversion> {
        source_units
            .and_then(|units| self.unit_conversions_by_units.get(units).copied())
            .or(self.conversion)
    }
}

/// A geographic region tiles are built for.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub id: String,
    pub name: String,
    pub bbox: BoundingBox,
    #[serde(default = "default_resolution")]
    pub default_resolution_deg: f64,
}

fn default_resolution() -> f64 {
    0.1
}

#[derive(Debug, Deserialize)]
struct VariablesFile {
    variables: Vec<VariableConfig>,
}

#[derive(Debug, Deserialize)]
struct RegionsFile {
    regions: Vec<RegionConfig>,
}

/// Immutable lookup tables for models, variables and regions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    models: BTreeMap<String, ModelConfig>,
    variables: BTreeMap<String, VariableConfig>,
    regions: BTreeMap<String, RegionConfig>,
}

impl Catalog {
    /// Assemble a catalog from already-parsed entries.
    pub fn from_parts(
        models: impl IntoIterator<Item = ModelConfig>,
        variables: impl IntoIterator<Item = VariableConfig>,
        regions: impl IntoIterator<Item = RegionConfig>,
    ) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|m| (m.model.id.clone(), m))
                .collect(),
            variables: variables.into_iter().map(|v| (v.id.clone(), v)).collect(),
            regions: regions.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    /// Load the full catalog from a config directory.
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let models = load_model_configs(config_dir)?;

        let variables_path = config_dir.join("variables.yaml");
        let variables: VariablesFile = read_yaml(&variables_path)?;

        let regions_path = config_dir.join("regions.yaml");
        let regions: RegionsFile = read_yaml(&regions_path)?;

        let catalog = Self::from_parts(models, variables.variables, regions.regions);
        info!(
            models = catalog.models.len(),
            variables = catalog.variables.len(),
            regions = catalog.regions.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    pub fn model(&self, id: &str) -> ConfigResult<&ModelConfig> {
        self.models
            .get(id)
            .ok_or_else(|| ConfigError::UnknownModel(id.to_string()))
    }

    pub fn variable(&self, id: &str) -> ConfigResult<&VariableConfig> {
        self.variables
            .get(id)
            .ok_or_else(|| ConfigError::UnknownVariable(id.to_string()))
    }

    pub fn region(&self, id: &str) -> ConfigResult<&RegionConfig> {
        self.regions
            .get(id)
            .ok_or_else(|| ConfigError::UnknownRegion(id.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.values()
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableConfig> {
        self.variables.values()
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionConfig> {
        self.regions.values()
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl ModelConfig {
    /// Load a model configuration from a YAML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let config: ModelConfig = read_yaml(path)?;
        crate::schedule::validate(&config.model.id, &config.schedule)?;
        debug!(model = %config.model.id, path = %path.display(), "Loaded model config");
        Ok(config)
    }
}

/// Load all enabled model configurations from `{config_dir}/models`.
///
/// Files that fail to parse are logged and skipped.
pub fn load_model_configs(config_dir: &Path) -> ConfigResult<Vec<ModelConfig>> {
    let models_dir = config_dir.join("models");

    if !models_dir.exists() {
        warn!(path = %models_dir.display(), "Models config directory not found");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(&models_dir).map_err(|source| ConfigError::Io {
        path: models_dir.clone(),
        source,
    })?;

    let mut configs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();

        if path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            match ModelConfig::load(&path) {
                Ok(config) => {
                    if config.model.enabled {
                        info!(
                            model = %config.model.id,
                            name = %config.model.name,
                            "Loaded model configuration"
                        );
                        configs.push(config);
                    } else {
                        debug!(model = %config.model.id, "Skipping disabled model");
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load model config");
                }
            }
        }
    }

    configs.sort_by(|a, b| a.model.id.cmp(&b.model.id));
    Ok(configs)
}
