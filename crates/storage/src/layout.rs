//! On-disk key space for raw artifacts and tiles.
//!
//! ```text
//! {grib_root}/{model}/{run_id}/{variable}/grib_{hour:0Nd}.{ext}
//! {tiles_root}/{region}/{res:.3}deg/{model}/{run_id}/{variable}.npz
//! {tiles_root}/{region}/{res:.3}deg/{model}/{run_id}/{variable}.meta.json
//! {tiles_root}/{region}/{res:.3}deg/{model}/latest
//! ```
//!
//! The directory tree is the only catalog; there is no separate index.

use std::path::{Path, PathBuf};

use forecast_common::{resolution_dir, SourceConfig};

/// Identifies one persisted tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileKey {
    pub region_id: String,
    pub resolution_deg: f64,
    pub model_id: String,
    pub run_id: String,
    pub variable_id: String,
}

impl TileKey {
    pub fn new(
        region_id: impl Into<String>,
        resolution_deg: f64,
        model_id: impl Into<String>,
        run_id: impl Into<String>,
        variable_id: impl Into<String>,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            resolution_deg,
            model_id: model_id.into(),
            run_id: run_id.into(),
            variable_id: variable_id.into(),
        }
    }

    /// Same run, different variable.
    pub fn with_variable(&self, variable_id: impl Into<String>) -> Self {
        Self {
            variable_id: variable_id.into(),
            ..self.clone()
        }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.region_id,
            resolution_dir(self.resolution_deg),
            self.model_id,
            self.run_id,
            self.variable_id
        )
    }
}

/// Roots of the raw artifact cache and the tile cache.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    grib_root: PathBuf,
    tiles_root: PathBuf,
}

impl CacheLayout {
    pub fn new(grib_root: impl Into<PathBuf>, tiles_root: impl Into<PathBuf>) -> Self {
        Self {
            grib_root: grib_root.into(),
            tiles_root: tiles_root.into(),
        }
    }

    pub fn grib_root(&self) -> &Path {
        &self.grib_root
    }

    pub fn tiles_root(&self) -> &Path {
        &self.tiles_root
    }

    // ---- raw artifacts ----

    pub fn grib_model_dir(&self, model_id: &str) -> PathBuf {
        self.grib_root.join(model_id)
    }

    pub fn grib_run_dir(&self, model_id: &str, run_id: &str) -> PathBuf {
        self.grib_model_dir(model_id).join(run_id)
    }

    /// Canonical path of one downloaded artifact.
    pub fn artifact_path(
        &self,
        source: &SourceConfig,
        model_id: &str,
        run_id: &str,
        variable_id: &str,
        forecast_hour: u32,
    ) -> PathBuf {
        self.grib_run_dir(model_id, run_id)
            .join(variable_id)
            .join(artifact_file_name(source, forecast_hour))
    }

    // ---- tiles ----

    pub fn region_resolution_dir(&self, region_id: &str, resolution_deg: f64) -> PathBuf {
        self.tiles_root
            .join(region_id)
            .join(resolution_dir(resolution_deg))
    }

    pub fn tile_model_dir(&self, region_id: &str, resolution_deg: f64, model_id: &str) -> PathBuf {
        self.region_resolution_dir(region_id, resolution_deg)
            .join(model_id)
    }

    pub fn tile_run_dir(&self, region_id: &str, resolution_deg: f64, model_id: &str, run_id: &str) -> PathBuf {
        self.tile_model_dir(region_id, resolution_deg, model_id)
            .join(run_id)
    }

    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.tile_run_dir(&key.region_id, key.resolution_deg, &key.model_id, &key.run_id)
            .join(format!("{}.npz", key.variable_id))
    }

    pub fn meta_path(&self, key: &TileKey) -> PathBuf {
        self.tile_run_dir(&key.region_id, key.resolution_deg, &key.model_id, &key.run_id)
            .join(format!("{}.meta.json", key.variable_id))
    }

    /// File holding the newest complete run id for a region/model.
    pub fn latest_pointer(&self, region_id: &str, resolution_deg: f64, model_id: &str) -> PathBuf {
        self.tile_model_dir(region_id, resolution_deg, model_id)
            .join("latest")
    }
}

/// `grib_{hour}.{ext}` with the hour zero-padded to the model's digit count.
pub fn artifact_file_name(source: &SourceConfig, forecast_hour: u32) -> String {
    format!(
        "grib_{}.{}",
        source.format_hour(forecast_hour),
        source.file_extension
    )
}

/// Sibling temp path unique to one writer.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    path.with_file_name(name)
}

/// Whether a file name looks like a writer's temp file.
pub fn is_temp_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tmp")
}
