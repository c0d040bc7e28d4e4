//! Run retention and disk usage reporting.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use forecast_common::is_run_id;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{StorageError, StorageResult};
use crate::layout::CacheLayout;

/// Byte totals per model and per region.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiskUsage {
    pub grib_bytes_by_model: BTreeMap<String, u64>,
    pub tile_bytes_by_model: BTreeMap<String, u64>,
    pub tile_bytes_by_region: BTreeMap<String, u64>,
    pub grib_bytes: u64,
    pub tile_bytes: u64,
}

impl DiskUsage {
    pub fn total_bytes(&self) -> u64 {
        self.grib_bytes + self.tile_bytes
    }
}

/// Prunes old runs from both caches.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    layout: CacheLayout,
}

impl RetentionManager {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    /// Keep the `keep` newest tile runs of a model in one region; returns the
    /// removed run ids.
    pub fn cleanup_old_runs(
        &self,
        region_id: &str,
        resolution_deg: f64,
        model_id: &str,
        keep: usize,
    ) -> StorageResult<Vec<String>> {
        let dir = self.layout.tile_model_dir(region_id, resolution_deg, model_id);
        let removed = prune_runs(&dir, keep)?;
        if !removed.is_empty() {
            info!(
                region = region_id,
                model = model_id,
                removed = removed.len(),
                kept = keep,
                "Removed old tile runs"
            );
        }
        Ok(removed)
    }

    /// Keep the `keep` newest raw artifact runs of a model.
    pub fn cleanup_grib_runs(&self, model_id: &str, keep: usize) -> StorageResult<Vec<String>> {
        let removed = prune_runs(&self.layout.grib_model_dir(model_id), keep)?;
        if !removed.is_empty() {
            info!(model = model_id, removed = removed.len(), kept = keep, "Removed old artifact runs");
        }
        Ok(removed)
    }

    /// Walk both caches and total file sizes. Missing roots count as zero.
    pub fn disk_usage(&self) -> DiskUsage {
        let mut usage = DiskUsage::default();

        for (rel, size) in walk_files(self.layout.grib_root()) {
            usage.grib_bytes += size;
            if let Some(model) = component(&rel, 0) {
                *usage.grib_bytes_by_model.entry(model).or_default() += size;
            }
        }

        // {region}/{res}/{model}/...
        for (rel, size) in walk_files(self.layout.tiles_root()) {
            usage.tile_bytes += size;
            if let Some(region) = component(&rel, 0) {
                *usage.tile_bytes_by_region.entry(region).or_default() += size;
            }
            if let Some(model) = component(&rel, 2) {
                *usage.tile_bytes_by_model.entry(model).or_default() += size;
            }
        }

        usage
    }
}

/// Remove every `run_*` directory under `dir` beyond the `keep` newest.
fn prune_runs(dir: &Path, keep: usize) -> StorageResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(dir, e)),
    };

    let mut runs: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| is_run_id(name))
        .collect();
    // Fixed-width ids: lexicographic descending is newest first
    runs.sort_by(|a, b| b.cmp(a));

    let mut removed = Vec::new();
    for run_id in runs.into_iter().skip(keep) {
        let path = dir.join(&run_id);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed run");
                removed.push(run_id);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove run"),
        }
    }
    Ok(removed)
}

/// (path relative to `root`, size) for every file under `root`.
fn walk_files(root: &Path) -> Vec<(std::path::PathBuf, u64)> {
    if !root.exists() {
        return Vec::new();
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let size = e.metadata().ok()?.len();
            let rel = e.path().strip_prefix(root).ok()?.to_path_buf();
            Some((rel, size))
        })
        .collect()
}

/// The `n`th component of a relative path, if it is a directory name.
fn component(rel: &Path, n: usize) -> Option<String> {
    let parts: Vec<_> = rel.components().collect();
    // The last component is the file itself
    if n + 1 >= parts.len() {
        return None;
    }
    parts[n].as_os_str().to_str().map(str::to_string)
}
