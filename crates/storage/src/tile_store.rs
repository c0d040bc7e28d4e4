//! Tile persistence and queries over the filesystem layout.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forecast_common::{is_run_id, BoundingBox, RegionConfig};
use ndarray::{Array, Array1, Array2, Array3, Dimension};
use ndarray_npy::{NpzReader, NpzWriter, ReadableElement};
use serde::Serialize;
use tile_engine::{Stat, TileStack};
use tracing::{debug, info, instrument, warn};

use crate::error::{StorageError, StorageResult};
use crate::layout::{temp_sibling, CacheLayout, TileKey};
use crate::metadata::TileMetadata;

/// A persisted tile read back into memory.
#[derive(Debug, Clone)]
pub struct StoredTiles {
    pub metadata: TileMetadata,
    pub stack: TileStack,
}

/// One statistic at one cell across all stored hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSeries {
    pub hours: Vec<u32>,
    pub values: Vec<f32>,
    pub row: usize,
    pub col: usize,
    pub units: String,
}

/// One statistic for one hour over the whole region.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSlice {
    pub hour: u32,
    pub stat: Stat,
    /// `[rows, cols]`, row 0 at the southern edge.
    pub values: Array2<f32>,
    pub bbox: BoundingBox,
    pub resolution_deg: f64,
    pub units: String,
}

/// Storage of stacked tiles keyed by region, resolution, model, run and
/// variable.
///
/// Query helpers are provided on top of the required methods so another
/// backing store only has to implement persistence and listing.
pub trait TileRepository: Send + Sync {
    /// Persist a stack and its metadata; returns the tile path.
    fn save_tiles(
        &self,
        key: &TileKey,
        stack: &TileStack,
        units: &str,
        init_time: DateTime<Utc>,
    ) -> StorageResult<PathBuf>;

    fn load_tiles(&self, key: &TileKey) -> StorageResult<StoredTiles>;

    fn load_metadata(&self, key: &TileKey) -> StorageResult<TileMetadata>;

    /// Whether the array file for `key` exists.
    fn tile_exists(&self, key: &TileKey) -> bool;

    fn list_models(&self, region_id: &str, resolution_deg: f64) -> StorageResult<Vec<String>>;

    /// Run ids present for a model, newest first.
    fn list_runs(&self, region_id: &str, resolution_deg: f64, model_id: &str) -> StorageResult<Vec<String>>;

    fn list_variables(
        &self,
        region_id: &str,
        resolution_deg: f64,
        model_id: &str,
        run_id: &str,
    ) -> StorageResult<Vec<String>>;

    /// Series of `stat` at the cell owning (`lat`, `lon`).
    ///
    /// The longitude is normalized the same way the index was built and the
    /// cell is clamped into the grid, so points just outside the region
    /// resolve to the nearest edge cell.
    fn load_timeseries_for_point(&self, key: &TileKey, lat: f64, lon: f64, stat: Stat) -> StorageResult<PointSeries> {
        let tiles = self.load_tiles(key)?;
        let (row, col) = tiles.stack.index.cell_for_point(lat, lon);
        Ok(PointSeries {
            hours: tiles.stack.hours.clone(),
            values: tiles.stack.series(row, col, stat),
            row,
            col,
            units: tiles.metadata.units,
        })
    }

    fn load_grid_slice(&self, key: &TileKey, hour: u32, stat: Stat) -> StorageResult<GridSlice> {
        let tiles = self.load_tiles(key)?;
        let values = tiles
            .stack
            .slice(hour, stat)
            .ok_or_else(|| StorageError::HourNotFound {
                hour,
                path: PathBuf::from(key.to_string()),
            })?
            .to_owned();
        Ok(GridSlice {
            hour,
            stat,
            values,
            bbox: tiles.metadata.bbox(),
            resolution_deg: tiles.metadata.resolution_deg,
            units: tiles.metadata.units,
        })
    }

    /// Metadata of a tile whose persisted layout matches `region` at
    /// `resolution_deg`, or `LayoutMismatch`/`TilesNotFound`.
    fn validate_tile(&self, key: &TileKey, region: &RegionConfig, resolution_deg: f64) -> StorageResult<TileMetadata> {
        let metadata = self.load_metadata(key)?;
        if !self.tile_exists(key) {
            return Err(StorageError::TilesNotFound(PathBuf::from(key.to_string())));
        }
        metadata.check_layout(Path::new(&key.to_string()), region, resolution_deg)?;
        Ok(metadata)
    }

    fn is_tile_valid(&self, key: &TileKey, region: &RegionConfig, resolution_deg: f64) -> bool {
        match self.validate_tile(key, region, resolution_deg) {
            Ok(_) => true,
            Err(e) => {
                debug!(tile = %key, error = %e, "Tile not usable");
                false
            }
        }
    }

    /// Whether the stored hour list equals `expected` exactly.
    fn is_complete(&self, key: &TileKey, expected: &[u32]) -> StorageResult<bool> {
        Ok(self.load_metadata(key)?.hours == expected)
    }
}

/// Filesystem-backed [`TileRepository`] (`.npz` arrays plus `.meta.json`).
#[derive(Debug, Clone)]
pub struct FsTileStore {
    layout: CacheLayout,
}

impl FsTileStore {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Point the region/model `latest` file at `run_id`.
    pub fn write_latest(&self, region_id: &str, resolution_deg: f64, model_id: &str, run_id: &str) -> StorageResult<()> {
        let pointer = self.layout.latest_pointer(region_id, resolution_deg, model_id);
        write_atomic(&pointer, |w| writeln!(w, "{run_id}"))?;
        info!(region = region_id, model = model_id, run = run_id, "Updated latest pointer");
        Ok(())
    }

    /// Run the `latest` pointer names, falling back to the newest run
    /// directory when the pointer is missing or stale.
    pub fn latest_run(&self, region_id: &str, resolution_deg: f64, model_id: &str) -> StorageResult<Option<String>> {
        let pointer = self.layout.latest_pointer(region_id, resolution_deg, model_id);
        match fs::read_to_string(&pointer) {
            Ok(contents) => {
                let run_id = contents.trim();
                let run_dir = self.layout.tile_run_dir(region_id, resolution_deg, model_id, run_id);
                if is_run_id(run_id) && run_dir.is_dir() {
                    return Ok(Some(run_id.to_string()));
                }
                warn!(pointer = %pointer.display(), run = run_id, "Stale latest pointer");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&pointer, e)),
        }
        Ok(self
            .list_runs(region_id, resolution_deg, model_id)?
            .into_iter()
            .next())
    }

    /// Last modification time of a tile's metadata file.
    pub fn modified_at(&self, key: &TileKey) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(self.layout.meta_path(key)).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }
}

impl TileRepository for FsTileStore {
    #[instrument(skip(self, stack, init_time), fields(tile = %key, hours = stack.hours.len()))]
    fn save_tiles(
        &self,
        key: &TileKey,
        stack: &TileStack,
        units: &str,
        init_time: DateTime<Utc>,
    ) -> StorageResult<PathBuf> {
        let tile_path = self.layout.tile_path(key);
        let meta_path = self.layout.meta_path(key);
        if let Some(parent) = tile_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        // Without metadata the tile reads as unbuilt until both files are replaced
        match fs::remove_file(&meta_path) {
            Ok(()) => debug!(path = %meta_path.display(), "Removed previous metadata"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&meta_path, e)),
        }

        let hours: Array1<i32> = stack.hours.iter().map(|&h| h as i32).collect();
        write_npz(&tile_path, stack, &hours)?;

        let bbox = stack.index.bbox;
        let metadata = TileMetadata {
            region_id: key.region_id.clone(),
            model_id: key.model_id.clone(),
            run_id: key.run_id.clone(),
            variable_id: key.variable_id.clone(),
            lat_min: bbox.min_lat,
            lat_max: bbox.max_lat,
            lon_min: bbox.min_lon,
            lon_max: bbox.max_lon,
            resolution_deg: stack.index.resolution_deg,
            units: units.to_string(),
            lon_0_360: stack.index.lon_0_360,
            index_lon_min: stack.index.index_lon_min,
            init_time_utc: init_time,
            generated_at: Utc::now(),
            hours: stack.hours.clone(),
        };
        // Metadata goes last so its presence implies the arrays are in place
        write_atomic(&meta_path, |w| {
            serde_json::to_writer_pretty(&mut *w, &metadata).map_err(std::io::Error::from)?;
            writeln!(w)
        })?;

        info!(
            path = %tile_path.display(),
            rows = stack.index.rows,
            cols = stack.index.cols,
            "Saved tiles"
        );
        Ok(tile_path)
    }

    fn load_tiles(&self, key: &TileKey) -> StorageResult<StoredTiles> {
        let metadata = self.load_metadata(key)?;
        let path = self.layout.tile_path(key);

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::TilesNotFound(path)),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        let mut npz = NpzReader::new(file).map_err(|source| StorageError::NpzRead {
            path: path.clone(),
            source,
        })?;

        let mins: Array3<f32> = read_array(&mut npz, "mins", &path)?;
        let maxs: Array3<f32> = read_array(&mut npz, "maxs", &path)?;
        let means: Array3<f32> = read_array(&mut npz, "means", &path)?;
        let hours: Array1<i32> = read_array(&mut npz, "hours", &path)?;

        if mins.shape() != maxs.shape() || mins.shape() != means.shape() {
            return Err(corrupt(&path, "statistic arrays differ in shape"));
        }
        let (n_hours, rows, cols) = means.dim();
        if hours.len() != n_hours {
            return Err(corrupt(&path, "hour count does not match arrays"));
        }
        let hours: Vec<u32> = hours.iter().map(|&h| h.max(0) as u32).collect();
        if hours != metadata.hours {
            return Err(corrupt(&path, "hours differ from metadata"));
        }

        let stack = TileStack {
            mins,
            maxs,
            means,
            hours,
            index: metadata.index_meta(rows, cols),
            skipped_hours: Vec::new(),
        };
        Ok(StoredTiles { metadata, stack })
    }

    fn load_metadata(&self, key: &TileKey) -> StorageResult<TileMetadata> {
        TileMetadata::read(&self.layout.meta_path(key))
    }

    fn tile_exists(&self, key: &TileKey) -> bool {
        self.layout.tile_path(key).is_file()
    }

    fn list_models(&self, region_id: &str, resolution_deg: f64) -> StorageResult<Vec<String>> {
        let dir = self.layout.region_resolution_dir(region_id, resolution_deg);
        let mut models = list_dir_names(&dir, |path, name| path.is_dir() && !name.starts_with('.'))?;
        models.sort();
        Ok(models)
    }

    fn list_runs(&self, region_id: &str, resolution_deg: f64, model_id: &str) -> StorageResult<Vec<String>> {
        let dir = self.layout.tile_model_dir(region_id, resolution_deg, model_id);
        let mut runs = list_dir_names(&dir, |path, name| path.is_dir() && is_run_id(name))?;
        // Fixed-width run ids sort chronologically
        runs.sort_by(|a, b| b.cmp(a));
        Ok(runs)
    }

    fn list_variables(
        &self,
        region_id: &str,
        resolution_deg: f64,
        model_id: &str,
        run_id: &str,
    ) -> StorageResult<Vec<String>> {
        let dir = self.layout.tile_run_dir(region_id, resolution_deg, model_id, run_id);
        let mut variables: Vec<String> = list_dir_names(&dir, |path, name| path.is_file() && name.ends_with(".npz"))?
            .into_iter()
            .filter_map(|name| name.strip_suffix(".npz").map(str::to_string))
            // Arrays without metadata are a write in progress or foreign
            .filter(|var| dir.join(format!("{var}.meta.json")).is_file())
            .collect();
        variables.sort();
        Ok(variables)
    }
}

/// Names of directory entries accepted by `keep`; a missing directory is empty.
fn list_dir_names(dir: &Path, keep: impl Fn(&Path, &str) -> bool) -> StorageResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if keep(&entry.path(), &name) {
            names.push(name);
        }
    }
    Ok(names)
}

fn write_npz(path: &Path, stack: &TileStack, hours: &Array1<i32>) -> StorageResult<()> {
    let tmp = temp_sibling(path);
    let result = (|| {
        let file = File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
        let npz_err = |source| StorageError::NpzWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut npz = NpzWriter::new_compressed(file);
        npz.add_array("mins", &stack.mins).map_err(npz_err)?;
        npz.add_array("maxs", &stack.maxs).map_err(npz_err)?;
        npz.add_array("means", &stack.means).map_err(npz_err)?;
        npz.add_array("hours", hours).map_err(npz_err)?;
        npz.finish().map_err(npz_err)?;
        fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Write through a temp sibling and rename into place.
fn write_atomic(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    let tmp = temp_sibling(path);
    let result = (|| {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        writer.flush()?;
        fs::rename(&tmp, path)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(StorageError::io(path, e));
    }
    Ok(())
}

/// Read `name` from an archive whether or not the writer appended `.npy`.
fn read_array<A, D>(npz: &mut NpzReader<File>, name: &str, path: &Path) -> StorageResult<Array<A, D>>
where
    A: ReadableElement,
    D: Dimension,
{
    let read_err = |source| StorageError::NpzRead {
        path: path.to_path_buf(),
        source,
    };
    let names = npz.names().map_err(read_err)?;
    let with_ext = format!("{name}.npy");
    let entry = names
        .iter()
        .find(|n| n.as_str() == name || n.as_str() == with_ext)
        .cloned()
        .ok_or_else(|| corrupt(path, &format!("missing array '{name}'")))?;
    npz.by_name(&entry).map_err(read_err)
}

fn corrupt(path: &Path, message: &str) -> StorageError {
    StorageError::Corrupt {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
