//! Sidecar metadata persisted next to each tile.

use std::path::Path;

use chrono::{DateTime, Utc};
use forecast_common::{BoundingBox, RegionConfig, BOUNDS_TOLERANCE_DEG};
use serde::{Deserialize, Serialize};
use tile_engine::IndexMeta;

use crate::error::{StorageError, StorageResult};

/// Contents of `{variable}.meta.json`.
///
/// Bounds are the requested region bounds; `index_lon_min` is the west edge
/// actually used for column indexing, in the native longitude convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMetadata {
    pub region_id: String,
    pub model_id: String,
    pub run_id: String,
    pub variable_id: String,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub resolution_deg: f64,
    pub units: String,
    pub lon_0_360: bool,
    pub index_lon_min: f64,
    pub init_time_utc: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub hours: Vec<u32>,
}

impl TileMetadata {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.lon_min, self.lat_min, self.lon_max, self.lat_max)
    }

    /// Index parameters for a grid of `rows` x `cols`.
    pub fn index_meta(&self, rows: usize, cols: usize) -> IndexMeta {
        IndexMeta {
            bbox: self.bbox(),
            resolution_deg: self.resolution_deg,
            rows,
            cols,
            lon_0_360: self.lon_0_360,
            index_lon_min: self.index_lon_min,
        }
    }

    /// Check persisted bounds and resolution against a region.
    ///
    /// Any edge or the resolution differing by more than
    /// [`BOUNDS_TOLERANCE_DEG`] is a mismatch.
    pub fn check_layout(&self, path: &Path, region: &RegionConfig, resolution_deg: f64) -> StorageResult<()> {
        let expected = region.bbox;
        let edges = [
            ("lat_min", expected.min_lat, self.lat_min),
            ("lat_max", expected.max_lat, self.lat_max),
            ("lon_min", expected.min_lon, self.lon_min),
            ("lon_max", expected.max_lon, self.lon_max),
            ("resolution_deg", resolution_deg, self.resolution_deg),
        ];
        for (field, want, got) in edges {
            let drift = (want - got).abs();
            if drift.is_nan() || drift > BOUNDS_TOLERANCE_DEG {
                return Err(StorageError::LayoutMismatch {
                    path: path.to_path_buf(),
                    field,
                    expected: want.to_string(),
                    actual: got.to_string(),
                });
            }
        }
        if self.region_id != region.id {
            return Err(StorageError::LayoutMismatch {
                path: path.to_path_buf(),
                field: "region_id",
                expected: region.id.clone(),
                actual: self.region_id.clone(),
            });
        }
        Ok(())
    }

    pub fn read(path: &Path) -> StorageResult<Self> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::TilesNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Metadata {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionConfig {
        serde_yaml::from_str(
            "{id: philly, name: Philly, bbox: {lon_min: -76.5, lat_min: 38.8, lon_max: -73.5, lat_max: 40.7}}",
        )
        .unwrap()
    }

    fn metadata() -> TileMetadata {
        TileMetadata {
            region_id: "philly".into(),
            model_id: "hrrr".into(),
            run_id: "run_20240115_12".into(),
            variable_id: "t2m".into(),
            lat_min: 38.8,
            lat_max: 40.7,
            lon_min: -76.5,
            lon_max: -73.5,
            resolution_deg: 0.1,
            units: "°F".into(),
            lon_0_360: true,
            index_lon_min: 283.5,
            init_time_utc: Utc::now(),
            generated_at: Utc::now(),
            hours: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_matching_layout_passes() {
        let meta = metadata();
        assert!(meta.check_layout(Path::new("m.json"), &region(), 0.1).is_ok());
        let within = TileMetadata {
            lat_max: 40.7 + 1e-9,
            ..metadata()
        };
        assert!(within.check_layout(Path::new("m.json"), &region(), 0.1).is_ok());
    }

    #[test]
    fn test_any_edge_drift_is_a_mismatch() {
        let drifted = [
            TileMetadata { lat_min: 38.8 + 1e-4, ..metadata() },
            TileMetadata { lat_max: 40.6, ..metadata() },
            TileMetadata { lon_min: -76.4, ..metadata() },
            TileMetadata { lon_max: -73.5 - 1e-5, ..metadata() },
        ];
        for meta in drifted {
            assert!(matches!(
                meta.check_layout(Path::new("m.json"), &region(), 0.1),
                Err(StorageError::LayoutMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_resolution_drift_is_a_mismatch() {
        let err = metadata()
            .check_layout(Path::new("m.json"), &region(), 0.1 + 1e-5)
            .unwrap_err();
        match err {
            StorageError::LayoutMismatch { field, .. } => assert_eq!(field, "resolution_deg"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_json_keys() {
        let value = serde_json::to_value(metadata()).unwrap();
        for key in [
            "lat_min", "lat_max", "lon_min", "lon_max", "resolution_deg", "units",
            "lon_0_360", "index_lon_min", "init_time_utc",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
