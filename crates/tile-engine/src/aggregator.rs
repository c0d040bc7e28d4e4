//! Multi-hour tile aggregation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use forecast_common::{BoundingBox, VariableConfig};
use grib_reader::DatasetReader;
use tracing::{info, instrument, warn};

use crate::cell_index::CellIndex;
use crate::error::{Result, TileError};
use crate::reduce::reduce_cells;
use crate::select::select_field;
use crate::types::{CellStats, TileStack};

/// Reduces per-hour native artifacts into a [`TileStack`].
///
/// Aggregation is synchronous CPU work; async callers should run it on a
/// blocking thread.
#[derive(Clone)]
pub struct TileAggregator {
    reader: Arc<dyn DatasetReader>,
}

impl TileAggregator {
    pub fn new(reader: Arc<dyn DatasetReader>) -> Self {
        Self { reader }
    }

    /// Build stacked tiles for one variable from whichever hours are present.
    ///
    /// The cell index is built from the first hour that opens and reused for
    /// the rest. An hour that fails to open, lacks the field, or does not
    /// match the indexed grid is skipped with a warning. The build fails only
    /// when no hour could be reduced.
    #[instrument(skip(self, hour_paths, variable), fields(variable = %variable.id, hours = hour_paths.len()))]
    pub fn build_tiles(
        &self,
        hour_paths: &BTreeMap<u32, PathBuf>,
        variable: &VariableConfig,
        bbox: &BoundingBox,
        resolution_deg: f64,
    ) -> Result<TileStack> {
        if hour_paths.is_empty() {
            return Err(TileError::EmptyHourMap);
        }

        let mut index: Option<CellIndex> = None;
        let mut reduced: Vec<(u32, CellStats)> = Vec::with_capacity(hour_paths.len());
        let mut skipped: Vec<u32> = Vec::new();

        for (&hour, path) in hour_paths {
            let dataset = match self.reader.open(path) {
                Ok(ds) => ds,
                Err(e) => {
                    warn!(hour, path = %path.display(), error = %e, "Skipping hour: failed to open");
                    skipped.push(hour);
                    continue;
                }
            };

            if index.is_none() {
                // Geometry problems affect every hour equally, so they are fatal
                index = Some(CellIndex::build(&dataset.lats, &dataset.lons, bbox, resolution_deg)?);
            }
            let Some(index) = index.as_ref() else {
                continue;
            };

            let stats = select_field(&dataset, variable)
                .and_then(|selected| reduce_cells(index, &selected.values));
            match stats {
                Ok(stats) => reduced.push((hour, stats)),
                Err(e) => {
                    warn!(hour, path = %path.display(), error = %e, "Skipping hour: failed to reduce");
                    skipped.push(hour);
                }
            }
        }

        let Some(index) = index else {
            return Err(TileError::NoHoursReduced {
                attempted: hour_paths.len(),
            });
        };
        if reduced.is_empty() {
            return Err(TileError::NoHoursReduced {
                attempted: hour_paths.len(),
            });
        }

        info!(
            succeeded = reduced.len(),
            failed = skipped.len(),
            rows = index.meta().rows,
            cols = index.meta().cols,
            "Aggregated tiles"
        );

        Ok(TileStack::from_hours(*index.meta(), reduced, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grib_reader::{NativeDataset, NativeField, ReaderError, ReaderResult};
    use std::collections::HashMap;
    use std::path::Path;

    /// Serves datasets from memory keyed by path.
    struct MapReader(HashMap<PathBuf, NativeDataset>);

    impl DatasetReader for MapReader {
        fn open(&self, path: &Path) -> ReaderResult<NativeDataset> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| ReaderError::Empty(path.to_path_buf()))
        }
    }

    fn dataset(value: f32) -> NativeDataset {
        NativeDataset {
            lats: vec![0.5, 1.5],
            lons: vec![0.5, 0.5],
            fields: vec![NativeField {
                name: "refc".into(),
                units: None,
                values: vec![value, value * 2.0],
            }],
        }
    }

    fn variable() -> VariableConfig {
        serde_yaml::from_str("{id: refc, display_name: R, units: dBZ, field: refc}").unwrap()
    }

    #[test]
    fn test_missing_hours_are_skipped() {
        let mut data = HashMap::new();
        data.insert(PathBuf::from("h1"), dataset(1.0));
        data.insert(PathBuf::from("h3"), dataset(3.0));
        let aggregator = TileAggregator::new(Arc::new(MapReader(data)));

        let mut paths = BTreeMap::new();
        paths.insert(3, PathBuf::from("h3"));
        paths.insert(2, PathBuf::from("missing"));
        paths.insert(1, PathBuf::from("h1"));

        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 2.0);
        let stack = aggregator.build_tiles(&paths, &variable(), &bbox, 1.0).unwrap();
        assert_eq!(stack.hours, vec![1, 3]);
        assert_eq!(stack.skipped_hours, vec![2]);
        assert_eq!(stack.means.shape(), &[2, 2, 1]);
        assert_eq!(stack.means[[1, 1, 0]], 6.0);
    }

    #[test]
    fn test_all_hours_failing_is_an_error() {
        let aggregator = TileAggregator::new(Arc::new(MapReader(HashMap::new())));
        let mut paths = BTreeMap::new();
        paths.insert(1, PathBuf::from("nope"));

        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 2.0);
        let err = aggregator.build_tiles(&paths, &variable(), &bbox, 1.0).unwrap_err();
        assert!(matches!(err, TileError::NoHoursReduced { attempted: 1 }));

        let err = aggregator
            .build_tiles(&BTreeMap::new(), &variable(), &bbox, 1.0)
            .unwrap_err();
        assert!(matches!(err, TileError::EmptyHourMap));
    }
}
