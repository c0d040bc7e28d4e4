//! Core types for tile aggregation.

use std::str::FromStr;

use forecast_common::BoundingBox;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-cell statistic stored in a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Min,
    Max,
    Mean,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Min => "min",
            Stat::Max => "max",
            Stat::Mean => "mean",
        }
    }
}

impl FromStr for Stat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" => Ok(Stat::Min),
            "max" => Ok(Stat::Max),
            "mean" => Ok(Stat::Mean),
            other => Err(format!("unknown stat '{other}' (expected min, max or mean)")),
        }
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How native points were mapped onto the destination grid.
///
/// Point queries repeat the same normalization: a longitude is shifted by
/// +360 when `lon_0_360` is set and the query is negative, then indexed
/// against `index_lon_min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Requested bounds, as configured for the region.
    pub bbox: BoundingBox,
    pub resolution_deg: f64,
    pub rows: usize,
    pub cols: usize,
    /// Whether the native grid reported longitudes in 0..360.
    pub lon_0_360: bool,
    /// West edge used for column indexing, in the native convention.
    pub index_lon_min: f64,
}

impl IndexMeta {
    /// Row/column owning a point, clamped into the grid.
    pub fn cell_for_point(&self, lat: f64, lon: f64) -> (usize, usize) {
        let lon = normalize_query_lon(lon, self.lon_0_360);
        let row = ((lat - self.bbox.min_lat) / self.resolution_deg).floor();
        let col = ((lon - self.index_lon_min) / self.resolution_deg).floor();
        (clamp_index(row, self.rows), clamp_index(col, self.cols))
    }
}

/// Shift a query longitude into the native convention.
pub fn normalize_query_lon(lon: f64, lon_0_360: bool) -> f64 {
    if lon_0_360 && lon < 0.0 {
        lon + 360.0
    } else if !lon_0_360 && lon >= 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

fn clamp_index(value: f64, len: usize) -> usize {
    if len == 0 || !value.is_finite() || value < 0.0 {
        return 0;
    }
    (value as usize).min(len - 1)
}

/// One hour's reduction: `[rows, cols]` arrays, NaN where a cell is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CellStats {
    pub mins: Array2<f32>,
    pub maxs: Array2<f32>,
    pub means: Array2<f32>,
}

/// Stacked per-hour reductions for one variable of one run.
///
/// Arrays are indexed `[hour_index, row, col]`; `hours` is ascending and
/// `hours[k]` is the forecast hour of slice `k`. Row 0 is the southern edge.
#[derive(Debug, Clone, PartialEq)]
pub struct TileStack {
    pub mins: Array3<f32>,
    pub maxs: Array3<f32>,
    pub means: Array3<f32>,
    pub hours: Vec<u32>,
    pub index: IndexMeta,
    /// Hours that were supplied but could not be opened or reduced.
    pub skipped_hours: Vec<u32>,
}

impl TileStack {
    /// Stack per-hour reductions ordered by hour.
    pub fn from_hours(index: IndexMeta, mut reduced: Vec<(u32, CellStats)>, skipped_hours: Vec<u32>) -> Self {
        reduced.sort_by_key(|(hour, _)| *hour);
        let shape = (reduced.len(), index.rows, index.cols);
        let mut mins = Array3::from_elem(shape, f32::NAN);
        let mut maxs = Array3::from_elem(shape, f32::NAN);
        let mut means = Array3::from_elem(shape, f32::NAN);

        let mut hours = Vec::with_capacity(reduced.len());
        for (k, (hour, stats)) in reduced.into_iter().enumerate() {
            mins.index_axis_mut(Axis(0), k).assign(&stats.mins);
            maxs.index_axis_mut(Axis(0), k).assign(&stats.maxs);
            means.index_axis_mut(Axis(0), k).assign(&stats.means);
            hours.push(hour);
        }

        Self {
            mins,
            maxs,
            means,
            hours,
            index,
            skipped_hours,
        }
    }

    pub fn stat(&self, stat: Stat) -> &Array3<f32> {
        match stat {
            Stat::Min => &self.mins,
            Stat::Max => &self.maxs,
            Stat::Mean => &self.means,
        }
    }

    /// One hour's grid for a statistic.
    pub fn slice(&self, hour: u32, stat: Stat) -> Option<ArrayView2<'_, f32>> {
        let k = self.hours.iter().position(|&h| h == hour)?;
        Some(self.stat(stat).index_axis(Axis(0), k))
    }

    /// Series of a statistic at one cell across all hours.
    pub fn series(&self, row: usize, col: usize, stat: Stat) -> Vec<f32> {
        let arr = self.stat(stat);
        (0..self.hours.len()).map(|k| arr[[k, row, col]]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(lon_0_360: bool) -> IndexMeta {
        IndexMeta {
            bbox: BoundingBox::new(-75.0, 38.0, -74.0, 39.0),
            resolution_deg: 0.1,
            rows: 10,
            cols: 10,
            lon_0_360,
            index_lon_min: if lon_0_360 { 285.0 } else { -75.0 },
        }
    }

    #[test]
    fn test_stat_parse() {
        assert_eq!("MEAN".parse::<Stat>().unwrap(), Stat::Mean);
        assert!("median".parse::<Stat>().is_err());
        assert_eq!(Stat::Max.to_string(), "max");
    }

    #[test]
    fn test_cell_for_point_clamps() {
        let m = meta(false);
        assert_eq!(m.cell_for_point(38.05, -74.95), (0, 0));
        assert_eq!(m.cell_for_point(30.0, -80.0), (0, 0));
        assert_eq!(m.cell_for_point(45.0, -60.0), (9, 9));
    }

    #[test]
    fn test_cell_for_point_same_in_both_conventions() {
        let signed = meta(false);
        let shifted = meta(true);
        for (lat, lon) in [(38.55, -74.45), (38.95, -74.05), (38.01, -74.99)] {
            assert_eq!(signed.cell_for_point(lat, lon), shifted.cell_for_point(lat, lon));
        }
        assert_eq!(shifted.cell_for_point(38.55, 285.55), (5, 5));
    }

    #[test]
    fn test_from_hours_orders_by_hour() {
        let m = IndexMeta { rows: 1, cols: 1, ..meta(false) };
        let stats = |v: f32| CellStats {
            mins: Array2::from_elem((1, 1), v),
            maxs: Array2::from_elem((1, 1), v),
            means: Array2::from_elem((1, 1), v),
        };
        let stack = TileStack::from_hours(m, vec![(6, stats(6.0)), (1, stats(1.0)), (3, stats(3.0))], vec![]);
        assert_eq!(stack.hours, vec![1, 3, 6]);
        assert_eq!(stack.series(0, 0, Stat::Mean), vec![1.0, 3.0, 6.0]);
        assert_eq!(stack.slice(3, Stat::Min).unwrap()[[0, 0]], 3.0);
        assert!(stack.slice(2, Stat::Min).is_none());
    }
}
