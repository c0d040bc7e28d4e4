//! Native grid point to destination cell mapping.
//!
//! Built once per native grid and reused for every hour of a run. Points are
//! sorted by destination cell so each cell's points form one contiguous
//! segment; reductions then walk the segments without any hashing.

use forecast_common::BoundingBox;
use tracing::debug;

use crate::error::{Result, TileError};
use crate::types::IndexMeta;

/// Precomputed mapping from native points to destination cells.
#[derive(Debug, Clone)]
pub struct CellIndex {
    meta: IndexMeta,
    /// Native point count the index was built for.
    n_points: usize,
    /// Indices of in-bounds native points, sorted by cell id.
    order: Vec<usize>,
    /// Start offset into `order` of each occupied cell's segment.
    starts: Vec<usize>,
    /// Cell id (`row * cols + col`) of each segment.
    cell_ids: Vec<usize>,
}

impl CellIndex {
    /// Build the index for native coordinates against a requested region.
    ///
    /// The target bounds are shifted into the native longitude convention;
    /// native coordinates are never modified. Points outside the half-open
    /// bounds are dropped rather than clamped into edge cells.
    pub fn build(lats: &[f64], lons: &[f64], bbox: &BoundingBox, resolution_deg: f64) -> Result<Self> {
        if !(resolution_deg.is_finite() && resolution_deg > 0.0) {
            return Err(TileError::InvalidResolution(resolution_deg));
        }
        if lats.len() != lons.len() {
            return Err(TileError::ShapeMismatch {
                expected: lats.len(),
                actual: lons.len(),
            });
        }

        let native_min_lon = lons
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::INFINITY, f64::min);
        let native_min_lon = if native_min_lon.is_finite() { native_min_lon } else { 0.0 };

        let (target, lon_0_360) = bbox.aligned_to(native_min_lon);
        let (rows, cols) = bbox.grid_shape(resolution_deg);

        let mut assigned: Vec<(usize, usize)> = Vec::new();
        for (i, (&lat, &lon)) in lats.iter().zip(lons.iter()).enumerate() {
            if !target.contains_half_open(lon, lat) {
                continue;
            }
            let row = ((lat - target.min_lat) / resolution_deg).floor() as usize;
            let col = ((lon - target.min_lon) / resolution_deg).floor() as usize;
            if row >= rows || col >= cols {
                continue;
            }
            assigned.push((row * cols + col, i));
        }

        if assigned.is_empty() {
            return Err(TileError::NoPointsInBounds(bbox.to_string()));
        }

        // Stable sort keeps native order within a cell
        assigned.sort_by_key(|&(cell, _)| cell);

        let mut order = Vec::with_capacity(assigned.len());
        let mut starts = Vec::new();
        let mut cell_ids = Vec::new();
        for (pos, &(cell, point)) in assigned.iter().enumerate() {
            if cell_ids.last() != Some(&cell) {
                starts.push(pos);
                cell_ids.push(cell);
            }
            order.push(point);
        }

        debug!(
            points = lats.len(),
            in_bounds = order.len(),
            cells = cell_ids.len(),
            rows,
            cols,
            lon_0_360,
            "Built cell index"
        );

        Ok(Self {
            meta: IndexMeta {
                bbox: *bbox,
                resolution_deg,
                rows,
                cols,
                lon_0_360,
                index_lon_min: target.min_lon,
            },
            n_points: lats.len(),
            order,
            starts,
            cell_ids,
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Number of native points that landed inside the bounds.
    pub fn n_in_bounds(&self) -> usize {
        self.order.len()
    }

    /// Number of cells with at least one native point.
    pub fn n_occupied(&self) -> usize {
        self.cell_ids.len()
    }

    /// Iterate `(cell_id, native point indices)` per occupied cell.
    pub fn segments(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.starts.iter().enumerate().map(move |(seg, &start)| {
            let end = self.starts.get(seg + 1).copied().unwrap_or(self.order.len());
            (self.cell_ids[seg], &self.order[start..end])
        })
    }

    /// Destination cell of every native point (`None` when out of bounds).
    pub fn assignments(&self) -> Vec<Option<usize>> {
        let mut out = vec![None; self.n_points];
        for (cell, points) in self.segments() {
            for &p in points {
                out[p] = Some(cell);
            }
        }
        out
    }
}
