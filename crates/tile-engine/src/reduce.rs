//! Per-cell min/max/mean reduction over a [`CellIndex`].

use ndarray::Array2;

use crate::cell_index::CellIndex;
use crate::error::{Result, TileError};
use crate::types::CellStats;

/// Reduce one hour's flat native values into per-cell statistics.
///
/// Non-finite native values are ignored. A cell with no finite values stays
/// NaN in all three outputs; it is never filled with zero.
pub fn reduce_cells(index: &CellIndex, values: &[f32]) -> Result<CellStats> {
    if values.len() != index.n_points() {
        return Err(TileError::ShapeMismatch {
            expected: index.n_points(),
            actual: values.len(),
        });
    }

    let meta = index.meta();
    let shape = (meta.rows, meta.cols);
    let mut mins = Array2::from_elem(shape, f32::NAN);
    let mut maxs = Array2::from_elem(shape, f32::NAN);
    let mut means = Array2::from_elem(shape, f32::NAN);

    for (cell, points) in index.segments() {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut count = 0usize;

        for &p in points {
            let v = values[p];
            if !v.is_finite() {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            count += 1;
        }

        if count == 0 {
            continue;
        }

        let (row, col) = (cell / meta.cols, cell % meta.cols);
        mins[[row, col]] = min;
        maxs[[row, col]] = max;
        means[[row, col]] = (sum / count as f64) as f32;
    }

    Ok(CellStats { mins, maxs, means })
}
