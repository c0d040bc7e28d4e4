//! Synthetic native grids with predictable values.
//!
//! Native points are placed at cell centers of a regular lat/lon lattice so
//! that every point lands unambiguously inside one destination cell.

use grib_reader::{NativeDataset, NativeField};

/// A regular native lattice described by its south-west cell corner.
#[derive(Debug, Clone, Copy)]
pub struct Lattice {
    pub lat_min: f64,
    pub lon_min: f64,
    pub step: f64,
    pub rows: usize,
    pub cols: usize,
}

impl Lattice {
    pub fn new(lat_min: f64, lon_min: f64, step: f64, rows: usize, cols: usize) -> Self {
        Self {
            lat_min,
            lon_min,
            step,
            rows,
            cols,
        }
    }

    /// Flat (lats, lons) of cell centers, row-major from the south-west.
    pub fn points(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lats = Vec::with_capacity(self.rows * self.cols);
        let mut lons = Vec::with_capacity(self.rows * self.cols);
        for row in 0..self.rows {
            for col in 0..self.cols {
                lats.push(self.lat_min + (row as f64 + 0.5) * self.step);
                lons.push(self.lon_min + (col as f64 + 0.5) * self.step);
            }
        }
        (lats, lons)
    }

    /// The same lattice with longitudes expressed in 0..360.
    pub fn shifted_0_360(&self) -> Self {
        Self {
            lon_min: if self.lon_min < 0.0 {
                self.lon_min + 360.0
            } else {
                self.lon_min
            },
            ..*self
        }
    }
}

/// Values `lat + hour` for every point.
pub fn lat_plus_hour(lats: &[f64], hour: u32) -> Vec<f32> {
    lats.iter().map(|lat| (lat + hour as f64) as f32).collect()
}

/// Constant values for every point.
pub fn constant(len: usize, value: f32) -> Vec<f32> {
    vec![value; len]
}

/// One-field dataset on `lattice` with values `lat + hour`.
pub fn lat_plus_hour_dataset(lattice: &Lattice, field: &str, units: Option<&str>, hour: u32) -> NativeDataset {
    let (lats, lons) = lattice.points();
    let values = lat_plus_hour(&lats, hour);
    NativeDataset {
        lats,
        lons,
        fields: vec![NativeField {
            name: field.to_string(),
            units: units.map(str::to_string),
            values,
        }],
    }
}

/// Dataset holding two orthogonal components with constant values.
pub fn vector_dataset(lattice: &Lattice, u_name: &str, v_name: &str, u: f32, v: f32) -> NativeDataset {
    let (lats, lons) = lattice.points();
    let n = lats.len();
    NativeDataset {
        lats,
        lons,
        fields: vec![
            NativeField {
                name: u_name.to_string(),
                units: Some("m s-1".to_string()),
                values: constant(n, u),
            },
            NativeField {
                name: v_name.to_string(),
                units: Some("m s-1".to_string()),
                values: constant(n, v),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_points_are_cell_centers() {
        let lattice = Lattice::new(38.0, -75.0, 0.1, 2, 3);
        let (lats, lons) = lattice.points();
        assert_eq!(lats.len(), 6);
        crate::assert_approx_eq!(lats[0], 38.05, 1e-9);
        crate::assert_approx_eq!(lons[2], -74.75, 1e-9);
        crate::assert_approx_eq!(lats[3], 38.15, 1e-9);
    }

    #[test]
    fn test_shifted_lattice() {
        let lattice = Lattice::new(38.0, -75.0, 0.1, 1, 1).shifted_0_360();
        assert_eq!(lattice.lon_min, 285.0);
    }

    #[test]
    fn test_lat_plus_hour() {
        let values = lat_plus_hour(&[40.0, 41.5], 3);
        assert_eq!(values, vec![43.0, 44.5]);
    }
}
