//! Lambert Conformal Conic projection.
//!
//! Used for the CONUS convection-allowing grids (HRRR, NAM nest). Computes
//! the latitude/longitude of every grid point from template 3.30 parameters.

use std::f64::consts::PI;

use crate::sections::{LambertTemplate, EARTH_RADIUS_M};

/// Lambert Conformal Conic projection anchored at the first grid point.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian (LoV) in radians
    lon0: f64,
    /// Longitude of first grid point in radians
    lon1: f64,
    dx: f64,
    dy: f64,
    /// Cone constant (n)
    n: f64,
    /// F constant
    f: f64,
    /// Rho at first grid point
    rho0: f64,
}

impl LambertConformal {
    /// Build the projection from GRIB2 template values (degrees, meters).
    pub fn new(lat1_deg: f64, lon1_deg: f64, lov_deg: f64, latin1_deg: f64, latin2_deg: f64, dx: f64, dy: f64) -> Self {
        let to_rad = PI / 180.0;

        let lat1 = lat1_deg * to_rad;
        let lon1 = lon1_deg * to_rad;
        let lon0 = lov_deg * to_rad;
        let latin1 = latin1_deg * to_rad;
        let latin2 = latin2_deg * to_rad;

        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone
            latin1.sin()
        } else {
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio = ((PI / 4.0 + latin2 / 2.0).tan() / (PI / 4.0 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };

        let f = (latin1.cos() * (PI / 4.0 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = EARTH_RADIUS_M * f / (PI / 4.0 + lat1 / 2.0).tan().powf(n);

        Self {
            lon0,
            lon1,
            dx,
            dy,
            n,
            f,
            rho0,
        }
    }

    pub fn from_template(t: &LambertTemplate) -> Self {
        Self::new(t.lat1, t.lon1, t.lov, t.latin1, t.latin2, t.dx_m, t.dy_m)
    }

    fn origin(&self) -> (f64, f64) {
        let mut dlon0 = self.lon1 - self.lon0;
        while dlon0 > PI {
            dlon0 -= 2.0 * PI;
        }
        while dlon0 < -PI {
            dlon0 += 2.0 * PI;
        }
        let theta0 = self.n * dlon0;
        (self.rho0 * theta0.sin(), self.rho0 - self.rho0 * theta0.cos())
    }

    /// Convert grid indices (i, j) to (lat, lon) in degrees.
    ///
    /// Longitude keeps the convention of LoV (0..360 for NCEP grids).
    pub fn grid_to_geo(&self, i: f64, j: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let (x0, y0) = self.origin();

        let x = x0 + i * self.dx;
        let y = y0 + j * self.dy;

        let rho = (x * x + (self.rho0 - y) * (self.rho0 - y)).sqrt();
        let rho = if self.n < 0.0 { -rho } else { rho };
        let theta = (x / (self.rho0 - y)).atan();

        let lat = 2.0 * ((EARTH_RADIUS_M * self.f / rho).powf(1.0 / self.n)).atan() - PI / 2.0;
        let lon = self.lon0 + theta / self.n;

        (lat * to_deg, lon * to_deg)
    }
}

/// Coordinates of every point of a Lambert grid in decoded-value order.
///
/// Honors the scanning-mode bits for i direction (0x80) and j direction (0x40);
/// rows are assumed consecutive along i.
pub fn grid_coordinates(t: &LambertTemplate) -> (Vec<f64>, Vec<f64>) {
    let proj = LambertConformal::from_template(t);
    let i_sign = if t.scanning_mode & 0x80 != 0 { -1.0 } else { 1.0 };
    let j_sign = if t.scanning_mode & 0x40 != 0 { 1.0 } else { -1.0 };

    let total = t.nx * t.ny;
    let mut lats = Vec::with_capacity(total);
    let mut lons = Vec::with_capacity(total);
    for row in 0..t.ny {
        for col in 0..t.nx {
            let (lat, lon) = proj.grid_to_geo(i_sign * col as f64, j_sign * row as f64);
            lats.push(lat);
            lons.push(lon);
        }
    }
    (lats, lons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::tests::hrrr_template;

    #[test]
    fn test_first_point_maps_to_anchor() {
        let t = hrrr_template();
        let proj = LambertConformal::from_template(&t);
        let (lat, lon) = proj.grid_to_geo(0.0, 0.0);
        assert!((lat - 21.138123).abs() < 1e-4, "lat {lat}");
        assert!((lon - 237.280472).abs() < 1e-4, "lon {lon}");
    }

    #[test]
    fn test_hrrr_covers_conus() {
        let t = hrrr_template();
        let proj = LambertConformal::from_template(&t);

        // Grid center sits near Kansas
        let (lat, lon) = proj.grid_to_geo(899.0, 529.0);
        assert!(lat > 35.0 && lat < 42.0, "center lat {lat}");
        assert!(lon > 255.0 && lon < 270.0, "center lon {lon}");

        // Top-right corner is in the northeast Atlantic
        let (lat, lon) = proj.grid_to_geo(1798.0, 1058.0);
        assert!(lat > 45.0, "ne lat {lat}");
        assert!(lon > 290.0, "ne lon {lon}");
    }

    #[test]
    fn test_grid_coordinates_shape() {
        let mut t = hrrr_template();
        t.nx = 4;
        t.ny = 3;
        let (lats, lons) = grid_coordinates(&t);
        assert_eq!(lats.len(), 12);
        assert_eq!(lons.len(), 12);
        // Scanning north: second row is north of the first
        assert!(lats[4] > lats[0]);
        // Scanning east along a row
        assert!(lons[1] > lons[0]);
    }
}
