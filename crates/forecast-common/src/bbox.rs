//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

/// Default tolerance (degrees) used when comparing persisted bounds against
/// requested bounds.
pub const BOUNDS_TOLERANCE_DEG: f64 = 1e-6;

/// A geographic bounding box in degrees.
///
/// Longitudes may be expressed in either the -180..180 or the 0..360
/// convention; the box itself does not normalize. Callers that mix
/// conventions use [`BoundingBox::aligned_to`] to shift the box into the
/// convention of a native grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(alias = "lon_min")]
    pub min_lon: f64,
    #[serde(alias = "lat_min")]
    pub min_lat: f64,
    #[serde(alias = "lon_max")]
    pub max_lon: f64,
    #[serde(alias = "lat_max")]
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Width of the bounding box in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height of the bounding box in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Check that the box has positive extent on both axes.
    pub fn is_valid(&self) -> bool {
        self.min_lon < self.max_lon && self.min_lat < self.max_lat
    }

    /// Half-open containment test: `[min, max)` on both axes.
    ///
    /// Half-open bounds guarantee that a point on a shared edge belongs to
    /// exactly one of two adjacent boxes.
    pub fn contains_half_open(&self, lon: f64, lat: f64) -> bool {
        lat >= self.min_lat && lat < self.max_lat && lon >= self.min_lon && lon < self.max_lon
    }

    /// Number of (rows, cols) of a uniform grid with the given resolution.
    ///
    /// Partial cells at the north/east edges count as full cells. A tiny
    /// epsilon keeps exact multiples (1.1 / 0.1) from rounding up an extra cell.
    pub fn grid_shape(&self, resolution_deg: f64) -> (usize, usize) {
        let cells = |extent: f64| ((extent / resolution_deg) - 1e-9).ceil().max(0.0) as usize;
        (cells(self.height()), cells(self.width()))
    }

    /// Shift this box so its longitudes use the same convention as a native
    /// grid whose smallest longitude is `native_min_lon`.
    ///
    /// Returns the (possibly shifted) box and whether the native grid uses
    /// the 0..360 convention.
    pub fn aligned_to(&self, native_min_lon: f64) -> (BoundingBox, bool) {
        let native_0_360 = native_min_lon >= 0.0;
        if native_0_360 && self.min_lon < 0.0 {
            let shifted = BoundingBox {
                min_lon: self.min_lon + 360.0,
                max_lon: self.max_lon + 360.0,
                ..*self
            };
            return (shifted, true);
        }
        if !native_0_360 && self.min_lon >= 180.0 {
            let shifted = BoundingBox {
                min_lon: self.min_lon - 360.0,
                max_lon: self.max_lon - 360.0,
                ..*self
            };
            return (shifted, false);
        }
        (*self, native_0_360)
    }

    /// Compare all four edges against another box within `tolerance` degrees.
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.min_lon - other.min_lon).abs() <= tolerance
            && (self.min_lat - other.min_lat).abs() <= tolerance
            && (self.max_lon - other.max_lon).abs() <= tolerance
            && (self.max_lat - other.max_lat).abs() <= tolerance
    }

    /// Smallest box covering both boxes. Both must use the same longitude
    /// convention.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// NOMADS filter query fragment selecting this box.
    pub fn to_filter_query(&self) -> String {
        format!(
            "leftlon={}&rightlon={}&toplat={}&bottomlat={}",
            self.min_lon, self.max_lon, self.max_lat, self.min_lat
        )
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}
