//! Native gridded dataset reading.
//!
//! A [`DatasetReader`] opens one downloaded artifact and fully decodes every
//! field it contains, returning flat coordinate and value arrays in native
//! point order. The GRIB2 implementation lives in [`grib2::GribReader`];
//! tests substitute lightweight readers through the same trait.

pub mod error;
pub mod grib2;
pub mod lambert;
pub mod sections;
pub mod tables;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use grib2::GribReader;
pub use error::{ReaderError, ReaderResult};
pub use tables::{ParameterInfo, ParameterTable};

/// One decoded field on the native grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeField {
    pub name: String,
    #[serde(default)]
    pub units: Option<String>,
    pub values: Vec<f32>,
}

/// A fully materialized native dataset.
///
/// `lats`, `lons` and every field's `values` share one flat point order,
/// whatever the grid's projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeDataset {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub fields: Vec<NativeField>,
}

impl NativeDataset {
    /// Build a dataset, checking that all arrays line up.
    pub fn new(lats: Vec<f64>, lons: Vec<f64>, fields: Vec<NativeField>) -> ReaderResult<Self> {
        let dataset = Self { lats, lons, fields };
        dataset.check()?;
        Ok(dataset)
    }

    /// Verify coordinate and value lengths.
    pub fn check(&self) -> ReaderResult<()> {
        let points = self.lats.len();
        if self.lons.len() != points {
            return Err(ReaderError::LengthMismatch {
                field: "lon".to_string(),
                values: self.lons.len(),
                points,
            });
        }
        for field in &self.fields {
            if field.values.len() != points {
                return Err(ReaderError::LengthMismatch {
                    field: field.name.clone(),
                    values: field.values.len(),
                    points,
                });
            }
        }
        Ok(())
    }

    /// Number of native grid points.
    pub fn len(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }

    /// Find a field by exact name.
    pub fn field(&self, name: &str) -> Option<&NativeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Smallest finite native longitude, used to detect the 0..360 convention.
    pub fn min_lon(&self) -> Option<f64> {
        self.lons
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }
}

/// Opens and fully decodes a native dataset file.
///
/// Implementations must decode every value so that a truncated or corrupt
/// file fails here rather than later during aggregation.
pub trait DatasetReader: Send + Sync {
    fn open(&self, path: &Path) -> ReaderResult<NativeDataset>;
}
