//! GRIB2 implementation of [`DatasetReader`] on top of the `grib` crate.

use std::io::Cursor;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ReaderError, ReaderResult};
use crate::lambert;
use crate::sections::{self, GridTemplate};
use crate::tables::ParameterTable;
use crate::{DatasetReader, NativeDataset, NativeField};

/// Reads every message of a GRIB2 file into a [`NativeDataset`].
///
/// Coordinates come from the decoder for regular lat/lon grids. Lambert
/// conformal grids are projected locally from the grid definition section.
#[derive(Debug, Clone)]
pub struct GribReader {
    table: ParameterTable,
}

impl Default for GribReader {
    fn default() -> Self {
        Self::new(ParameterTable::ncep())
    }
}

impl GribReader {
    pub fn new(table: ParameterTable) -> Self {
        Self { table }
    }

    fn coordinates_from_sections(path: &Path, bytes: &[u8]) -> ReaderResult<(Vec<f64>, Vec<f64>)> {
        match sections::parse_first_grid(bytes) {
            Some(GridTemplate::Lambert(template)) => {
                debug!(path = %path.display(), nx = template.nx, ny = template.ny, "Projecting Lambert grid");
                Ok(lambert::grid_coordinates(&template))
            }
            Some(GridTemplate::Other(template)) => Err(ReaderError::UnsupportedGrid {
                path: path.to_path_buf(),
                template,
            }),
            None => Err(ReaderError::decode(path, "missing grid definition section")),
        }
    }
}

impl DatasetReader for GribReader {
    fn open(&self, path: &Path) -> ReaderResult<NativeDataset> {
        let bytes = std::fs::read(path).map_err(|source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let grib2 = ::grib::from_reader(Cursor::new(bytes.as_slice()))
            .map_err(|e| ReaderError::decode(path, e))?;

        let mut coords: Option<(Vec<f64>, Vec<f64>)> = None;
        let mut fields = Vec::new();

        for (_index, submsg) in grib2.iter() {
            let discipline = submsg.indicator().discipline;
            let prod_def = submsg.prod_def();
            let (category, number) =
                match (prod_def.parameter_category(), prod_def.parameter_number()) {
                    (Some(c), Some(n)) => (c, n),
                    _ => continue,
                };
            let info = self.table.lookup(discipline, category, number);

            if coords.is_none() {
                coords = Some(match submsg.latlons() {
                    Ok(points) => {
                        let (lats, lons): (Vec<f64>, Vec<f64>) = points
                            .map(|(lat, lon)| (lat as f64, lon as f64))
                            .unzip();
                        (lats, lons)
                    }
                    Err(_) => Self::coordinates_from_sections(path, &bytes)?,
                });
            }

            // Decoding every value is what catches truncated files
            let decoder = ::grib::Grib2SubmessageDecoder::from(submsg)
                .map_err(|e| ReaderError::decode(path, e))?;
            let values: Vec<f32> = decoder
                .dispatch()
                .map_err(|e| ReaderError::decode(path, e))?
                .collect();

            fields.push(NativeField {
                name: info.name,
                units: Some(info.units).filter(|u| !u.is_empty()),
                values,
            });
        }

        let (lats, lons) = coords.ok_or_else(|| ReaderError::Empty(path.to_path_buf()))?;

        let points = lats.len();
        fields.retain(|field| {
            let ok = field.values.len() == points;
            if !ok {
                warn!(
                    path = %path.display(),
                    field = %field.name,
                    values = field.values.len(),
                    points,
                    "Dropping field on a different grid"
                );
            }
            ok
        });

        if fields.is_empty() {
            return Err(ReaderError::Empty(path.to_path_buf()));
        }
        NativeDataset::new(lats, lons, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let reader = GribReader::default();
        let err = reader.open(Path::new("/nonexistent/grib_01.grib2")).unwrap_err();
        assert!(matches!(err, ReaderError::Io { .. }));
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grib_01.grib2");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let reader = GribReader::default();
        assert!(reader.open(&path).is_err());
    }
}
