//! JSON-backed dataset reader for tests.
//!
//! Test artifacts are `NativeDataset` values serialized as JSON. Anything
//! that does not deserialize, including truncated files, fails to open just
//! like a corrupt GRIB2 file would.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use grib_reader::{DatasetReader, NativeDataset, ReaderError, ReaderResult};

/// Reads `NativeDataset` JSON files.
#[derive(Debug, Clone, Default)]
pub struct SyntheticReader;

impl DatasetReader for SyntheticReader {
    fn open(&self, path: &Path) -> ReaderResult<NativeDataset> {
        let file = File::open(path).map_err(|source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset: NativeDataset = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ReaderError::decode(path, e))?;
        dataset.check()?;
        Ok(dataset)
    }
}

/// Serialize a dataset to bytes readable by [`SyntheticReader`].
pub fn encode(dataset: &NativeDataset) -> Vec<u8> {
    serde_json::to_vec(dataset).unwrap_or_default()
}

/// Write a dataset to `path`, creating parent directories.
pub fn write_dataset(path: &Path, dataset: &NativeDataset) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode(dataset))
}
