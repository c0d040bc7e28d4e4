//! Storage for forecast artifacts and tiles.
//!
//! Provides:
//! - The on-disk key space for raw artifacts and tiles
//! - Path-scoped advisory locks for race-safe publish
//! - Tile persistence (`.npz` + `.meta.json`) with point and grid queries
//! - Catalog listing straight from the directory tree
//! - Cache status, latest-run pointers and run retention

pub mod derived;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod path_lock;
pub mod retention;
pub mod status;
pub mod tile_store;

pub use derived::{accumulate_snowfall, snowfall_for_point, SnowfallSeries, DEFAULT_SNOW_RATIO};
pub use error::{StorageError, StorageResult};
pub use layout::{artifact_file_name, is_temp_file, temp_sibling, CacheLayout, TileKey};
pub use metadata::TileMetadata;
pub use path_lock::{lock_path_for, PathLock};
pub use retention::{DiskUsage, RetentionManager};
pub use status::{RunState, RunStatus};
pub use tile_store::{FsTileStore, GridSlice, PointSeries, StoredTiles, TileRepository};
