//! Spatial tile aggregation.
//!
//! Reduces irregular native grids into a uniform lat/lon cell grid, keeping
//! the min, max and mean of every cell for every forecast hour.
//!
//! # Architecture
//!
//! ```text
//! hour -> artifact path (sparse)
//!      │
//!      ▼
//! TileAggregator::build_tiles
//!      │
//!      ├─► open first hour, build CellIndex once
//!      │
//!      ├─► per hour: select field ─► convert units ─► reduce_cells
//!      │         │
//!      │         └─► failure: skip hour with a warning
//!      │
//!      └─► stack reductions by ascending hour
//!               │
//!               ▼
//!          TileStack [hours, rows, cols]
//! ```

pub mod aggregator;
pub mod cell_index;
pub mod error;
pub mod reduce;
pub mod select;
pub mod types;

// Re-export commonly used types at crate root
pub use aggregator::TileAggregator;
pub use cell_index::CellIndex;
pub use error::{Result, TileError};
pub use reduce::reduce_cells;
pub use select::{find_field, select_field, SelectedField};
pub use types::{normalize_query_lon, CellStats, IndexMeta, Stat, TileStack};
