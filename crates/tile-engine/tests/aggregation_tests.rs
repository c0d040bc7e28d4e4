//! End-to-end aggregation tests over synthetic native grids.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use forecast_common::BoundingBox;
use grib_reader::NativeDataset;
use test_utils::{
    assert_approx_eq, lat_plus_hour_dataset, raw_variable, vector_dataset, wind_variable,
    write_dataset, Lattice, SyntheticReader, TEST_BBOX, TEST_RESOLUTION,
};
use tile_engine::{Stat, TileAggregator, TileError};

fn test_bbox() -> BoundingBox {
    let (min_lon, min_lat, max_lon, max_lat) = TEST_BBOX;
    BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
}

/// Four native points per 0.1 degree cell, centered on the cell.
fn fine_lattice() -> Lattice {
    Lattice::new(38.0, -75.0, 0.05, 20, 20)
}

fn write_hours(
    dir: &std::path::Path,
    hours: &[u32],
    make: impl Fn(u32) -> NativeDataset,
) -> BTreeMap<u32, PathBuf> {
    hours
        .iter()
        .map(|&hour| {
            let path = dir.join(format!("grib_{hour:02}.grib2"));
            write_dataset(&path, &make(hour)).unwrap();
            (hour, path)
        })
        .collect()
}

fn aggregator() -> TileAggregator {
    TileAggregator::new(Arc::new(SyntheticReader))
}

// =============================================================================
// Value Round Trip
// =============================================================================

#[test]
fn test_mean_of_lat_plus_hour_is_cell_center_plus_hour() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = fine_lattice();
    let paths = write_hours(dir.path(), &[1, 2, 3], |h| {
        lat_plus_hour_dataset(&lattice, "refc", None, h)
    });

    let stack = aggregator()
        .build_tiles(&paths, &raw_variable("refc", "refc"), &test_bbox(), TEST_RESOLUTION)
        .unwrap();

    assert_eq!(stack.hours, vec![1, 2, 3]);
    assert_eq!(stack.means.shape(), &[3, 10, 10]);
    assert!(stack.skipped_hours.is_empty());

    for (k, hour) in stack.hours.iter().enumerate() {
        for row in [0usize, 4, 9] {
            let center_lat = 38.0 + (row as f64 + 0.5) * TEST_RESOLUTION;
            let expected = (center_lat + *hour as f64) as f32;
            assert_approx_eq!(stack.means[[k, row, 5]], expected, 1e-3);
        }
    }

    // Point at (38.55, -74.45) sits in cell (5, 5)
    let (row, col) = stack.index.cell_for_point(38.55, -74.45);
    assert_eq!((row, col), (5, 5));
    let series = stack.series(row, col, Stat::Mean);
    for (value, hour) in series.iter().zip([1.0f32, 2.0, 3.0]) {
        assert_approx_eq!(*value, 38.55 + hour, 1e-3);
    }
}

#[test]
fn test_min_max_bracket_the_mean() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = fine_lattice();
    let paths = write_hours(dir.path(), &[6], |h| {
        lat_plus_hour_dataset(&lattice, "refc", None, h)
    });

    let stack = aggregator()
        .build_tiles(&paths, &raw_variable("refc", "refc"), &test_bbox(), TEST_RESOLUTION)
        .unwrap();

    let min = stack.mins[[0, 2, 2]];
    let max = stack.maxs[[0, 2, 2]];
    let mean = stack.means[[0, 2, 2]];
    assert!(min < mean && mean < max);
    assert_approx_eq!(max - min, 0.05, 1e-3);
}

// =============================================================================
// Longitude Conventions
// =============================================================================

#[test]
fn test_0_360_native_grid_matches_signed_grid() {
    let dir = tempfile::tempdir().unwrap();
    let signed = fine_lattice();
    let shifted = signed.shifted_0_360();

    let signed_paths = write_hours(&dir.path().join("signed"), &[1], |h| {
        lat_plus_hour_dataset(&signed, "refc", None, h)
    });
    let shifted_paths = write_hours(&dir.path().join("shifted"), &[1], |h| {
        lat_plus_hour_dataset(&shifted, "refc", None, h)
    });

    let variable = raw_variable("refc", "refc");
    let a = aggregator()
        .build_tiles(&signed_paths, &variable, &test_bbox(), TEST_RESOLUTION)
        .unwrap();
    let b = aggregator()
        .build_tiles(&shifted_paths, &variable, &test_bbox(), TEST_RESOLUTION)
        .unwrap();

    assert!(!a.index.lon_0_360);
    assert!(b.index.lon_0_360);
    assert_eq!(a.means, b.means);
    assert_eq!(a.index.bbox, b.index.bbox);
    assert_eq!(
        a.index.cell_for_point(38.55, -74.45),
        b.index.cell_for_point(38.55, -74.45)
    );
}

// =============================================================================
// Partial Runs
// =============================================================================

#[test]
fn test_corrupt_hour_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = fine_lattice();
    let mut paths = write_hours(dir.path(), &[1, 3], |h| {
        lat_plus_hour_dataset(&lattice, "refc", None, h)
    });
    let corrupt = dir.path().join("grib_02.grib2");
    std::fs::write(&corrupt, b"{\"lats\": [1.0").unwrap();
    paths.insert(2, corrupt);

    let stack = aggregator()
        .build_tiles(&paths, &raw_variable("refc", "refc"), &test_bbox(), TEST_RESOLUTION)
        .unwrap();

    assert_eq!(stack.hours, vec![1, 3]);
    assert_eq!(stack.skipped_hours, vec![2]);
    assert_eq!(stack.means.shape()[0], 2);
}

#[test]
fn test_region_outside_grid_fails() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = Lattice::new(10.0, 10.0, 0.1, 5, 5);
    let paths = write_hours(dir.path(), &[1], |h| {
        lat_plus_hour_dataset(&lattice, "refc", None, h)
    });

    let err = aggregator()
        .build_tiles(&paths, &raw_variable("refc", "refc"), &test_bbox(), TEST_RESOLUTION)
        .unwrap_err();
    assert!(matches!(err, TileError::NoPointsInBounds(_)));
}

// =============================================================================
// Derived Fields
// =============================================================================

#[test]
fn test_wind_speed_from_components_in_mph() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = fine_lattice();
    let paths = write_hours(dir.path(), &[1], |_| {
        vector_dataset(&lattice, "ugrd", "vgrd", 3.0, 4.0)
    });

    let stack = aggregator()
        .build_tiles(&paths, &wind_variable(), &test_bbox(), TEST_RESOLUTION)
        .unwrap();

    // 5 m/s
    assert_approx_eq!(stack.means[[0, 3, 3]], 11.184_68, 1e-3);
}
