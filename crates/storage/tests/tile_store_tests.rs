//! Aggregate synthetic grids, persist them, and query them back.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use forecast_common::BoundingBox;
use storage::{snowfall_for_point, CacheLayout, DEFAULT_SNOW_RATIO, FsTileStore, RunState, TileKey, TileRepository};
use test_utils::{
    assert_approx_eq, hourly_model, lat_plus_hour_dataset, raw_variable, test_region, write_dataset,
    Lattice, SyntheticReader, TEST_BBOX, TEST_RESOLUTION,
};
use tile_engine::{Stat, TileAggregator, TileStack};

fn build(dir: &std::path::Path, field: &str, hours: &[u32], lattice: Lattice) -> TileStack {
    let mut paths = BTreeMap::new();
    for &hour in hours {
        let path = dir.join(field).join(format!("grib_{hour:02}.grib2"));
        write_dataset(&path, &lat_plus_hour_dataset(&lattice, field, None, hour)).unwrap();
        paths.insert(hour, path);
    }
    let (min_lon, min_lat, max_lon, max_lat) = TEST_BBOX;
    TileAggregator::new(Arc::new(SyntheticReader))
        .build_tiles(
            &paths,
            &raw_variable(field, field),
            &BoundingBox::new(min_lon, min_lat, max_lon, max_lat),
            TEST_RESOLUTION,
        )
        .unwrap()
}

fn store(dir: &std::path::Path) -> FsTileStore {
    FsTileStore::new(CacheLayout::new(dir.join("grib"), dir.join("tiles")))
}

// =============================================================================
// Point Round Trip
// =============================================================================

#[test]
fn test_point_series_is_cell_lat_plus_hour() {
    let dir = tempfile::tempdir().unwrap();
    let stack = build(dir.path(), "refc", &[1, 2, 3, 4], Lattice::new(38.0, -75.0, 0.05, 20, 20));
    let store = store(dir.path());
    let key = TileKey::new("test", TEST_RESOLUTION, "hrrr", "run_20240115_12", "refc");
    let init = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    store.save_tiles(&key, &stack, "raw", init).unwrap();

    let series = store.load_timeseries_for_point(&key, 38.55, -74.45, Stat::Mean).unwrap();
    assert_eq!(series.hours, vec![1, 2, 3, 4]);
    for (value, hour) in series.values.iter().zip(series.hours.iter()) {
        assert_approx_eq!(*value, 38.55 + *hour as f64, 1e-3);
    }

    let meta = store.load_metadata(&key).unwrap();
    assert_eq!(meta.init_time_utc, init);
    assert!(!meta.lon_0_360);
}

#[test]
fn test_point_query_on_0_360_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = Lattice::new(38.0, -75.0, 0.05, 20, 20).shifted_0_360();
    let stack = build(dir.path(), "refc", &[1], lattice);
    let store = store(dir.path());
    let key = TileKey::new("test", TEST_RESOLUTION, "gfs", "run_20240115_12", "refc");
    store.save_tiles(&key, &stack, "raw", Utc::now()).unwrap();

    let meta = store.load_metadata(&key).unwrap();
    assert!(meta.lon_0_360);
    assert_approx_eq!(meta.index_lon_min, 285.0, 1e-9);
    assert_approx_eq!(meta.lon_min, -75.0, 1e-9);

    let signed = store.load_timeseries_for_point(&key, 38.55, -74.45, Stat::Mean).unwrap();
    let shifted = store.load_timeseries_for_point(&key, 38.55, 285.55, Stat::Mean).unwrap();
    assert_eq!((signed.row, signed.col), (5, 5));
    assert_eq!(signed, shifted);
}

// =============================================================================
// Validity and Status
// =============================================================================

#[test]
fn test_region_validity_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = Lattice::new(38.0, -75.0, 0.05, 20, 20);
    let hours: Vec<u32> = (1..=22).collect();
    let stack = build(dir.path(), "refc", &hours, lattice);
    let store = store(dir.path());
    let key = TileKey::new("test", TEST_RESOLUTION, "hrrr", "run_20240115_12", "refc");
    store.save_tiles(&key, &stack, "raw", Utc::now()).unwrap();

    let region = test_region();
    assert!(store.is_tile_valid(&key, &region, TEST_RESOLUTION));
    assert!(!store.is_tile_valid(&key, &region, 0.25));

    let expected: Vec<u32> = (1..=24).collect();
    assert!(!store.is_complete(&key, &expected).unwrap());

    let model = hourly_model("hrrr");
    let statuses = store.cache_status("test", TEST_RESOLUTION, [&model], "refc").unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].hours_present, 22);
    assert_eq!(statuses[0].expected_hours, 24);
    assert_eq!(statuses[0].status, RunState::Complete);
    assert_eq!(statuses[0].variables, vec!["refc"]);
    assert!(statuses[0].last_modified.is_some());
}

// =============================================================================
// Derived Snowfall
// =============================================================================

#[test]
fn test_snowfall_from_stored_series() {
    let dir = tempfile::tempdir().unwrap();
    let lattice = Lattice::new(38.0, -75.0, 0.05, 20, 20);
    let store = store(dir.path());
    let run = TileKey::new("test", TEST_RESOLUTION, "hrrr", "run_20240115_12", "");

    // apcp = lat + hour rises by 1 per hour; csnow = lat + hour is always >= 0.5
    let apcp = build(dir.path(), "apcp", &[1, 2, 3], lattice);
    let csnow = build(dir.path(), "csnow", &[2, 3], lattice);
    store.save_tiles(&run.with_variable("apcp"), &apcp, "in", Utc::now()).unwrap();
    store.save_tiles(&run.with_variable("csnow"), &csnow, "-", Utc::now()).unwrap();

    let snow = snowfall_for_point(&store, &run, 38.55, -74.45, None).unwrap();
    assert_eq!(snow.hours, vec![2, 3]);
    assert_eq!(snow.ratio, DEFAULT_SNOW_RATIO);
    // First aligned step counts the full accumulation, the next its difference
    assert_approx_eq!(snow.increments[0], (38.55 + 2.0) * 10.0, 1e-2);
    assert_approx_eq!(snow.increments[1], 10.0, 1e-2);

    let wet = snowfall_for_point(&store, &run, 38.55, -74.45, Some(5.0)).unwrap();
    assert_approx_eq!(wet.increments[1], 5.0, 1e-2);
    assert_approx_eq!(wet.cumulative[1], (38.55 + 2.0) * 5.0 + 5.0, 1e-2);
}
