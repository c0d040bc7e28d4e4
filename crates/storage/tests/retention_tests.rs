//! Retention and disk usage over a populated cache tree.

use std::fs;

use storage::{CacheLayout, RetentionManager};

fn make_runs(root: &std::path::Path, runs: &[&str]) {
    for run in runs {
        let dir = root.join(run).join("t2m");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("grib_01.grib2"), vec![0u8; 1500]).unwrap();
    }
}

const SEVEN_RUNS: [&str; 7] = [
    "run_20240114_12",
    "run_20240114_18",
    "run_20240115_00",
    "run_20240115_06",
    "run_20240115_12",
    "run_20240115_18",
    "run_20240116_00",
];

// =============================================================================
// Tile Runs
// =============================================================================

#[test]
fn test_keep_five_of_seven_removes_two_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path().join("grib"), dir.path().join("tiles"));
    let model_dir = layout.tile_model_dir("philly", 0.1, "hrrr");
    // Out of order on purpose
    let mut shuffled = SEVEN_RUNS;
    shuffled.reverse();
    make_runs(&model_dir, &shuffled);

    let manager = RetentionManager::new(layout.clone());
    let mut removed = manager.cleanup_old_runs("philly", 0.1, "hrrr", 5).unwrap();
    removed.sort();
    assert_eq!(removed, vec!["run_20240114_12", "run_20240114_18"]);

    for run in &SEVEN_RUNS[2..] {
        assert!(model_dir.join(run).join("t2m/grib_01.grib2").exists(), "{run} should remain");
    }
    for run in &SEVEN_RUNS[..2] {
        assert!(!model_dir.join(run).exists(), "{run} should be gone");
    }

    // Idempotent once within the limit
    assert!(manager.cleanup_old_runs("philly", 0.1, "hrrr", 5).unwrap().is_empty());
}

#[test]
fn test_keep_more_than_present_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path().join("grib"), dir.path().join("tiles"));
    make_runs(&layout.tile_model_dir("nyc", 0.1, "nbm"), &SEVEN_RUNS[..3]);

    let manager = RetentionManager::new(layout);
    assert!(manager.cleanup_old_runs("nyc", 0.1, "nbm", 5).unwrap().is_empty());
}

// =============================================================================
// Raw Artifact Runs
// =============================================================================

#[test]
fn test_grib_runs_pruned_per_model() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path().join("grib"), dir.path().join("tiles"));
    make_runs(&layout.grib_model_dir("hrrr"), &SEVEN_RUNS);
    make_runs(&layout.grib_model_dir("gfs"), &SEVEN_RUNS[..2]);

    let manager = RetentionManager::new(layout.clone());
    assert_eq!(manager.cleanup_grib_runs("hrrr", 2).unwrap().len(), 5);
    assert!(manager.cleanup_grib_runs("gfs", 2).unwrap().is_empty());
    assert!(layout.grib_run_dir("hrrr", "run_20240116_00").exists());
    assert!(!layout.grib_run_dir("hrrr", "run_20240115_12").exists());
}

// =============================================================================
// Disk Usage
// =============================================================================

#[test]
fn test_disk_usage_by_model_and_region() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path().join("grib"), dir.path().join("tiles"));
    make_runs(&layout.grib_model_dir("hrrr"), &SEVEN_RUNS[..2]);
    make_runs(&layout.grib_model_dir("gfs"), &SEVEN_RUNS[..1]);
    make_runs(&layout.tile_model_dir("philly", 0.1, "hrrr"), &SEVEN_RUNS[..1]);
    make_runs(&layout.tile_model_dir("nyc", 0.1, "hrrr"), &SEVEN_RUNS[..1]);

    let usage = RetentionManager::new(layout).disk_usage();
    assert_eq!(usage.grib_bytes_by_model["hrrr"], 3000);
    assert_eq!(usage.grib_bytes_by_model["gfs"], 1500);
    assert_eq!(usage.grib_bytes, 4500);
    assert_eq!(usage.tile_bytes_by_model["hrrr"], 3000);
    assert_eq!(usage.tile_bytes_by_region["philly"], 1500);
    assert_eq!(usage.total_bytes(), 7500);
}
