//! Path utilities for locating workspace files from tests.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Returns the workspace root directory.
///
/// Derived from this crate's manifest directory (`crates/test-utils`).
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// The shipped catalog directory (`config/`).
pub fn config_dir() -> PathBuf {
    workspace_root().join("config")
}

/// Creates a temporary directory for test output.
///
/// The directory is deleted when the returned value is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Lists every file under `dir` whose name ends with `suffix`.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy().ends_with(suffix))
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_has_config() {
        assert!(config_dir().join("regions.yaml").exists());
    }

    #[test]
    fn test_files_with_suffix() {
        let dir = temp_test_dir();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/x.tmp"), b"").unwrap();
        std::fs::write(dir.path().join("a/y.grib2"), b"").unwrap();
        std::fs::create_dir_all(dir.path().join("c.tmp")).unwrap();
        let found = files_with_suffix(dir.path(), ".tmp");
        assert_eq!(found, vec![dir.path().join("a/b/x.tmp")]);
    }
}
