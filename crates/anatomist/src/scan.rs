//! Source discovery: walks a workspace for files the bundled passes read.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions the declaration scanner understands.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "rs", "py"];

/// Every source file under `root`, sorted, skipping vendored and build
/// directories. Unreadable entries are skipped.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_scan_excluded(e.path()))
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    debug!(root = %root.display(), files = files.len(), "sources discovered");
    files
}

/// Returns `true` if the directory should not be descended into.
fn is_scan_excluded(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| {
            matches!(
                name,
                ".git" | ".jobs" | "target" | "node_modules" | "dist" | "__pycache__" | ".venv"
            )
        })
        .unwrap_or(false)
}
