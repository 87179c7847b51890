//! Path normalization: real paths to workspace-relative file identities.

use std::path::Path;

use crate::AnatomistError;
use common::FileIdentity;

/// Identity of `path` relative to `root`, with forward slashes.
///
/// Both paths are canonicalized with `dunce::canonicalize` (no `\\?\`
/// prefix on Windows), so `./src/../src/a.ts` and `src/a.ts` agree.
///
/// # Errors
/// - `AnatomistError::IoError` if either path cannot be canonicalized
/// - `AnatomistError::OutsideRoot` if `path` does not live under `root`
/// - `AnatomistError::NonUtf8` if the relative path is not UTF-8
pub fn file_identity(root: &Path, path: &Path) -> Result<FileIdentity, AnatomistError> {
    let root = dunce::canonicalize(root)?;
    let canonical = dunce::canonicalize(path)?;
    let relative = canonical
        .strip_prefix(&root)
        .map_err(|_| AnatomistError::OutsideRoot {
            path: canonical.display().to_string(),
            root: root.display().to_string(),
        })?;
    let s = relative
        .to_str()
        .ok_or_else(|| AnatomistError::NonUtf8(relative.display().to_string()))?;
    Ok(FileIdentity::new(s))
}
