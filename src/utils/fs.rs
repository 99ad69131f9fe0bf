use crate::error::{AedictError, Result};
use std::path::Path;

pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => AedictError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => AedictError::from(e),
        })?;
    }
    Ok(())
}

pub fn remove_dir_recursive(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => AedictError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => AedictError::from(e),
        })?;
    }
    Ok(())
}

/// Removes a directory tree, logging instead of propagating failures.
pub fn remove_dir_quietly(path: &Path) {
    if let Err(e) = remove_dir_recursive(path) {
        tracing::error!(path = %path.display(), error = %e, "Failed to delete the directory");
    }
}

/// Total size in bytes of all regular files below `path`.
pub fn dir_size(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    if path.is_file() {
        return Ok(path.metadata()?.len());
    }

    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            total += dir_size(&entry_path)?;
        } else {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
