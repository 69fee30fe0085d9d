//! Filesystem helpers that tolerate already-missing targets.

use std::fs;
use std::io;
use std::path::Path;

use super::error::{ManagerError, ManagerResult};

/// Delete a file. A missing file is not an error.
pub fn delete_file_if_exists(path: &Path) -> ManagerResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ManagerError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Delete a directory tree. A missing directory is not an error.
pub fn delete_dir_if_exists(path: &Path) -> ManagerResult<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ManagerError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Delete whatever is at `path`, file or directory.
pub fn delete_entry_if_exists(path: &Path) -> ManagerResult<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => delete_dir_if_exists(path),
        Ok(_) => delete_file_if_exists(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ManagerError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Move a file or directory, replacing anything already at `dest`.
///
/// Falls back to copy and delete when a rename is not possible (for example
/// across filesystems).
pub fn move_entry(source: &Path, dest: &Path) -> ManagerResult<()> {
    delete_entry_if_exists(dest)?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    if source.is_dir() {
        copy_dir_recursive(source, dest)?;
        delete_dir_if_exists(source)?;
    } else {
        fs::copy(source, dest).map_err(|e| ManagerError::MoveFailed {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        })?;
        delete_file_if_exists(source)?;
    }

    Ok(())
}

/// Recursively copy a directory.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> ManagerResult<()> {
    fs::create_dir_all(dest).map_err(|e| ManagerError::CreateDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    for entry in fs::read_dir(source).map_err(|e| ManagerError::ReadFailed {
        path: source.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| ManagerError::ReadFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

        let source_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if source_path.is_dir() {
            copy_dir_recursive(&source_path, &dest_path)?;
        } else {
            fs::copy(&source_path, &dest_path).map_err(|e| ManagerError::WriteFailed {
                path: dest_path,
                source: e,
            })?;
        }
    }

    Ok(())
}

/// Total size in bytes of all files below `path`.
///
/// Unreadable entries are skipped; the result is an estimate.
pub fn directory_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| match entry.metadata() {
            Ok(meta) if meta.is_dir() => directory_size(&entry.path()),
            Ok(meta) => meta.len(),
            Err(_) => 0,
        })
        .sum()
}
