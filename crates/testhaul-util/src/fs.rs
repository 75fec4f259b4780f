//! Filesystem utilities for testhaul.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Copy `src` to `dest`, replacing any existing file at `dest`.
///
/// Parent directories of `dest` are created as needed. There is no staging:
/// a failure part way through may leave a truncated `dest` behind.
///
/// # Errors
/// Returns [`UtilError::MissingFile`] if `src` is not a file, or an I/O error
/// if the copy fails.
pub fn copy_file(src: &Path, dest: &Path) -> Result<(), UtilError> {
    if !src.is_file() {
        return Err(UtilError::MissingFile {
            path: src.display().to_string(),
        });
    }

    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    std::fs::copy(src, dest).map_err(|source| UtilError::Io {
        path: dest.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Copy `src` into the directory `dest_dir`, keeping its file name.
///
/// Returns the path of the copy.
///
/// # Errors
/// Returns an error if `src` has no file name or the copy fails.
pub fn copy_file_into(src: &Path, dest_dir: &Path) -> Result<PathBuf, UtilError> {
    let name = src.file_name().ok_or_else(|| UtilError::MissingFile {
        path: src.display().to_string(),
    })?;
    let dest = dest_dir.join(name);
    copy_file(src, &dest)?;
    Ok(dest)
}

/// Recursively copy the contents of `src` into `dest`.
///
/// Directories whose name appears in `skip_dirs` are not descended into.
/// Returns the number of files copied. A missing `src` copies nothing.
///
/// # Errors
/// Returns an error if a directory cannot be read or a file cannot be copied.
pub fn copy_dir_filtered(src: &Path, dest: &Path, skip_dirs: &[&str]) -> Result<usize, UtilError> {
    if !src.is_dir() {
        return Ok(0);
    }
    ensure_dir(dest)?;

    let mut copied = 0usize;
    for entry in read_dir_sorted(src)? {
        let name = entry.file_name().map(|n| n.to_string_lossy().into_owned());
        let Some(name) = name else {
            continue;
        };
        let target = dest.join(&name);

        if entry.is_dir() {
            if skip_dirs.contains(&name.as_str()) {
                log::debug!("skipping {}", entry.display());
                continue;
            }
            copied = copied.saturating_add(copy_dir_filtered(&entry, &target, skip_dirs)?);
        } else {
            copy_file(&entry, &target)?;
            copied = copied.saturating_add(1);
        }
    }

    Ok(copied)
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Remove a single file. Returns whether a file was actually deleted.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool, UtilError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Collect all files with the given `extension` under `dir`, recursively, sorted by path.
///
/// # Errors
/// Returns an error if `dir` cannot be read.
pub fn collect_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, UtilError> {
    let mut files = Vec::new();
    collect_files_recursive(dir, extension, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files_recursive(
    dir: &Path,
    extension: &str,
    out: &mut Vec<PathBuf>,
) -> Result<(), UtilError> {
    for path in read_dir_sorted(dir)? {
        if path.is_dir() {
            collect_files_recursive(&path, extension, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == extension)
        {
            out.push(path);
        }
    }

    Ok(())
}

/// List the entries of `dir`, sorted by path.
///
/// # Errors
/// Returns an error if `dir` cannot be read.
pub fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| UtilError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
