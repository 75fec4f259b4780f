//! Zip archiving of report trees.

use std::io::Write;
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::UtilError;
use crate::fs::read_dir_sorted;

/// Zip the contents of `src_dir` into a new archive at `dest`.
///
/// Entry names are relative to `src_dir` and use `/` separators. Any existing
/// archive at `dest` is replaced. Returns the number of files written.
///
/// # Errors
/// Returns an error if `src_dir` is not a directory, a file cannot be read,
/// or the archive cannot be written.
pub fn zip_dir(src_dir: &Path, dest: &Path) -> Result<usize, UtilError> {
    if !src_dir.is_dir() {
        return Err(UtilError::MissingFile {
            path: src_dir.display().to_string(),
        });
    }
    if let Some(parent) = dest.parent() {
        crate::fs::ensure_dir(parent)?;
    }

    let file = std::fs::File::create(dest).map_err(|source| UtilError::Io {
        path: dest.display().to_string(),
        source,
    })?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::<'_, ()>::default().compression_method(CompressionMethod::Deflated);

    let count = add_dir(&mut writer, src_dir, "", options, dest)?;

    writer.finish().map_err(|e| UtilError::Archive {
        path: dest.display().to_string(),
        message: e.to_string(),
    })?;
    log::debug!("archived {count} files into {}", dest.display());
    Ok(count)
}

fn add_dir(
    writer: &mut ZipWriter<std::fs::File>,
    dir: &Path,
    prefix: &str,
    options: FileOptions<'_, ()>,
    dest: &Path,
) -> Result<usize, UtilError> {
    let archive_err = |e: zip::result::ZipError| UtilError::Archive {
        path: dest.display().to_string(),
        message: e.to_string(),
    };

    let mut count = 0usize;
    for path in read_dir_sorted(dir)? {
        // Never archive the archive itself when it lives inside the tree.
        if path == dest {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let entry_name = format!("{prefix}{name}");

        if path.is_dir() {
            writer
                .add_directory(format!("{entry_name}/"), options)
                .map_err(archive_err)?;
            count = count.saturating_add(add_dir(
                writer,
                &path,
                &format!("{entry_name}/"),
                options,
                dest,
            )?);
        } else {
            let bytes = std::fs::read(&path).map_err(|source| UtilError::Io {
                path: path.display().to_string(),
                source,
            })?;
            writer.start_file(entry_name, options).map_err(archive_err)?;
            writer.write_all(&bytes).map_err(|source| UtilError::Io {
                path: dest.display().to_string(),
                source,
            })?;
            count = count.saturating_add(1);
        }
    }
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::io::Read;

    use super::*;

    #[test]
    fn zip_dir_keeps_relative_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let report = tmp.path().join("build").join("jUnit");
        fs::create_dir_all(report.join("classes")).unwrap();
        fs::write(report.join("index.html"), b"<html></html>").unwrap();
        fs::write(report.join("classes").join("a.b.CTest.html"), b"class").unwrap();

        let dest = tmp.path().join("jUnit.zip");
        let count = zip_dir(&report, &dest).unwrap();
        assert_eq!(count, 2);

        let mut archive = zip::ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("classes/a.b.CTest.html")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "class");
        assert!(archive.by_name("index.html").is_ok());
    }

    #[test]
    fn zip_dir_replaces_existing_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let report = tmp.path().join("report");
        fs::create_dir_all(&report).unwrap();
        fs::write(report.join("index.html"), b"v2").unwrap();
        let dest = tmp.path().join("jUnit.zip");
        fs::write(&dest, b"stale bytes").unwrap();

        zip_dir(&report, &dest).unwrap();
        let archive = zip::ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn zip_dir_missing_source_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = zip_dir(&tmp.path().join("absent"), &tmp.path().join("out.zip"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("absent"), "error was: {err}");
    }
}
