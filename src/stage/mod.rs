//! Archive staging: persist an uploaded archive and unpack it into an
//! isolated working directory.
//!
//! Both scratch artifacts are named after the dataset id, so concurrent
//! imports never share paths. Their lifetime belongs to the caller's
//! [`Scratch`] guard, which is filled as soon as each artifact exists; a
//! failure halfway through staging still leaves everything owned.

mod scratch;

pub use scratch::Scratch;

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::IngestError;
use crate::model::DatasetId;

/// The only supported archive extension (compared case-insensitively).
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Rejects file names without a supported archive extension. Performs no I/O.
pub fn check_archive_name(filename: &str) -> Result<(), IngestError> {
    if filename.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION) {
        Ok(())
    } else {
        Err(IngestError::UnsupportedFormat {
            filename: filename.to_string(),
        })
    }
}

/// Display name for a dataset: the archive's base name without extension.
pub fn dataset_name(filename: &str) -> String {
    let path = Path::new(filename);
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// Writes `reader` to scratch storage and extracts it into a fresh working
/// directory under `scratch_root`.
///
/// Returns the working directory path. The staged archive and the directory
/// are handed to `scratch` as soon as they are created.
pub fn stage<R: Read>(
    reader: &mut R,
    filename: &str,
    dataset_id: DatasetId,
    scratch_root: &Path,
    scratch: &mut Scratch,
) -> Result<PathBuf, IngestError> {
    check_archive_name(filename)?;

    fs::create_dir_all(scratch_root)
        .map_err(|source| extraction_error(scratch_root, "failed to create scratch root", source))?;
    let prefix = format!("{dataset_id}-");

    let mut archive_file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(ARCHIVE_EXTENSION)
        .tempfile_in(scratch_root)
        .map_err(|source| extraction_error(scratch_root, "failed to create staged archive", source))?;
    let archive_path = archive_file.path().to_path_buf();

    let written = io::copy(reader, &mut archive_file)
        .and_then(|written| archive_file.flush().map(|()| written));
    scratch.hold_archive(archive_file.into_temp_path());
    let written = written
        .map_err(|source| extraction_error(&archive_path, "failed to write staged archive", source))?;
    debug!(path = %archive_path.display(), bytes = written, "staged archive");

    let working_dir = tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(scratch_root)
        .map_err(|source| extraction_error(scratch_root, "failed to create working directory", source))?;
    let working_path = working_dir.path().to_path_buf();
    scratch.hold_working_dir(working_dir);

    let files = extract_archive(&archive_path, &working_path)?;
    debug!(path = %working_path.display(), files, "extracted archive");

    Ok(working_path)
}

/// Extracts every entry of the zip archive at `archive_path` into `dest`.
///
/// Entries whose names would resolve outside `dest` (absolute paths, `..`
/// components) fail the whole extraction. Returns the number of files written.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<usize, IngestError> {
    let file = File::open(archive_path)
        .map_err(|source| extraction_error(archive_path, "failed to open archive", source))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|source| IngestError::Extraction {
            path: archive_path.to_path_buf(),
            message: format!("not a readable zip archive: {source}"),
        })?;

    let mut files = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| IngestError::Extraction {
                path: archive_path.to_path_buf(),
                message: format!("failed to read entry #{index}: {source}"),
            })?;

        let Some(rel_path) = entry.enclosed_name() else {
            return Err(IngestError::Extraction {
                path: archive_path.to_path_buf(),
                message: format!("entry '{}' escapes the extraction directory", entry.name()),
            });
        };
        let out_path = dest.join(rel_path);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|source| extraction_error(&out_path, "failed to create directory", source))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| extraction_error(parent, "failed to create directory", source))?;
        }
        let mut out = File::create(&out_path)
            .map_err(|source| extraction_error(&out_path, "failed to create file", source))?;
        io::copy(&mut entry, &mut out)
            .map_err(|source| extraction_error(&out_path, "failed to extract entry", source))?;
        files += 1;
    }

    Ok(files)
}

fn extraction_error(path: &Path, what: &str, source: io::Error) -> IngestError {
    IngestError::Extraction {
        path: path.to_path_buf(),
        message: format!("{what}: {source}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start zip entry");
            writer.write_all(data).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    fn entries(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = walkdir::WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| {
                e.expect("walk")
                    .path()
                    .strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn archive_name_check_is_case_insensitive() {
        assert!(check_archive_name("set.zip").is_ok());
        assert!(check_archive_name("SET.ZIP").is_ok());
        assert!(matches!(
            check_archive_name("set.tar.gz"),
            Err(IngestError::UnsupportedFormat { .. })
        ));
        assert!(check_archive_name("zip").is_err());
    }

    #[test]
    fn dataset_name_strips_directory_and_extension() {
        assert_eq!(dataset_name("coco128.zip"), "coco128");
        assert_eq!(dataset_name("uploads/My Set.v2.ZIP"), "My Set.v2");
    }

    #[test]
    fn stage_extracts_nested_entries() {
        let root = tempfile::tempdir().expect("create scratch root");
        let bytes = zip_bytes(&[
            ("classes.txt", b"person\n"),
            ("images/train/a.jpg", b"jpg"),
            ("labels/train/a.txt", b"0 0.5 0.5 0.1 0.1\n"),
        ]);
        let id = DatasetId::new_random();
        let mut scratch = Scratch::new();

        let working =
            stage(&mut Cursor::new(bytes), "set.zip", id, root.path(), &mut scratch)
                .expect("stage archive");

        assert_eq!(scratch.working_dir(), Some(working.as_path()));
        assert!(working
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&id.to_string())));
        assert_eq!(
            entries(&working),
            vec![
                "classes.txt",
                "images",
                "images/train",
                "images/train/a.jpg",
                "labels",
                "labels/train",
                "labels/train/a.txt",
            ]
        );

        scratch.release();
        assert!(entries(root.path()).is_empty());
    }

    #[test]
    fn stage_rejects_unsupported_names_before_touching_disk() {
        let root = tempfile::tempdir().expect("create scratch root");
        let mut scratch = Scratch::new();

        let err = stage(
            &mut Cursor::new(Vec::new()),
            "set.rar",
            DatasetId::new_random(),
            root.path(),
            &mut scratch,
        )
        .unwrap_err();

        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
        assert!(entries(root.path()).is_empty());
        assert!(scratch.archive_path().is_none());
    }

    #[test]
    fn stage_reports_corrupt_archives_and_keeps_scratch_owned() {
        let root = tempfile::tempdir().expect("create scratch root");
        let mut scratch = Scratch::new();

        let err = stage(
            &mut Cursor::new(b"definitely not a zip".to_vec()),
            "broken.zip",
            DatasetId::new_random(),
            root.path(),
            &mut scratch,
        )
        .unwrap_err();

        assert!(matches!(err, IngestError::Extraction { .. }));
        assert!(scratch.archive_path().is_some());
        scratch.release();
        assert!(entries(root.path()).is_empty());
    }

    #[test]
    fn extract_rejects_path_traversal() {
        let root = tempfile::tempdir().expect("create temp dir");
        let archive = root.path().join("evil.zip");
        fs::write(&archive, zip_bytes(&[("../escape.txt", b"boom")])).expect("write zip");
        let dest = root.path().join("out");
        fs::create_dir_all(&dest).expect("create dest");

        let err = extract_archive(&archive, &dest).unwrap_err();
        match err {
            IngestError::Extraction { message, .. } => assert!(message.contains("escapes")),
            other => panic!("expected Extraction, got {other:?}"),
        }
        assert!(!root.path().join("escape.txt").exists());
    }
}
