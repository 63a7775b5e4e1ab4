//! YOLO directory parser.
//!
//! Walks an extracted dataset, finds the class manifest, and pairs every
//! image with its label file. Layouts vary between exporters, so discovery
//! is heuristic rather than layout-driven:
//!
//! - the class manifest is the shallowest file named `classes.txt`;
//! - an image's labels live next to it (`img.txt` beside `img.jpg`), or in the
//!   directory obtained by replacing every `images` substring of the image's
//!   directory (relative to the root) with `labels`.
//!
//! The substitution is literal: `train_images/` maps to `train_labels/`, and
//! a directory named `myimages` maps to `mylabels`.
//!
//! Parsing is read-only and never touches the network or the catalog.

pub mod label;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::model::{ClassTable, ParseResult, ParsedImage};

pub use label::{parse_label_line, read_classes_txt, read_label_file, LabelRow};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

struct WalkedFile {
    path: PathBuf,
    depth: usize,
}

/// Parse a YOLO dataset rooted at `root`.
///
/// Fails only when the directory itself cannot be read. Missing labels,
/// malformed rows and undecodable images degrade the affected image instead.
pub fn parse_yolo_dir(root: &Path) -> Result<ParseResult, IngestError> {
    if !root.is_dir() {
        return Err(IngestError::Parse {
            path: root.to_path_buf(),
            message: "input must be a directory".to_string(),
        });
    }

    let files = walk_files(root)?;

    let classes = match find_classes_txt(&files) {
        Some(path) => read_classes_txt(path)?,
        None => ClassTable::default(),
    };

    let mut images = Vec::new();
    for file in files.iter().filter(|f| has_extension(&f.path, &IMAGE_EXTENSIONS)) {
        let labels = match find_label_file(root, &file.path) {
            Some(label_path) => read_label_file(&label_path, &classes)?,
            None => Vec::new(),
        };
        let (width, height) = match read_image_dimensions(&file.path) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };

        images.push(ParsedImage {
            local_path: file.path.clone(),
            width,
            height,
            labels,
        });
    }

    Ok(ParseResult { classes, images })
}

/// Collects every regular file under `root` in a stable, name-sorted order.
fn walk_files(root: &Path) -> Result<Vec<WalkedFile>, IngestError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| IngestError::Parse {
            path: root.to_path_buf(),
            message: format!("failed while traversing directory: {source}"),
        })?;

        if entry.file_type().is_file() {
            files.push(WalkedFile {
                path: entry.path().to_path_buf(),
                depth: entry.depth(),
            });
        }
    }

    Ok(files)
}

/// Picks the shallowest `classes.txt`; ties go to the first one walked.
fn find_classes_txt(files: &[WalkedFile]) -> Option<&Path> {
    files
        .iter()
        .filter(|f| f.path.file_name().is_some_and(|n| n == label::CLASSES_FILE_NAME))
        .min_by_key(|f| f.depth)
        .map(|f| f.path.as_path())
}

/// Finds the label file for `image_path`, trying the image's own directory
/// first and then its `images`→`labels` sibling.
fn find_label_file(root: &Path, image_path: &Path) -> Option<PathBuf> {
    let dir = image_path.parent()?;
    let mut label_name: OsString = image_path.file_stem()?.to_os_string();
    label_name.push(".");
    label_name.push(label::LABEL_EXTENSION);

    let beside = dir.join(&label_name);
    if beside.is_file() {
        return Some(beside);
    }

    let rel_dir = dir.strip_prefix(root).ok()?.to_string_lossy();
    if !rel_dir.contains("images") {
        return None;
    }
    let sibling = root
        .join(rel_dir.replace("images", "labels"))
        .join(&label_name);
    sibling.is_file().then_some(sibling)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

/// Reads pixel dimensions from the image header. Any failure yields `None`.
fn read_image_dimensions(path: &Path) -> Option<(u32, u32)> {
    let size = match imagesize::size(path) {
        Ok(size) => size,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "could not read image dimensions");
            return None;
        }
    };

    let width = u32::try_from(size.width).ok()?;
    let height = u32::try_from(size.height).ok()?;
    Some((width, height))
}
