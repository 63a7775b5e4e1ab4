//! Label-file and class-manifest readers.
//!
//! Row-level problems never fail a file: a line that is not exactly
//! `class_id cx cy w h` with numeric fields is dropped and logged at debug
//! level. Only I/O failures are reported as errors.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::IngestError;
use crate::model::{Annotation, BBoxXYWHN, ClassTable};

/// Extension of YOLO label files and of the class manifest.
pub const LABEL_EXTENSION: &str = "txt";

/// File name of the class manifest.
pub const CLASSES_FILE_NAME: &str = "classes.txt";

/// One decoded label line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelRow {
    pub class_id: u32,
    pub bbox: BBoxXYWHN,
}

/// Decodes a single YOLO label line.
///
/// Returns `None` for blank lines, for any line that is not exactly five
/// whitespace-separated numeric tokens, and for NaN or infinite coordinates.
/// The class id accepts float forms (`"1.0"`) and truncates toward zero; ids
/// that are negative, non-finite or beyond `u32` are rejected.
pub fn parse_label_line(line: &str) -> Option<LabelRow> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Take at most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        return None;
    }

    let class_id = parse_class_id(tokens[0])?;
    let cx = parse_coord(tokens[1])?;
    let cy = parse_coord(tokens[2])?;
    let w = parse_coord(tokens[3])?;
    let h = parse_coord(tokens[4])?;

    Some(LabelRow {
        class_id,
        bbox: BBoxXYWHN::new(cx, cy, w, h),
    })
}

/// Coordinates may be out of range but must be finite.
fn parse_coord(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_class_id(raw: &str) -> Option<u32> {
    let value = raw.parse::<f64>().ok()?.trunc();
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}

/// Reads every well-formed row of a label file, resolving class names.
pub fn read_label_file(path: &Path, classes: &ClassTable) -> Result<Vec<Annotation>, IngestError> {
    let content = read_text(path, "label file")?;

    let mut annotations = Vec::new();
    for (line_idx, line) in content.lines().enumerate() {
        match parse_label_line(line) {
            Some(row) => annotations.push(Annotation::resolve(row.class_id, row.bbox, classes)),
            None if line.trim().is_empty() => {}
            None => debug!(
                path = %path.display(),
                line = line_idx + 1,
                "dropping malformed label line"
            ),
        }
    }

    Ok(annotations)
}

/// Reads a class manifest: one class name per non-blank line.
///
/// Lines are trimmed but never split, so `"person car"` is a single class.
pub fn read_classes_txt(path: &Path) -> Result<ClassTable, IngestError> {
    let content = read_text(path, "class manifest")?;

    let names = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Ok(ClassTable::new(names))
}

fn read_text(path: &Path, what: &str) -> Result<String, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Parse {
        path: path.to_path_buf(),
        message: format!("failed to read {what}: {source}"),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
