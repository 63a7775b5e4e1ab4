//! Catalog records and the transient parse result.
//!
//! `Dataset` and `ImageRecord` are the two persisted document shapes; field
//! names follow the catalog collections (`_id`, `w`, `h`, `labels`).
//! `ParseResult` only lives between parsing and publication.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bbox::BBoxXYWHN;
use super::ids::{DatasetId, ImageId};
use super::locator::StorageLocator;

/// Object-store key prefix under which every artifact of a dataset lives.
pub fn dataset_key_prefix(id: DatasetId) -> String {
    format!("datasets/{id}/")
}

/// An imported dataset. Written once, after all of its artifacts are published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "_id")]
    pub id: DatasetId,

    /// Display name: the archive file name without its extension.
    pub name: String,

    pub created_at: DateTime<Utc>,

    pub image_count: usize,

    /// Class names in class-id order.
    pub classes: Vec<String>,

    /// Object-store prefix (`datasets/{id}/`).
    pub key_prefix: String,
}

/// One image of a dataset, referencing its published object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(rename = "_id")]
    pub id: ImageId,

    pub dataset_id: DatasetId,

    /// Where the image bytes live (`objectstore://{bucket}/{key}`).
    pub path: StorageLocator,

    /// Pixel width, `None` when the image header could not be decoded.
    #[serde(rename = "w")]
    pub width: Option<u32>,

    /// Pixel height, `None` when the image header could not be decoded.
    #[serde(rename = "h")]
    pub height: Option<u32>,

    #[serde(default)]
    pub labels: Vec<Annotation>,
}

/// A single labelled box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Class index from the label file. May exceed the class table.
    pub class_id: u32,

    /// Resolved class name, or the decimal form of `class_id` when unresolved.
    pub class_name: String,

    pub bbox_xywhn: BBoxXYWHN,
}

impl Annotation {
    /// Builds an annotation, resolving the class name against `classes`.
    pub fn resolve(class_id: u32, bbox: BBoxXYWHN, classes: &ClassTable) -> Self {
        Self {
            class_id,
            class_name: classes.resolve(class_id),
            bbox_xywhn: bbox,
        }
    }
}

/// Ordered class names; the index of a name is its class id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable(Vec<String>);

impl ClassTable {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    /// Returns the name for `class_id`, falling back to its decimal string.
    pub fn resolve(&self, class_id: u32) -> String {
        usize::try_from(class_id)
            .ok()
            .and_then(|index| self.0.get(index))
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for ClassTable {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

/// An image found while parsing a working directory.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedImage {
    pub local_path: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub labels: Vec<Annotation>,
}

/// Output of parsing one working directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParseResult {
    pub classes: ClassTable,
    /// Images in discovery order.
    pub images: Vec<ParsedImage>,
}

impl ParseResult {
    /// Total number of annotations across all images.
    pub fn annotation_count(&self) -> usize {
        self.images.iter().map(|image| image.labels.len()).sum()
    }
}
