//! Summaries printed after an import or a parse-only dry run.

use std::fmt;

use serde::Serialize;

use crate::model::{DatasetId, ParseResult};

/// Outcome of a successful import.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub id: DatasetId,
    pub name: String,
    pub image_count: usize,
    pub class_count: usize,
    pub annotation_count: usize,
    pub uploaded_objects: usize,
    pub uploaded_bytes: u64,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset imported successfully")?;
        writeln!(f, "  id:          {}", self.id)?;
        writeln!(f, "  name:        {}", self.name)?;
        writeln!(f, "  images:      {}", self.image_count)?;
        writeln!(f, "  classes:     {}", self.class_count)?;
        writeln!(f, "  annotations: {}", self.annotation_count)?;
        writeln!(
            f,
            "  uploaded:    {} object(s), {} byte(s)",
            self.uploaded_objects, self.uploaded_bytes
        )
    }
}

/// Counts describing a parsed working directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub classes: Vec<String>,
    pub image_count: usize,
    pub annotation_count: usize,
    pub unlabeled_images: usize,
    pub undecodable_images: usize,
}

impl From<&ParseResult> for ParseSummary {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            classes: parsed.classes.names().to_vec(),
            image_count: parsed.images.len(),
            annotation_count: parsed.annotation_count(),
            unlabeled_images: parsed
                .images
                .iter()
                .filter(|image| image.labels.is_empty())
                .count(),
            undecodable_images: parsed
                .images
                .iter()
                .filter(|image| image.width.is_none())
                .count(),
        }
    }
}

impl fmt::Display for ParseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.classes.is_empty() {
            writeln!(f, "Classes: (none, numeric ids are used as names)")?;
        } else {
            writeln!(f, "Classes ({}):", self.classes.len())?;
            for (id, name) in self.classes.iter().enumerate() {
                writeln!(f, "  {id}: {name}")?;
            }
        }
        writeln!(f, "Images:      {}", self.image_count)?;
        writeln!(f, "Annotations: {}", self.annotation_count)?;
        writeln!(f, "Unlabeled:   {}", self.unlabeled_images)?;
        writeln!(f, "No size:     {}", self.undecodable_images)
    }
}
