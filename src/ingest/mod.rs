//! Import orchestration.
//!
//! An import moves through
//! `Received → Staged → Parsed → Published → Cataloged → Done`. Any stage may
//! fail; the first error is returned as-is and nothing after it runs. Scratch
//! artifacts are released on every exit path.
//!
//! Ordering is what keeps a dataset from being partially visible: the
//! dataset document is written only after every artifact is uploaded, and
//! image documents only after the dataset document exists. A failed publish
//! may leave uploaded objects behind, but the catalog never learns about them.

mod report;

pub use report::{ImportSummary, ParseSummary};

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::catalog::{CatalogStore, CatalogWriter};
use crate::error::IngestError;
use crate::model::{dataset_key_prefix, Dataset, DatasetId, ImageId, ImageRecord, ParsedImage};
use crate::publish::{ArtifactPublisher, ObjectStore};
use crate::stage::{self, Scratch};
use crate::yolo;

/// Stages of the import pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Staged,
    Parsed,
    Published,
    Cataloged,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Staged => "staged",
            PipelineStage::Parsed => "parsed",
            PipelineStage::Published => "published",
            PipelineStage::Cataloged => "cataloged",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Runs imports against an object store and a catalog.
///
/// The collaborators are constructed by the caller and owned by the
/// importer for its whole lifetime. One importer may serve many concurrent
/// imports: each import derives its scratch paths from its own dataset id.
pub struct Importer<S, C> {
    store: S,
    catalog: C,
    scratch_root: PathBuf,
}

impl<S: ObjectStore, C: CatalogStore> Importer<S, C> {
    pub fn new(store: S, catalog: C, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            catalog,
            scratch_root: scratch_root.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Imports the archive read from `reader`, named `filename` by the uploader.
    ///
    /// Every call creates a new dataset, even for an archive imported before.
    pub fn import_dataset<R: Read>(
        &self,
        reader: &mut R,
        filename: &str,
    ) -> Result<ImportSummary, IngestError> {
        stage::check_archive_name(filename)?;

        let id = DatasetId::new_random();
        let _span = info_span!("import", dataset_id = %id).entered();
        info!(filename, stage = %PipelineStage::Received, "import received");

        let mut scratch = Scratch::new();
        let result = self.run(reader, filename, id, Utc::now(), &mut scratch);
        scratch.release();

        match &result {
            Ok(summary) => info!(
                stage = %PipelineStage::Done,
                images = summary.image_count,
                "import finished"
            ),
            Err(err) => warn!(
                stage = %err.failed_stage().unwrap_or(PipelineStage::Received),
                error = %err,
                "import failed"
            ),
        }
        result
    }

    fn run<R: Read>(
        &self,
        reader: &mut R,
        filename: &str,
        id: DatasetId,
        created_at: DateTime<Utc>,
        scratch: &mut Scratch,
    ) -> Result<ImportSummary, IngestError> {
        let working_dir = stage::stage(reader, filename, id, &self.scratch_root, scratch)?;
        info!(stage = %PipelineStage::Staged, path = %working_dir.display(), "archive staged");

        let parsed = yolo::parse_yolo_dir(&working_dir)?;
        let annotation_count = parsed.annotation_count();
        info!(
            stage = %PipelineStage::Parsed,
            images = parsed.images.len(),
            classes = parsed.classes.len(),
            annotations = annotation_count,
            "dataset parsed"
        );

        let key_prefix = dataset_key_prefix(id);
        let publisher = ArtifactPublisher::new(&self.store);
        let published = publisher.publish(&working_dir, &key_prefix)?;
        info!(
            stage = %PipelineStage::Published,
            objects = published.objects,
            bytes = published.bytes,
            "artifacts published"
        );

        let image_count = parsed.images.len();
        let class_count = parsed.classes.len();
        let dataset = Dataset {
            id,
            name: stage::dataset_name(filename),
            created_at,
            image_count,
            classes: parsed.classes.into_names(),
            key_prefix: key_prefix.clone(),
        };
        let images = parsed
            .images
            .into_iter()
            .map(|image| image_record(&publisher, &working_dir, &key_prefix, id, image))
            .collect::<Result<Vec<_>, _>>()?;

        let writer = CatalogWriter::new(&self.catalog);
        writer.write_dataset(&dataset)?;
        writer.write_images(&images)?;
        info!(stage = %PipelineStage::Cataloged, "dataset cataloged");

        Ok(ImportSummary {
            id,
            name: dataset.name,
            image_count,
            class_count,
            annotation_count,
            uploaded_objects: published.objects,
            uploaded_bytes: published.bytes,
        })
    }
}

fn image_record<S: ObjectStore + ?Sized>(
    publisher: &ArtifactPublisher<'_, S>,
    working_dir: &Path,
    key_prefix: &str,
    dataset_id: DatasetId,
    image: ParsedImage,
) -> Result<ImageRecord, IngestError> {
    let rel = image
        .local_path
        .strip_prefix(working_dir)
        .map_err(|_| IngestError::Parse {
            path: image.local_path.clone(),
            message: format!("image is outside working directory {}", working_dir.display()),
        })?;

    Ok(ImageRecord {
        id: ImageId::new_random(),
        dataset_id,
        path: publisher.locator_for(key_prefix, rel),
        width: image.width,
        height: image.height,
        labels: image.labels,
    })
}
