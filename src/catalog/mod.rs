//! Catalog persistence for datasets and their images.
//!
//! The catalog is a document store with two collections, `datasets` and
//! `images`. The importer only inserts; nothing is ever updated in place.

mod store;

pub use store::{JsonCatalog, MemoryCatalog};

use std::path::PathBuf;

use thiserror::Error;

use crate::error::IngestError;
use crate::model::{Dataset, DatasetId, ImageRecord};

/// Errors raised by catalog collaborators.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode document at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{collection} already contains a document with id {id}")]
    Duplicate {
        collection: &'static str,
        id: String,
    },

    #[error("image references unknown dataset {id}")]
    MissingDataset { id: DatasetId },
}

/// Document-store collaborator holding the `datasets` and `images` collections.
pub trait CatalogStore: Send + Sync {
    /// Inserts one dataset document. Fails if the id is already present.
    fn insert_dataset(&self, dataset: &Dataset) -> Result<(), CatalogError>;

    /// Inserts image documents in one bulk operation.
    ///
    /// Either every record is stored or none is. Each record must reference
    /// a dataset that is already present.
    fn insert_images(&self, images: &[ImageRecord]) -> Result<(), CatalogError>;

    fn dataset(&self, id: &DatasetId) -> Result<Option<Dataset>, CatalogError>;

    fn images_for_dataset(&self, id: &DatasetId) -> Result<Vec<ImageRecord>, CatalogError>;
}

/// Writes import results to a [`CatalogStore`].
pub struct CatalogWriter<'a, C: CatalogStore + ?Sized> {
    store: &'a C,
}

impl<'a, C: CatalogStore + ?Sized> CatalogWriter<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self { store }
    }

    pub fn write_dataset(&self, dataset: &Dataset) -> Result<(), IngestError> {
        self.store
            .insert_dataset(dataset)
            .map_err(|source| IngestError::Catalog {
                operation: "dataset insert",
                source,
            })
    }

    /// Bulk-writes `images`; an empty slice is a no-op.
    pub fn write_images(&self, images: &[ImageRecord]) -> Result<(), IngestError> {
        if images.is_empty() {
            return Ok(());
        }
        self.store
            .insert_images(images)
            .map_err(|source| IngestError::Catalog {
                operation: "image bulk insert",
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        dataset_key_prefix, Annotation, BBoxXYWHN, ClassTable, ImageId, StorageLocator,
    };
    use chrono::Utc;

    fn dataset() -> Dataset {
        let id = DatasetId::new_random();
        Dataset {
            id,
            name: "sample".to_string(),
            created_at: Utc::now(),
            image_count: 2,
            classes: vec!["person".to_string()],
            key_prefix: dataset_key_prefix(id),
        }
    }

    fn image(dataset: &Dataset, file: &str) -> ImageRecord {
        let classes = ClassTable::from(dataset.classes.clone());
        ImageRecord {
            id: ImageId::new_random(),
            dataset_id: dataset.id,
            path: StorageLocator::new("media", format!("{}images/{file}", dataset.key_prefix)),
            width: Some(640),
            height: None,
            labels: vec![Annotation::resolve(
                0,
                BBoxXYWHN::new(0.5, 0.5, 0.2, 0.3),
                &classes,
            )],
        }
    }

    fn exercise_store(store: &dyn CatalogStore) {
        let ds = dataset();
        let images = vec![image(&ds, "a.jpg"), image(&ds, "b.jpg")];

        let writer = CatalogWriter::new(store);
        writer.write_dataset(&ds).expect("write dataset");
        writer.write_images(&images).expect("write images");
        writer.write_images(&[]).expect("empty write is a no-op");

        assert_eq!(store.dataset(&ds.id).expect("read dataset"), Some(ds.clone()));
        assert_eq!(store.images_for_dataset(&ds.id).expect("read images"), images);

        let err = writer.write_dataset(&ds).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Catalog {
                source: CatalogError::Duplicate { .. },
                ..
            }
        ));

        let err = store.insert_images(&images[..1]).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate { collection: "images", .. }));

        let orphan = image(&dataset(), "c.jpg");
        let err = store.insert_images(&[orphan]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingDataset { .. }));
        assert_eq!(store.images_for_dataset(&ds.id).expect("read images").len(), 2);

        let unknown = DatasetId::new_random();
        assert_eq!(store.dataset(&unknown).expect("read"), None);
        assert!(store.images_for_dataset(&unknown).expect("read").is_empty());
    }

    #[test]
    fn memory_catalog_enforces_insert_rules() {
        exercise_store(&MemoryCatalog::new());
    }

    #[test]
    fn json_catalog_enforces_insert_rules() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let catalog = JsonCatalog::open(temp.path().join("catalog")).expect("open catalog");
        exercise_store(&catalog);
    }

    #[test]
    fn json_catalog_persists_across_reopen() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let ds = dataset();
        {
            let catalog = JsonCatalog::open(temp.path()).expect("open catalog");
            catalog.insert_dataset(&ds).expect("insert dataset");
            catalog.insert_images(&[image(&ds, "a.jpg")]).expect("insert images");
        }

        let reopened = JsonCatalog::open(temp.path()).expect("reopen catalog");
        assert_eq!(reopened.dataset(&ds.id).expect("read"), Some(ds.clone()));
        let images = reopened.images_for_dataset(&ds.id).expect("read images");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].labels[0].class_name, "person");
    }
}
