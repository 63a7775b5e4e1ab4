//! Catalog store implementations.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::NamedTempFile;

use super::{CatalogError, CatalogStore};
use crate::model::{Dataset, DatasetId, ImageRecord};

/// A catalog kept as a directory of JSON documents.
///
/// ```text
/// {root}/datasets/{dataset_id}.json     one document per dataset
/// {root}/images/{dataset_id}.jsonl      one document per line per image
/// ```
///
/// Every write goes to a temporary file in the target directory and is then
/// renamed into place, so readers never observe a half-written collection.
#[derive(Debug)]
pub struct JsonCatalog {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCatalog {
    /// Opens the catalog at `root`, creating its collections if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let root = root.into();
        for dir in [root.join("datasets"), root.join("images")] {
            fs::create_dir_all(&dir).map_err(|source| CatalogError::Io { path: dir, source })?;
        }
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_path(&self, id: &DatasetId) -> PathBuf {
        self.root.join("datasets").join(format!("{id}.json"))
    }

    fn images_path(&self, id: &DatasetId) -> PathBuf {
        self.root.join("images").join(format!("{id}.jsonl"))
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_images(&self, id: &DatasetId) -> Result<Vec<ImageRecord>, CatalogError> {
        let path = self.images_path(id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(CatalogError::Io { path, source }),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| CatalogError::Decode {
                path: path.clone(),
                source,
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl CatalogStore for JsonCatalog {
    fn insert_dataset(&self, dataset: &Dataset) -> Result<(), CatalogError> {
        let _guard = self.lock();
        let path = self.dataset_path(&dataset.id);
        let json = serde_json::to_vec_pretty(dataset).map_err(CatalogError::Encode)?;

        let dir = self.root.join("datasets");
        let mut temp = NamedTempFile::new_in(&dir).map_err(|source| CatalogError::Io {
            path: dir.clone(),
            source,
        })?;
        temp.write_all(&json).map_err(|source| CatalogError::Io {
            path: temp.path().to_path_buf(),
            source,
        })?;
        temp.persist_noclobber(&path).map_err(|err| {
            if err.error.kind() == std::io::ErrorKind::AlreadyExists {
                CatalogError::Duplicate {
                    collection: "datasets",
                    id: dataset.id.to_string(),
                }
            } else {
                CatalogError::Io {
                    path: path.clone(),
                    source: err.error,
                }
            }
        })?;
        Ok(())
    }

    fn insert_images(&self, images: &[ImageRecord]) -> Result<(), CatalogError> {
        let _guard = self.lock();

        let mut by_dataset: BTreeMap<DatasetId, Vec<&ImageRecord>> = BTreeMap::new();
        for image in images {
            by_dataset.entry(image.dataset_id).or_default().push(image);
        }

        // Validate every group before writing any of them.
        let mut pending = Vec::with_capacity(by_dataset.len());
        for (dataset_id, records) in by_dataset {
            if !self.dataset_path(&dataset_id).is_file() {
                return Err(CatalogError::MissingDataset { id: dataset_id });
            }
            let existing = self.read_images(&dataset_id)?;
            check_unique_ids(existing.iter().chain(records.iter().copied()))?;
            pending.push((dataset_id, existing, records));
        }

        for (dataset_id, existing, records) in pending {
            let path = self.images_path(&dataset_id);
            let dir = self.root.join("images");
            let temp = NamedTempFile::new_in(&dir).map_err(|source| CatalogError::Io {
                path: dir.clone(),
                source,
            })?;
            let temp_path = temp.path().to_path_buf();
            let io_err = |source| CatalogError::Io {
                path: temp_path.clone(),
                source,
            };

            let mut writer = BufWriter::new(temp);
            for record in existing.iter().chain(records.iter().copied()) {
                serde_json::to_writer(&mut writer, record).map_err(CatalogError::Encode)?;
                writer.write_all(b"\n").map_err(io_err)?;
            }
            let temp = writer.into_inner().map_err(|err| io_err(err.into_error()))?;
            temp.persist(&path).map_err(|err| CatalogError::Io {
                path: path.clone(),
                source: err.error,
            })?;
        }

        Ok(())
    }

    fn dataset(&self, id: &DatasetId) -> Result<Option<Dataset>, CatalogError> {
        let path = self.dataset_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CatalogError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CatalogError::Decode { path, source })
    }

    fn images_for_dataset(&self, id: &DatasetId) -> Result<Vec<ImageRecord>, CatalogError> {
        self.read_images(id)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    datasets: BTreeMap<DatasetId, Dataset>,
    images: Vec<ImageRecord>,
}

/// In-process catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<MemoryState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset_count(&self) -> usize {
        self.lock().datasets.len()
    }

    pub fn image_count(&self) -> usize {
        self.lock().images.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CatalogStore for MemoryCatalog {
    fn insert_dataset(&self, dataset: &Dataset) -> Result<(), CatalogError> {
        let mut state = self.lock();
        if state.datasets.contains_key(&dataset.id) {
            return Err(CatalogError::Duplicate {
                collection: "datasets",
                id: dataset.id.to_string(),
            });
        }
        state.datasets.insert(dataset.id, dataset.clone());
        Ok(())
    }

    fn insert_images(&self, images: &[ImageRecord]) -> Result<(), CatalogError> {
        let mut state = self.lock();
        if let Some(orphan) = images
            .iter()
            .find(|image| !state.datasets.contains_key(&image.dataset_id))
        {
            return Err(CatalogError::MissingDataset {
                id: orphan.dataset_id,
            });
        }
        check_unique_ids(state.images.iter().chain(images.iter()))?;
        state.images.extend_from_slice(images);
        Ok(())
    }

    fn dataset(&self, id: &DatasetId) -> Result<Option<Dataset>, CatalogError> {
        Ok(self.lock().datasets.get(id).cloned())
    }

    fn images_for_dataset(&self, id: &DatasetId) -> Result<Vec<ImageRecord>, CatalogError> {
        Ok(self
            .lock()
            .images
            .iter()
            .filter(|image| &image.dataset_id == id)
            .cloned()
            .collect())
    }
}

fn check_unique_ids<'a>(
    records: impl IntoIterator<Item = &'a ImageRecord>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id) {
            return Err(CatalogError::Duplicate {
                collection: "images",
                id: record.id.to_string(),
            });
        }
    }
    Ok(())
}
