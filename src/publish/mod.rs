//! Artifact publication: upload a working directory to object storage.
//!
//! Every regular file under the working directory is uploaded to
//! `{key_prefix}{relative path}`. Uploads run in walk order and the first
//! failure aborts the publish; objects already uploaded stay behind, but the
//! error stops the importer before anything is cataloged.

mod signing;
mod store;

pub use signing::{UrlSigner, MAX_SIGNED_URL_TTL};
pub use store::{LocalObjectStore, MemoryObjectStore, ObjectMeta, ObjectStore, StoredObject};

use std::fs;
use std::path::{Component, Path};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::model::{LocatorParseError, StorageLocator};

/// Content type used when the extension is unknown.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised by object-store collaborators.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("object store rejected '{key}': {message}")]
    Rejected { key: String, message: String },

    #[error("cannot sign URL: {message}")]
    Signing { message: String },

    #[error(transparent)]
    Locator(#[from] LocatorParseError),
}

/// Totals of one publish run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub objects: usize,
    pub bytes: u64,
}

/// Uploads working directories and signs access URLs through an [`ObjectStore`].
pub struct ArtifactPublisher<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ObjectStore + ?Sized> ArtifactPublisher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Uploads every file under `working_dir` to `key_prefix + relative_path`.
    pub fn publish(&self, working_dir: &Path, key_prefix: &str) -> Result<PublishReport, IngestError> {
        let mut report = PublishReport::default();

        for entry in WalkDir::new(working_dir).sort_by_file_name() {
            let entry = entry.map_err(|source| IngestError::Publish {
                key: key_prefix.to_string(),
                source: ObjectStoreError::Io(source.into()),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry.path().strip_prefix(working_dir).unwrap_or(entry.path());
            let key = format!("{key_prefix}{}", relative_key(rel));

            let bytes = fs::read(entry.path()).map_err(|source| IngestError::Publish {
                key: key.clone(),
                source: ObjectStoreError::Io(source),
            })?;
            let content_type = content_type_for(entry.path());

            self.store
                .put(&key, &bytes, content_type)
                .map_err(|source| IngestError::Publish {
                    key: key.clone(),
                    source,
                })?;
            debug!(key = %key, content_type, bytes = bytes.len(), "uploaded object");

            report.objects += 1;
            report.bytes += bytes.len() as u64;
        }

        Ok(report)
    }

    /// Mints a fresh read-only URL for `locator`, valid for `ttl`.
    pub fn signed_access_url(
        &self,
        locator: &StorageLocator,
        ttl: Duration,
    ) -> Result<Url, IngestError> {
        self.store
            .signed_url(locator.bucket(), locator.key(), ttl)
            .map_err(|source| IngestError::Signing {
                locator: locator.to_string(),
                source,
            })
    }

    /// Locator of the object published from `rel_path` under `key_prefix`.
    pub fn locator_for(&self, key_prefix: &str, rel_path: &Path) -> StorageLocator {
        StorageLocator::new(
            self.store.bucket(),
            format!("{key_prefix}{}", relative_key(rel_path)),
        )
    }
}

/// Joins the normal components of `rel` with `/`, whatever the host separator.
pub fn relative_key(rel: &Path) -> String {
    rel.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Guesses a content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return FALLBACK_CONTENT_TYPE;
    };

    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "xml" => "application/xml",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn store() -> MemoryObjectStore {
        let signer = UrlSigner::new("http://localhost:9000", "secret").expect("signer");
        MemoryObjectStore::new("media", signer)
    }

    #[test]
    fn publish_uploads_every_file_with_relative_keys() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(temp.path().join("images/train")).expect("create dirs");
        fs::create_dir_all(temp.path().join("empty")).expect("create empty dir");
        fs::write(temp.path().join("images/train/a.JPG"), b"abc").expect("write image");
        fs::write(temp.path().join("classes.txt"), b"person\n").expect("write classes");
        fs::write(temp.path().join("README"), b"hi").expect("write readme");

        let store = store();
        let report = ArtifactPublisher::new(&store)
            .publish(temp.path(), "datasets/42/")
            .expect("publish");

        assert_eq!(report, PublishReport { objects: 3, bytes: 12 });
        assert_eq!(
            store.keys(),
            vec![
                "datasets/42/README".to_string(),
                "datasets/42/classes.txt".to_string(),
                "datasets/42/images/train/a.JPG".to_string(),
            ]
        );
        let image = store.get("datasets/42/images/train/a.JPG").expect("image");
        assert_eq!(image.content_type, "image/jpeg");
        let readme = store.get("datasets/42/README").expect("readme");
        assert_eq!(readme.content_type, FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn publish_fails_for_missing_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let store = store();
        let err = ArtifactPublisher::new(&store)
            .publish(&temp.path().join("missing"), "datasets/1/")
            .unwrap_err();
        assert!(matches!(err, IngestError::Publish { .. }));
    }

    #[test]
    fn locator_and_signed_url_use_store_bucket() {
        let store = store();
        let publisher = ArtifactPublisher::new(&store);
        let locator = publisher.locator_for("datasets/7/", &PathBuf::from("images").join("a.png"));
        assert_eq!(locator.to_string(), "objectstore://media/datasets/7/images/a.png");

        let url = publisher
            .signed_access_url(&locator, Duration::from_secs(3600))
            .expect("sign");
        assert_eq!(url.path(), "/media/datasets/7/images/a.png");
        assert!(url.query().is_some_and(|q| q.contains("signature=")));
    }

    #[test]
    fn content_type_falls_back_to_octet_stream() {
        assert_eq!(content_type_for(Path::new("a.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("labels/a.txt")), "text/plain");
        assert_eq!(content_type_for(Path::new("weights.pt")), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type_for(Path::new("Makefile")), FALLBACK_CONTENT_TYPE);
    }
}
