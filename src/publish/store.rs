//! Object-store collaborators.
//!
//! The pipeline only needs two operations from object storage: upload bytes
//! under a key, and mint a signed read URL. [`LocalObjectStore`] keeps
//! objects on disk under `{root}/{bucket}/{key}`; [`MemoryObjectStore`] keeps
//! them in process for tests and dry runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::signing::UrlSigner;
use super::ObjectStoreError;

/// Upload and URL-signing sink for published artifacts.
pub trait ObjectStore: Send + Sync {
    /// Bucket that [`ObjectStore::put`] writes into.
    fn bucket(&self) -> &str;

    /// Stores `bytes` under `key`, replacing any existing object.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ObjectStoreError>;

    /// Returns a read-only URL for `bucket/key` valid for `ttl`.
    fn signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<Url, ObjectStoreError>;
}

/// Metadata recorded next to every locally stored object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Filesystem-backed object store.
///
/// Object bytes live at `{root}/{bucket}/{key}`; metadata lives at
/// `{root}/.meta/{bucket}/{key}.json` so listings of a bucket only show
/// uploaded objects.
#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
    signer: UrlSigner,
}

const META_DIR: &str = ".meta";

impl LocalObjectStore {
    /// Opens (creating if needed) the bucket directory under `root`.
    pub fn open(
        root: impl Into<PathBuf>,
        bucket: impl Into<String>,
        signer: UrlSigner,
    ) -> Result<Self, ObjectStoreError> {
        let root = root.into();
        let bucket = bucket.into();
        validate_bucket(&bucket)?;
        fs::create_dir_all(root.join(&bucket))?;

        Ok(Self {
            root,
            bucket,
            signer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of the object stored under `key`.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.root.join(&self.bucket).join(key))
    }

    /// Reads the metadata of a stored object, if present.
    pub fn stat(&self, key: &str) -> Result<Option<ObjectMeta>, ObjectStoreError> {
        let path = self.meta_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| ObjectStoreError::Rejected {
                    key: key.to_string(),
                    message: format!("corrupt metadata at {}: {source}", path.display()),
                }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn meta_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self
            .root
            .join(META_DIR)
            .join(&self.bucket)
            .join(format!("{key}.json")))
    }
}

impl ObjectStore for LocalObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        let meta_path = self.meta_path(key)?;

        write_with_parents(&path, bytes)?;

        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        let meta_json = serde_json::to_vec(&meta).map_err(|source| ObjectStoreError::Rejected {
            key: key.to_string(),
            message: format!("failed to encode metadata: {source}"),
        })?;
        write_with_parents(&meta_path, &meta_json)
    }

    fn signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<Url, ObjectStoreError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        self.signer.sign(bucket, key, ttl)
    }
}

/// A stored object in [`MemoryObjectStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-process object store.
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    signer: UrlSigner,
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>, signer: UrlSigner) -> Self {
        Self {
            bucket: bucket.into(),
            signer,
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.lock().get(key).cloned()
    }

    /// All stored keys in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        self.lock().insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<Url, ObjectStoreError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        self.signer.sign(bucket, key, ttl)
    }
}

fn write_with_parents(path: &Path, bytes: &[u8]) -> Result<(), ObjectStoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn validate_bucket(bucket: &str) -> Result<(), ObjectStoreError> {
    let valid = !bucket.is_empty()
        && bucket != META_DIR
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && bucket != "."
        && bucket != "..";
    if valid {
        Ok(())
    } else {
        Err(ObjectStoreError::InvalidKey {
            key: bucket.to_string(),
            message: "bucket names use [A-Za-z0-9._-] only".to_string(),
        })
    }
}

/// Keys are relative `/`-separated paths without `.`/`..` segments.
fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let invalid = |message: &str| ObjectStoreError::InvalidKey {
        key: key.to_string(),
        message: message.to_string(),
    };

    if key.is_empty() || key.ends_with('/') {
        return Err(invalid("key must name an object"));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(invalid("key contains a forbidden character"));
    }
    let all_normal = Path::new(key)
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !all_normal || key.split('/').any(|segment| segment.is_empty() || segment == ".") {
        return Err(invalid("key must be a relative path without '.' or '..' segments"));
    }
    Ok(())
}
