//! Runtime configuration.
//!
//! Values are layered from lowest to highest precedence: built-in defaults,
//! an optional YAML file, then explicit overrides (environment variables and
//! command-line flags, merged by clap before they reach this module).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::JsonCatalog;
use crate::error::IngestError;
use crate::publish::{LocalObjectStore, UrlSigner, MAX_SIGNED_URL_TTL};

pub const DEFAULT_BUCKET: &str = "datasets";
pub const DEFAULT_STORE_ROOT: &str = "./object-store";
pub const DEFAULT_CATALOG_ROOT: &str = "./catalog";
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:9000";
pub const DEFAULT_URL_TTL_MINUTES: u64 = 60;

/// Fully resolved settings for one process.
#[derive(Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub bucket: String,
    pub scratch_dir: PathBuf,
    pub store_root: PathBuf,
    pub catalog_root: PathBuf,
    pub public_url: String,
    pub signing_key: Option<String>,
    pub url_ttl: Duration,
}

impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("bucket", &self.bucket)
            .field("scratch_dir", &self.scratch_dir)
            .field("store_root", &self.store_root)
            .field("catalog_root", &self.catalog_root)
            .field("public_url", &self.public_url)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("url_ttl", &self.url_ttl)
            .finish()
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            scratch_dir: std::env::temp_dir(),
            store_root: PathBuf::from(DEFAULT_STORE_ROOT),
            catalog_root: PathBuf::from(DEFAULT_CATALOG_ROOT),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            signing_key: None,
            url_ttl: Duration::from_secs(DEFAULT_URL_TTL_MINUTES * 60),
        }
    }
}

/// Optional settings, as found in a YAML file or collected from overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub bucket: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub store_root: Option<PathBuf>,
    pub catalog_root: Option<PathBuf>,
    pub public_url: Option<String>,
    pub signing_key: Option<String>,
    pub url_ttl_minutes: Option<u64>,
}

impl ConfigLayer {
    /// Reads a layer from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, IngestError> {
        let text = fs::read_to_string(path).map_err(|source| IngestError::Config {
            message: format!("cannot read {}: {source}", path.display()),
        })?;
        serde_yaml::from_str(&text).map_err(|source| IngestError::Config {
            message: format!("invalid config file {}: {source}", path.display()),
        })
    }
}

impl IngestConfig {
    /// Resolves defaults, then `file` if given, then `overrides`.
    pub fn load(file: Option<&Path>, overrides: ConfigLayer) -> Result<Self, IngestError> {
        let mut config = Self::default();
        if let Some(path) = file {
            debug!(path = %path.display(), "loading config file");
            config.apply(ConfigLayer::from_yaml_file(path)?);
        }
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Overwrites every setting present in `layer`.
    pub fn apply(&mut self, layer: ConfigLayer) {
        let ConfigLayer {
            bucket,
            scratch_dir,
            store_root,
            catalog_root,
            public_url,
            signing_key,
            url_ttl_minutes,
        } = layer;

        if let Some(bucket) = bucket {
            self.bucket = bucket;
        }
        if let Some(dir) = scratch_dir {
            self.scratch_dir = dir;
        }
        if let Some(root) = store_root {
            self.store_root = root;
        }
        if let Some(root) = catalog_root {
            self.catalog_root = root;
        }
        if let Some(url) = public_url {
            self.public_url = url;
        }
        if let Some(key) = signing_key {
            self.signing_key = Some(key);
        }
        if let Some(minutes) = url_ttl_minutes {
            self.url_ttl = Duration::from_secs(minutes.saturating_mul(60));
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.bucket.trim().is_empty() {
            return Err(IngestError::Config {
                message: "bucket must not be empty".to_string(),
            });
        }
        if self.url_ttl.is_zero() || self.url_ttl > MAX_SIGNED_URL_TTL {
            return Err(IngestError::Config {
                message: format!(
                    "URL lifetime must be between 1 and {} minutes",
                    MAX_SIGNED_URL_TTL.as_secs() / 60
                ),
            });
        }
        url::Url::parse(&self.public_url).map_err(|source| IngestError::Config {
            message: format!("invalid public URL '{}': {source}", self.public_url),
        })?;
        Ok(())
    }

    /// Signer for access URLs. Requires a configured signing key.
    pub fn signer(&self) -> Result<UrlSigner, IngestError> {
        let key = self
            .signing_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| IngestError::Config {
                message: "no signing key configured (set YOLO_INGEST_SIGNING_KEY)".to_string(),
            })?;
        self.build_signer(key.as_bytes().to_vec())
    }

    /// Opens the filesystem object store.
    ///
    /// Without a signing key the store gets a random per-process key: uploads
    /// work, but URLs it signs cannot be verified by anyone else.
    pub fn open_store(&self) -> Result<LocalObjectStore, IngestError> {
        let signer = match self.signing_key.as_deref() {
            Some(key) if !key.is_empty() => self.build_signer(key.as_bytes().to_vec())?,
            _ => {
                warn!("no signing key configured; using an ephemeral key");
                self.build_signer(uuid::Uuid::new_v4().as_bytes().to_vec())?
            }
        };
        self.open_store_with(signer)
    }

    pub fn open_store_with(&self, signer: UrlSigner) -> Result<LocalObjectStore, IngestError> {
        LocalObjectStore::open(&self.store_root, &self.bucket, signer).map_err(|source| {
            IngestError::Config {
                message: format!(
                    "cannot open object store at {}: {source}",
                    self.store_root.display()
                ),
            }
        })
    }

    pub fn open_catalog(&self) -> Result<JsonCatalog, IngestError> {
        JsonCatalog::open(&self.catalog_root).map_err(|source| IngestError::Config {
            message: format!(
                "cannot open catalog at {}: {source}",
                self.catalog_root.display()
            ),
        })
    }

    fn build_signer(&self, secret: Vec<u8>) -> Result<UrlSigner, IngestError> {
        UrlSigner::new(&self.public_url, secret).map_err(|source| IngestError::Config {
            message: source.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = IngestConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.bucket, "datasets");
        assert_eq!(config.url_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn overrides_beat_file_values() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("ingest.yaml");
        fs::write(
            &path,
            "bucket: from-file\nurl_ttl_minutes: 5\nstore_root: /srv/objects\n",
        )
        .expect("write config");

        let overrides = ConfigLayer {
            bucket: Some("from-flag".to_string()),
            ..ConfigLayer::default()
        };
        let config = IngestConfig::load(Some(&path), overrides).expect("load");

        assert_eq!(config.bucket, "from-flag");
        assert_eq!(config.url_ttl, Duration::from_secs(300));
        assert_eq!(config.store_root, PathBuf::from("/srv/objects"));
        assert_eq!(config.catalog_root, PathBuf::from(DEFAULT_CATALOG_ROOT));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("ingest.yaml");
        fs::write(&path, "bukket: typo\n").expect("write config");

        let err = IngestConfig::load(Some(&path), ConfigLayer::default()).unwrap_err();
        assert!(matches!(err, IngestError::Config { .. }));
    }

    #[test]
    fn ttl_must_be_positive_and_bounded() {
        let zero = ConfigLayer {
            url_ttl_minutes: Some(0),
            ..ConfigLayer::default()
        };
        assert!(IngestConfig::load(None, zero).is_err());

        let too_long = ConfigLayer {
            url_ttl_minutes: Some(8 * 24 * 60),
            ..ConfigLayer::default()
        };
        assert!(IngestConfig::load(None, too_long).is_err());
    }

    #[test]
    fn signer_requires_key_but_store_does_not() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let mut config = IngestConfig {
            store_root: temp.path().join("objects"),
            ..IngestConfig::default()
        };
        assert!(config.signer().is_err());
        config.open_store().expect("store opens without key");

        config.signing_key = Some("k".to_string());
        config.signer().expect("signer with key");
        assert!(!format!("{config:?}").contains("\"k\""));
    }
}
