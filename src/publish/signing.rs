//! Time-limited, read-only access URLs.
//!
//! A signed URL looks like
//! `{public_url}/{bucket}/{key}?expires={unix}&signature={hex}` where the
//! signature is HMAC-SHA256 over `GET\n{encoded path}\n{expires}`. URLs are
//! generated on demand and never cached.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use super::ObjectStoreError;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime a signed URL may have (7 days).
pub const MAX_SIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Signs and verifies access URLs for one public endpoint.
#[derive(Clone)]
pub struct UrlSigner {
    public_url: Url,
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("public_url", &self.public_url.as_str())
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(public_url: &str, secret: impl Into<Vec<u8>>) -> Result<Self, ObjectStoreError> {
        let public_url = Url::parse(public_url).map_err(|source| ObjectStoreError::Signing {
            message: format!("invalid public URL '{public_url}': {source}"),
        })?;
        if public_url.cannot_be_a_base() {
            return Err(ObjectStoreError::Signing {
                message: format!("public URL '{public_url}' cannot carry object paths"),
            });
        }

        Ok(Self {
            public_url,
            secret: secret.into(),
        })
    }

    /// Builds a GET URL for `bucket/key` that expires `ttl` from now.
    pub fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<Url, ObjectStoreError> {
        self.sign_at(bucket, key, ttl, Utc::now())
    }

    pub(crate) fn sign_at(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Url, ObjectStoreError> {
        if ttl.is_zero() || ttl > MAX_SIGNED_URL_TTL {
            return Err(ObjectStoreError::Signing {
                message: format!(
                    "ttl of {}s is outside 1s..={}s",
                    ttl.as_secs(),
                    MAX_SIGNED_URL_TTL.as_secs()
                ),
            });
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|source| ObjectStoreError::Signing {
            message: format!("ttl out of range: {source}"),
        })?;
        let expires = (now + ttl).timestamp();

        let mut url = self.public_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url.path_segments_mut().map_err(|()| ObjectStoreError::Signing {
                message: "public URL cannot carry object paths".to_string(),
            })?;
            segments.pop_if_empty().push(bucket).extend(key.split('/'));
        }

        let signature = self.signature(url.path(), expires)?;
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(url)
    }

    /// Checks that `url` was signed by this signer and has not expired at `now`.
    pub fn verify(&self, url: &Url, now: DateTime<Utc>) -> bool {
        let mut expires = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "expires" => expires = value.parse::<i64>().ok(),
                "signature" => signature = hex::decode(value.as_bytes()).ok(),
                _ => return false,
            }
        }
        let (Some(expires), Some(signature)) = (expires, signature) else {
            return false;
        };
        if now.timestamp() > expires {
            return false;
        }

        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(canonical_request(url.path(), expires).as_bytes());
        mac.verify_slice(&signature).is_ok()
    }

    fn signature(&self, path: &str, expires: i64) -> Result<String, ObjectStoreError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|source| ObjectStoreError::Signing {
                message: format!("unusable signing key: {source}"),
            })?;
        mac.update(canonical_request(path, expires).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn canonical_request(path: &str, expires: i64) -> String {
    format!("GET\n{path}\n{expires}")
}
