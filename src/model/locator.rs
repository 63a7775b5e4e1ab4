//! Object-store locators (`objectstore://{bucket}/{key}`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SCHEME: &str = "objectstore://";

/// A resolved location of an object in object storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageLocator {
    bucket: String,
    key: String,
}

/// Error returned when a string is not a valid locator.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid storage locator '{input}': {message}")]
pub struct LocatorParseError {
    pub input: String,
    pub message: &'static str,
}

impl StorageLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl FromStr for StorageLocator {
    type Err = LocatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |message| LocatorParseError {
            input: s.to_string(),
            message,
        };

        let rest = s
            .strip_prefix(SCHEME)
            .ok_or_else(|| err("expected objectstore:// scheme"))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| err("missing object key"))?;

        if bucket.is_empty() {
            return Err(err("empty bucket name"));
        }
        if key.is_empty() {
            return Err(err("empty object key"));
        }

        Ok(Self::new(bucket, key))
    }
}

impl TryFrom<String> for StorageLocator {
    type Error = LocatorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StorageLocator> for String {
    fn from(locator: StorageLocator) -> Self {
        locator.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_nested_key() {
        let locator: StorageLocator = "objectstore://media/datasets/abc/images/0.jpg"
            .parse()
            .expect("parse locator");
        assert_eq!(locator.bucket(), "media");
        assert_eq!(locator.key(), "datasets/abc/images/0.jpg");
        assert_eq!(
            locator.to_string(),
            "objectstore://media/datasets/abc/images/0.jpg"
        );
    }

    #[test]
    fn rejects_foreign_schemes_and_missing_parts() {
        assert!("gs://media/a.jpg".parse::<StorageLocator>().is_err());
        assert!("objectstore://media".parse::<StorageLocator>().is_err());
        assert!("objectstore:///a.jpg".parse::<StorageLocator>().is_err());
        assert!("objectstore://media/".parse::<StorageLocator>().is_err());
    }
}
