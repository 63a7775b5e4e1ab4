use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::ingest::PipelineStage;
use crate::publish::ObjectStoreError;

/// The main error type for yolo-ingest operations.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported archive format for '{filename}' (expected a .zip archive)")]
    UnsupportedFormat { filename: String },

    #[error("Failed to extract archive {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Failed to parse YOLO directory {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to publish object '{key}': {source}")]
    Publish {
        key: String,
        #[source]
        source: ObjectStoreError,
    },

    #[error("Catalog {operation} failed: {source}")]
    Catalog {
        operation: &'static str,
        #[source]
        source: CatalogError,
    },

    #[error("Failed to sign access URL for '{locator}': {source}")]
    Signing {
        locator: String,
        #[source]
        source: ObjectStoreError,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    /// The pipeline stage this error belongs to.
    ///
    /// Up-front validation failures report `Received`; every other import
    /// failure reports the stage the pipeline was advancing to. Returns `None`
    /// for errors raised outside an import (CLI, config, signing).
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            IngestError::UnsupportedFormat { .. } => Some(PipelineStage::Received),
            IngestError::Extraction { .. } => Some(PipelineStage::Staged),
            IngestError::Parse { .. } => Some(PipelineStage::Parsed),
            IngestError::Publish { .. } => Some(PipelineStage::Published),
            IngestError::Catalog { .. } => Some(PipelineStage::Cataloged),
            IngestError::Io(_)
            | IngestError::Signing { .. }
            | IngestError::Config { .. }
            | IngestError::InvalidInput { .. }
            | IngestError::Json(_) => None,
        }
    }
}
