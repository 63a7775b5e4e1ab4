//! Scoped ownership of an import's scratch artifacts.

use std::io;
use std::path::Path;

use tempfile::{TempDir, TempPath};
use tracing::{debug, warn};

/// Owns the staged archive file and the extraction directory of one import.
///
/// Both artifacts are removed by [`Scratch::release`] or, failing that, when
/// the guard is dropped (including during unwinding). Removal is best-effort:
/// a missing artifact is ignored and any other error is logged, never raised.
#[derive(Debug, Default)]
pub struct Scratch {
    archive: Option<TempPath>,
    working_dir: Option<TempDir>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.archive.as_deref()
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_ref().map(TempDir::path)
    }

    pub(crate) fn hold_archive(&mut self, path: TempPath) {
        self.archive = Some(path);
    }

    pub(crate) fn hold_working_dir(&mut self, dir: TempDir) {
        self.working_dir = Some(dir);
    }

    /// Removes every artifact still held. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(archive) = self.archive.take() {
            let path = archive.to_path_buf();
            log_removal("staged archive", &path, archive.close());
        }
        if let Some(dir) = self.working_dir.take() {
            let path = dir.path().to_path_buf();
            log_removal("working directory", &path, dir.close());
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.release();
    }
}

fn log_removal(what: &str, path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!(path = %path.display(), "removed {what}"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove {what}"),
    }
}
