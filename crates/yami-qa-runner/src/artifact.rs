//! Artifact lifecycle
//!
//! Every file a test case makes the tools write is tracked in an
//! [`ArtifactSet`]. Dropping the set deletes them unless the run saves
//! artifacts, so cleanup happens no matter which step of the case failed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Files produced by one test case
#[derive(Debug, Default)]
pub struct ArtifactSet {
    paths: Vec<PathBuf>,
    keep: bool,
}

impl ArtifactSet {
    /// Create an empty set; `keep` retains files on drop
    #[must_use]
    pub fn new(keep: bool) -> Self {
        Self {
            paths: Vec::new(),
            keep,
        }
    }

    /// Track a path a tool is about to write
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Track a path after removing whatever a previous run left there
    ///
    /// A tool that exits 0 without writing must not leave a stale file to
    /// be judged in its place.
    pub fn track_fresh(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        remove(&path);
        self.track(path);
    }

    /// Tracked paths, in order
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Whether the set retains files on drop
    #[must_use]
    pub const fn keeps(&self) -> bool {
        self.keep
    }

    /// Delete every tracked file now
    ///
    /// Returns the number of files actually removed. Files that were never
    /// written are not an error: write-suppressed submodes produce nothing.
    pub fn cleanup(&mut self) -> usize {
        if self.keep {
            self.paths.clear();
            return 0;
        }
        let removed = self.paths.iter().filter(|p| remove(p)).count();
        self.paths.clear();
        removed
    }
}

impl Drop for ArtifactSet {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed artifact");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to remove artifact: {e}");
            false
        }
    }
}
