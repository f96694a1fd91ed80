//! Scratch area for attachments in flight.
//!
//! Every fetched attachment lands in a uniquely named file under the scratch
//! root. A [`ScratchGuard`] owns the files created while handling one
//! attachment and removes them when dropped; [`ScratchDir::sweep`] is the
//! age-based backstop for anything a crashed process left behind.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use {
    tracing::{debug, warn},
    uuid::Uuid,
};

use crate::error::{Error, Result};

/// Where a scratch file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchOrigin {
    /// Raw bytes as downloaded from the platform.
    Fetched,
    /// Copy produced by the metadata stripper.
    Stripped,
}

/// A transient local file holding one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFile {
    pub path: PathBuf,
    pub size: u64,
    pub origin: ScratchOrigin,
}

/// Root directory for scratch files.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Open the scratch root, creating it if needed.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        let meta = tokio::fs::metadata(&root).await?;
        if !meta.is_dir() {
            return Err(Error::invalid_input(format!(
                "scratch path {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A path that no other fetch will ever receive: `<uuid>_<label>`.
    #[must_use]
    pub fn fresh_path(&self, label: &str) -> PathBuf {
        self.root.join(format!("{}_{label}", Uuid::new_v4().simple()))
    }

    /// Remove regular files whose mtime is older than `max_age`.
    ///
    /// Returns the number of files removed. Files that vanish mid-sweep are
    /// skipped silently.
    pub async fn sweep(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0usize;
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(path = %entry.path().display(), age_secs = age.as_secs(), "removed stale scratch file");
                    removed += 1;
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "failed to remove stale scratch file");
                },
            }
        }

        Ok(removed)
    }
}

/// Remove each path, treating already-missing files as success.
pub fn remove_files<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed scratch file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

/// Owns the scratch files of one attachment; removes them on drop.
#[derive(Debug, Default)]
pub struct ScratchGuard {
    paths: Vec<PathBuf>,
}

impl ScratchGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, file: &ScratchFile) {
        self.track_path(file.path.clone());
    }

    pub fn track_path(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove all tracked files now. Safe to call more than once.
    pub fn cleanup(&mut self) {
        remove_files(self.paths.iter().map(PathBuf::as_path));
        self.paths.clear();
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}
