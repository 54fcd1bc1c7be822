//! Artifact delivery: the sink seam and its disk implementation.
//!
//! The exporter computes filenames; the sink honors them exactly, resolving
//! collisions by appending a ` (N)` suffix before the extension instead of
//! overwriting.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Destination for finished artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist one artifact under the given filename, uniquified on
    /// collision. Returns the path (or name) it was stored under.
    async fn deliver(&self, filename: &str, contents: &[u8]) -> io::Result<PathBuf>;
}

/// Writes artifacts into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskArtifactSink {
    dir: PathBuf,
}

impl DiskArtifactSink {
    /// Create a sink rooted at `dir`. The directory is created on first
    /// delivery.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory artifacts are written into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DiskArtifactSink {
    async fn deliver(&self, filename: &str, contents: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut path = self.dir.join(filename);
        let mut suffix = 1u32;
        while tokio::fs::try_exists(&path).await? {
            path = self.dir.join(uniquified(filename, suffix));
            suffix += 1;
        }

        tokio::fs::write(&path, contents).await?;
        tracing::info!(path = %path.display(), bytes = contents.len(), "artifact written");
        Ok(path)
    }
}

/// `report.har` → `report (1).har`; extensionless names get the suffix at
/// the end.
fn uniquified(filename: &str, n: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{filename} ({n})"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
