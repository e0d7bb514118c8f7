//! Input handling: per-request scratch space and media sniffing.
//!
//! Every photo or document request gets its own [`Workspace`], a temporary
//! directory that holds the downloaded input and the generated PDF. The
//! directory is removed when the `Workspace` is dropped, so cleanup happens on
//! success, on any `?` early return, and on panic alike. Nothing in the
//! pipeline deletes files by hand.

use crate::error::DocBotError;
use crate::pipeline::encode::sniff_image;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// What an input file contains, judged by its bytes rather than its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Image,
}

/// Scratch directory scoped to one request.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self, DocBotError> {
        let dir = tempfile::Builder::new()
            .prefix("docbot-")
            .tempdir()
            .map_err(|e| DocBotError::Internal(format!("tempdir: {e}")))?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Like [`Workspace::new`], but under `root` instead of the system temp dir.
    pub fn new_in(root: &Path) -> Result<Self, DocBotError> {
        let dir = tempfile::Builder::new()
            .prefix("docbot-")
            .tempdir_in(root)
            .map_err(|e| DocBotError::Internal(format!("tempdir in {}: {e}", root.display())))?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the workspace. The file is not created.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write bytes to a file inside the workspace and return its path.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, DocBotError> {
        let path = self.file(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DocBotError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        Ok(path)
    }
}

/// Classify input bytes as PDF (by `%PDF` magic) or a supported image.
pub fn sniff_media(bytes: &[u8]) -> Result<MediaKind, DocBotError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(MediaKind::Pdf);
    }
    sniff_image(bytes).map(|_| MediaKind::Image)
}

/// Read a local input file (CLI use).
pub async fn read_local(path: &Path) -> Result<Vec<u8>, DocBotError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| DocBotError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
