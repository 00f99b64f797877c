//! Per-request scratch directory.
//!
//! Every conversion gets its own [`Workspace`]: the upload, the extracted
//! images, the voice-over and the rendered video all live under it, and
//! nothing is shared between requests. The directory is removed when the
//! `Workspace` is dropped, so every exit path (success, error, panic, client
//! disconnect mid-download) releases it. Removal failures are logged and
//! swallowed; they never reach the caller.

use crate::error::SlideshowError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

pub const VOICEOVER_FILE: &str = "voiceover.mp3";
pub const VIDEO_FILE: &str = "slideshow.mp4";
const FALLBACK_UPLOAD_NAME: &str = "upload.docx";

/// A process-local ephemeral directory scoping one conversion.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self, SlideshowError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docx-slideshow-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| SlideshowError::WorkspaceFailed { source })?;

        let path = dir.path().to_path_buf();
        debug!("Created workspace {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an uploaded file called `filename` is saved.
    ///
    /// Only the final path component of the client-supplied name is kept, so
    /// `../../etc/passwd.docx` lands at `<workspace>/passwd.docx`.
    pub fn upload_path(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_UPLOAD_NAME);
        self.path.join(name)
    }

    pub fn voiceover_path(&self) -> PathBuf {
        self.path.join(VOICEOVER_FILE)
    }

    pub fn video_path(&self) -> PathBuf {
        self.path.join(VIDEO_FILE)
    }

    /// Delete the directory now instead of at drop time.
    pub fn close(mut self) {
        if let Some(dir) = self.dir.take() {
            remove(dir);
        }
    }

    /// [`close`](Self::close) on the blocking pool, for async callers.
    ///
    /// Dropping still works from async code but deletes on the calling
    /// worker thread.
    pub async fn release(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.close()).await {
            warn!("Workspace cleanup task failed: {}", e);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            remove(dir);
        }
    }
}

fn remove(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => debug!("Removed workspace {}", path.display()),
        Err(e) => warn!("Error cleaning up workspace {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path())).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.voiceover_path(), b"mp3").unwrap();
        std::fs::create_dir(path.join("nested")).unwrap();
        std::fs::write(path.join("nested/file"), b"x").unwrap();
        assert!(path.exists());

        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn close_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path())).unwrap();
        let path = ws.path().to_path_buf();
        ws.close();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path())).unwrap();
        std::fs::write(ws.video_path(), b"mp4").unwrap();
        let path = ws.path().to_path_buf();

        ws.release().await;
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn already_deleted_directory_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path())).unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        drop(ws);
    }

    #[test]
    fn workspaces_are_distinct() {
        let a = Workspace::create(None).unwrap();
        let b = Workspace::create(None).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn upload_path_strips_directories() {
        let ws = Workspace::create(None).unwrap();
        assert_eq!(
            ws.upload_path("../../etc/report.docx"),
            ws.path().join("report.docx")
        );
        assert_eq!(ws.upload_path("notes.docx"), ws.path().join("notes.docx"));
        assert_eq!(ws.upload_path(""), ws.path().join("upload.docx"));
        assert_eq!(ws.upload_path(".."), ws.path().join("upload.docx"));
    }

    #[test]
    fn fixed_file_names() {
        let ws = Workspace::create(None).unwrap();
        assert!(ws.voiceover_path().ends_with("voiceover.mp3"));
        assert!(ws.video_path().ends_with("slideshow.mp4"));
    }
}
