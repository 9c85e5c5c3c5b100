//! Local staging area for downloaded attachments.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A per-run directory holding attachment bytes until they are uploaded.
///
/// Files are laid out as `<run-dir>/<attachment-id>/<filename>` so that the
/// upload keeps the original file name and equal names never collide.
#[derive(Debug, Clone)]
pub struct StagingDir {
    run_dir: PathBuf,
}

impl StagingDir {
    /// Creates a fresh run directory named after the current time under `root`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be created.
    pub fn create(root: &Path) -> io::Result<Self> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        Self::at(root.join(stamp))
    }

    /// Uses `run_dir` as the staging directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be created.
    pub fn at(run_dir: PathBuf) -> io::Result<Self> {
        std::fs::create_dir_all(&run_dir)?;
        debug!(path = %run_dir.display(), "Staging directory ready");
        Ok(Self { run_dir })
    }

    /// The directory files are staged in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.run_dir
    }

    /// Writes attachment bytes and returns where they were stored.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be written.
    pub fn stage(&self, attachment_id: &str, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let dir = self.run_dir.join(sanitize(attachment_id));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(sanitize(filename));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Strips path separators so remote names cannot escape the staging area.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
