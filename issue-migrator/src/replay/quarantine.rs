//! On-disk store for issues that could not be created.
//!
//! Each record is the full [`Issue`] as pretty printed JSON in
//! `<dir>/<source id>.json`, loadable again with [`Quarantine::load`].

use super::error::QuarantineError;
use crate::project::Issue;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// A directory of quarantined issues.
#[derive(Debug, Clone)]
pub struct Quarantine {
    dir: PathBuf,
}

impl Quarantine {
    /// Uses `dir`, created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The quarantine directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record path for a source issue id.
    #[must_use]
    pub fn path_for(&self, source_id: &str) -> PathBuf {
        let name: String = source_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    /// Writes `issue` to its record file. An existing record is never replaced.
    ///
    /// # Errors
    ///
    /// Returns [`QuarantineError::AlreadyExists`] if a record is present, or
    /// an I/O or encoding error.
    pub fn store(&self, issue: &Issue) -> Result<PathBuf, QuarantineError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| QuarantineError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(&issue.source_id);
        let json = serde_json::to_vec_pretty(issue).map_err(|source| QuarantineError::Json {
            path: path.clone(),
            source,
        })?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(QuarantineError::AlreadyExists { path });
            }
            Err(source) => return Err(QuarantineError::Io { path, source }),
        };
        file.write_all(&json)
            .map_err(|source| QuarantineError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }

    /// Reads a record written by [`Quarantine::store`].
    ///
    /// # Errors
    ///
    /// Returns an I/O or decoding error.
    pub fn load(path: &Path) -> Result<Issue, QuarantineError> {
        let bytes = std::fs::read(path).map_err(|source| QuarantineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| QuarantineError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_comment, sample_issue};
    use tempfile::TempDir;

    fn issue() -> Issue {
        let mut source = sample_issue("10042", "PRO-7", "Crash on save");
        source.assignee = Some("bob".to_string());
        source.comments.push(sample_comment("c", "carol", "{code}x{code}"));
        Issue::from_source(source, Vec::new())
    }

    #[test]
    fn stored_record_loads_back_equal() {
        let temp = TempDir::new().unwrap();
        let quarantine = Quarantine::new(temp.path().join("quarantine"));

        let path = quarantine.store(&issue()).unwrap();

        assert_eq!(path, temp.path().join("quarantine").join("10042.json"));
        assert_eq!(Quarantine::load(&path).unwrap(), issue());
    }

    #[test]
    fn existing_record_is_kept() {
        let temp = TempDir::new().unwrap();
        let quarantine = Quarantine::new(temp.path());
        let path = quarantine.path_for("10042");
        std::fs::write(&path, "earlier").unwrap();

        let result = quarantine.store(&issue());

        assert!(matches!(result, Err(QuarantineError::AlreadyExists { .. })));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "earlier");
    }

    #[test]
    fn record_names_are_sanitized() {
        let quarantine = Quarantine::new("/q");
        assert_eq!(quarantine.path_for("../x"), PathBuf::from("/q/___x.json"));
    }

    #[test]
    fn garbage_record_is_a_decode_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();

        assert!(matches!(
            Quarantine::load(&path),
            Err(QuarantineError::Json { .. })
        ));
    }
}
