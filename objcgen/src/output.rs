//! File output with write-if-changed semantics.
//!
//! Generated files are compared against the existing on-disk content before
//! writing; an identical file is left untouched so downstream build systems
//! do not see spurious modifications. The writer keeps per-run counters that
//! the driver prints at the end.

use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Writes generated files, skipping writes whose content is unchanged.
#[derive(Debug, Default)]
pub struct FileWriter {
    total_files: usize,
    updated_files: usize,
}

impl FileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `content` to `path` unless the file already holds exactly that
    /// content. Counts the file either way.
    pub fn save(&mut self, path: &Path, content: &str) -> Result<()> {
        self.total_files += 1;
        if path.exists() {
            let existing = fs::read_to_string(path).map_err(|source| Error::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
            if existing == content {
                return Ok(());
            }
        }
        fs::write(path, content).map_err(|source| Error::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.updated_files += 1;
        Ok(())
    }

    /// Files considered this run, written or not.
    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// Files actually (re)written this run.
    pub fn updated_files(&self) -> usize {
        self.updated_files
    }
}

/// Create a directory and its parents, tolerating pre-existing paths.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_content_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Size.h");
        let mut writer = FileWriter::new();

        writer.save(&path, "@interface Size\n").unwrap();
        assert_eq!(writer.total_files(), 1);
        assert_eq!(writer.updated_files(), 1);

        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        writer.save(&path, "@interface Size\n").unwrap();
        assert_eq!(writer.total_files(), 2);
        assert_eq!(writer.updated_files(), 1);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn changed_content_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Core.h");
        let mut writer = FileWriter::new();

        writer.save(&path, "one").unwrap();
        writer.save(&path, "two").unwrap();
        assert_eq!(writer.updated_files(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("objc/imgproc");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
