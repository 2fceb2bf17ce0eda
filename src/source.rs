//! Schema Sources
//!
//! Where schema documents come from. The loader and the reference resolver
//! only touch storage through [`SchemaSource`], so a whole load can be
//! pointed at another backing store or instrumented in tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, SchemaError};

/// Read access to a tree of schema documents
pub trait SchemaSource: Send + Sync {
    /// Fail with `SchemaDirectoryInvalid` unless `root` is a directory
    fn check_root(&self, root: &Path) -> Result<()>;

    /// Every `*.json` file below `root`, sorted by path
    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Raw contents of one document
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Schemas on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl SchemaSource for FsSource {
    fn check_root(&self, root: &Path) -> Result<()> {
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SchemaError::SchemaDirectoryInvalid {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SchemaError::SchemaDirectoryInvalid {
                    path: root.to_path_buf(),
                    reason: "not found".to_string(),
                })
            }
            Err(e) => Err(SchemaError::SchemaDirectoryInvalid {
                path: root.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}
