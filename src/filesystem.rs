use crate::error::ParserError;
use crate::traits::{FileProvider, SourceFile};
use log::{error, warn};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Appliances keep a lock file next to the active log, ex: `lck.0001.vc0`
static LOCK_PREFIX: &str = "lck.";
static VC0_EXTENSION: &str = "vc0";

#[derive(Debug, PartialEq)]
pub enum LogFileType {
    Vc0,
    Lock,
    Invalid,
}

impl From<&Path> for LogFileType {
    fn from(path: &Path) -> Self {
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            return Self::Invalid;
        };
        let is_vc0 = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case(VC0_EXTENSION));
        if !is_vc0 {
            return Self::Invalid;
        }
        if filename.starts_with(LOCK_PREFIX) {
            return Self::Lock;
        }
        Self::Vc0
    }
}

/// Provides an implementation of [`FileProvider`] that enumerates vc0 files in a directory.
/// Only the top level of the directory is searched unless [`Vc0DirectoryProvider::recursive`] is set.
/// Files are returned sorted by name so repeated runs see the same order.
#[derive(Debug, Clone)]
pub struct Vc0DirectoryProvider {
    base: PathBuf,
    recursive: bool,
}

impl Vc0DirectoryProvider {
    /// Fails if the path is not a directory
    pub fn new(path: &Path) -> Result<Self, ParserError> {
        if !path.is_dir() {
            error!(
                "[vc0-logs] Input directory {} does not exist",
                path.display()
            );
            return Err(ParserError::Dir);
        }
        Ok(Self {
            base: path.to_path_buf(),
            recursive: false,
        })
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

impl FileProvider for Vc0DirectoryProvider {
    fn vc0_files(&self) -> Box<dyn Iterator<Item = Box<dyn SourceFile>>> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        Box::new(
            WalkDir::new(&self.base)
                .max_depth(max_depth)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        warn!("[vc0-logs] Failed to read directory entry: {:?}", err);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| matches!(LogFileType::from(entry.path()), LogFileType::Vc0))
                .map(|entry| Box::new(LocalFile::new(entry.into_path())) as Box<dyn SourceFile>),
        )
    }
}

/// A vc0 file on the local filesystem. The file is opened on first read
pub struct LocalFile {
    path: PathBuf,
    source: String,
    handle: Option<File>,
}

impl LocalFile {
    pub fn new(path: PathBuf) -> Self {
        let source = path.display().to_string();
        Self {
            path,
            source,
            handle: None,
        }
    }
}

impl SourceFile for LocalFile {
    fn reader(&mut self) -> std::io::Result<&mut dyn Read> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => File::open(&self.path)?,
        };
        Ok(self.handle.insert(handle))
    }

    fn source_path(&self) -> &str {
        &self.source
    }
}
