//! Modification-time staleness checks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::sources::SourceFile;

/// True when `dest` is missing or strictly older than `source`.
pub fn is_stale(source: &Path, dest: &Path) -> io::Result<bool> {
    let dest_modified = match fs::metadata(dest) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let source_modified = fs::metadata(source)?.modified()?;

    Ok(source_modified > dest_modified)
}

/// Drops sources whose output is already up to date.
#[derive(Debug, Clone)]
pub struct StalenessFilter {
    dest_dir: PathBuf,
    extension: Option<&'static str>,
}

impl StalenessFilter {
    /// Compare sources against same-named files under `dest_dir`.
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            extension: None,
        }
    }

    /// Compare against outputs carrying `extension` instead of the source's own.
    pub fn with_extension(mut self, extension: &'static str) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Where `file`'s output lives.
    pub fn destination_for(&self, file: &SourceFile) -> PathBuf {
        let dest = self.dest_dir.join(&file.relative);
        match self.extension {
            Some(ext) => dest.with_extension(ext),
            None => dest,
        }
    }

    /// The stale subsequence of `files`, order preserved.
    pub fn retain_stale(&self, files: Vec<SourceFile>) -> io::Result<Vec<SourceFile>> {
        let mut stale = Vec::with_capacity(files.len());
        for file in files {
            if is_stale(&file.path, &self.destination_for(&file))? {
                stale.push(file);
            }
        }
        Ok(stale)
    }
}
