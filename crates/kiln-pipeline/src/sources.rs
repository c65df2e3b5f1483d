//! Source file discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::paths::AssetCategory;
use crate::tasks::TaskError;

/// A source file matched by a category's globs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Path relative to the category base; output paths mirror it
    pub relative: PathBuf,
}

/// Enumerate files under `root` matching the category's source globs, sorted by path.
///
/// A missing base directory yields no files.
pub fn collect_sources(root: &Path, category: &AssetCategory) -> Result<Vec<SourceFile>, TaskError> {
    let globs = category.source_set()?;
    let base = root.join(&category.base);

    if !base.exists() {
        tracing::debug!("No {} sources: {} does not exist", category.kind, base.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(&base)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Ok(from_root) = path.strip_prefix(root) else {
            continue;
        };
        if !globs.is_match(to_slash(from_root)) {
            continue;
        }

        let relative = path.strip_prefix(&base).unwrap_or(path).to_path_buf();
        files.push(SourceFile {
            path: path.to_path_buf(),
            relative,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Render a relative path with forward slashes for glob matching.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
