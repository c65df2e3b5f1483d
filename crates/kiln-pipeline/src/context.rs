//! The orchestration context shared by every task.

use std::path::{Component, Path, PathBuf};

use globset::GlobSet;

use crate::paths::{compile_globs, CategoryKind, PathTable, PathTableError};
use crate::tasks::MarkupOptions;

/// Process-wide build context, handed explicitly to every task.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    root: PathBuf,
    table: PathTable,
    markup: MarkupOptions,
}

impl PipelineContext {
    /// Context for the project at `root` with the standard path table.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            table: PathTable::standard(),
            markup: MarkupOptions::default(),
        }
    }

    pub fn with_markup(mut self, markup: MarkupOptions) -> Self {
        self.markup = markup;
        self
    }

    /// Project root every table path is relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table(&self) -> &PathTable {
        &self.table
    }

    pub fn markup(&self) -> &MarkupOptions {
        &self.markup
    }

    /// Absolute output root.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(self.table.output_root())
    }

    /// Absolute source root.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(self.table.source_root())
    }

    /// Absolute destination directory of a category.
    pub fn dest_dir(&self, kind: CategoryKind) -> PathBuf {
        self.root.join(&self.table.category(kind).dest)
    }

    /// Include directory relative to the project root, without `.` segments.
    fn include_dir(&self) -> PathBuf {
        self.markup
            .include_dir
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }

    /// Globs whose changes re-run `kind`. Markup also re-runs for any include file.
    pub fn watch_globs(&self, kind: CategoryKind) -> Vec<String> {
        let mut globs = self.table.category(kind).watch_globs().to_vec();
        if kind == CategoryKind::Markup {
            let dir = self.include_dir().to_string_lossy().replace('\\', "/");
            globs.push(format!("{}/**/*.html", dir.trim_end_matches('/')));
        }
        globs
    }

    /// Compiled [`watch_globs`](Self::watch_globs).
    pub fn watch_set(&self, kind: CategoryKind) -> Result<GlobSet, PathTableError> {
        compile_globs(&self.watch_globs(kind))
    }

    /// Directories a watcher must cover: the source root, plus the include
    /// directory when it lies outside it.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.source_dir()];
        let include_dir = self.include_dir();
        if !include_dir.starts_with(self.table.source_root()) {
            roots.push(self.root.join(include_dir));
        }
        roots
    }
}
