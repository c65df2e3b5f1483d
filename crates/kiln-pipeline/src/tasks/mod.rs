//! Transform tasks: one per asset category, two for images.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_include::IncludeError;

use crate::context::PipelineContext;
use crate::paths::{CategoryKind, PathTableError};

pub mod assets;
pub mod fonts;
pub mod images;
pub mod markup;
pub mod styles;

pub use assets::AssetsTask;
pub use fonts::FontsTask;
pub use images::{ResponsiveImagesTask, WebpTask, QUALITY, VARIANTS};
pub use markup::{MarkupOptions, MarkupTask};
pub use styles::{StyleError, StylesTask};

/// Name of a transform task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Markup,
    Styles,
    Fonts,
    ImagesWebp,
    ImagesResponsive,
    Assets,
}

impl TaskName {
    pub const ALL: [TaskName; 6] = [
        TaskName::Markup,
        TaskName::Styles,
        TaskName::Fonts,
        TaskName::ImagesWebp,
        TaskName::ImagesResponsive,
        TaskName::Assets,
    ];

    /// The category whose files this task reads and whose destination it writes.
    pub fn category(&self) -> CategoryKind {
        match self {
            Self::Markup => CategoryKind::Markup,
            Self::Styles => CategoryKind::Styles,
            Self::Fonts => CategoryKind::Fonts,
            Self::ImagesWebp | Self::ImagesResponsive => CategoryKind::Images,
            Self::Assets => CategoryKind::Assets,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Styles => "styles",
            Self::Fonts => "fonts",
            Self::ImagesWebp => "images-webp",
            Self::ImagesResponsive => "images-responsive",
            Self::Assets => "assets",
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one task invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    /// Task that ran
    pub task: TaskName,

    /// Files written, relative to the output root
    pub outputs: Vec<PathBuf>,

    /// Sources skipped by the staleness filter
    pub skipped: usize,

    /// A failure the task caught and logged instead of propagating
    pub recovered: Option<String>,
}

impl TaskReport {
    pub fn new(task: TaskName) -> Self {
        Self {
            task,
            outputs: Vec::new(),
            skipped: 0,
            recovered: None,
        }
    }

    /// Whether anything on disk changed.
    pub fn wrote_anything(&self) -> bool {
        !self.outputs.is_empty()
    }
}

/// Errors that abort a task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Paths(#[from] PathTableError),

    #[error("Include error: {0}")]
    Include(#[from] IncludeError),

    #[error("Failed to process image {path}: {message}")]
    Image { path: PathBuf, message: String },

    #[error("Tasks {first} and {second} both write {path}")]
    DestinationConflict {
        first: TaskName,
        second: TaskName,
        path: PathBuf,
    },

    #[error("Task {task} may not write {path}: it is outside its destination")]
    OutsideDestination { task: TaskName, path: PathBuf },

    #[error("Task {task} panicked: {message}")]
    Panicked { task: TaskName, message: String },
}

/// A named, idempotent transform bound to one asset category.
pub trait TransformTask: Send + Sync {
    /// Task identifier
    fn name(&self) -> TaskName;

    /// Every file a run would write, relative to the project root.
    ///
    /// Staleness is ignored: a skipped source still claims its output.
    fn planned_outputs(&self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError>;

    /// Read the category's sources and write its outputs.
    fn run(&self, ctx: &PipelineContext) -> Result<TaskReport, TaskError>;
}

/// Explicit registry of the tasks a build or watcher can run.
#[derive(Clone)]
pub struct TaskTable {
    tasks: Vec<Arc<dyn TransformTask>>,
}

impl TaskTable {
    /// All six standard tasks.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(MarkupTask),
            Arc::new(StylesTask),
            Arc::new(FontsTask),
            Arc::new(WebpTask),
            Arc::new(ResponsiveImagesTask),
            Arc::new(AssetsTask),
        ])
    }

    pub fn new(tasks: Vec<Arc<dyn TransformTask>>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Arc<dyn TransformTask>] {
        &self.tasks
    }

    pub fn names(&self) -> Vec<TaskName> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Fail if two planned outputs in the table land on the same path.
    ///
    /// Covers collisions between tasks (an asset named like the compiled
    /// stylesheet) and inside one task (`photo.jpg` and `photo.png`).
    pub fn check_outputs(&self, ctx: &PipelineContext) -> Result<(), TaskError> {
        let mut writers: HashMap<PathBuf, TaskName> = HashMap::new();

        for task in &self.tasks {
            for path in task.planned_outputs(ctx)? {
                if let Some(first) = writers.insert(path.clone(), task.name()) {
                    return Err(TaskError::DestinationConflict {
                        first,
                        second: task.name(),
                        path,
                    });
                }
            }
        }

        Ok(())
    }

    /// Tasks that must re-run when a file of `kind` changes.
    pub fn for_category(&self, kind: CategoryKind) -> Vec<Arc<dyn TransformTask>> {
        self.tasks
            .iter()
            .filter(|t| t.name().category() == kind)
            .cloned()
            .collect()
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for TaskTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskTable")
            .field("tasks", &self.names())
            .finish()
    }
}

/// Run `tasks` concurrently on the blocking pool and wait for every one.
///
/// Results come back in the order the tasks were given. Nothing is cancelled:
/// a failing task does not stop its siblings.
pub async fn run_concurrently(
    ctx: Arc<PipelineContext>,
    tasks: Vec<Arc<dyn TransformTask>>,
) -> Vec<(TaskName, Result<TaskReport, TaskError>)> {
    let handles: Vec<_> = tasks
        .into_iter()
        .map(|task| {
            let ctx = Arc::clone(&ctx);
            let name = task.name();
            (name, tokio::task::spawn_blocking(move || task.run(&ctx)))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(TaskError::Panicked {
                task: name,
                message: e.to_string(),
            }),
        };

        match &result {
            Ok(report) => tracing::info!(
                "{}: {} written, {} up to date",
                name,
                report.outputs.len(),
                report.skipped
            ),
            Err(e) => tracing::debug!("{} failed: {}", name, e),
        }

        results.push((name, result));
    }

    results
}

/// Destination of `relative` inside a category, relative to the project root.
pub(crate) fn output_path(ctx: &PipelineContext, kind: CategoryKind, relative: &Path) -> PathBuf {
    ctx.table().category(kind).dest.join(relative)
}

/// Check that `dest` lies inside the task's destination and prepare its parent directory.
///
/// Returns the absolute path to write.
fn claim(ctx: &PipelineContext, task: TaskName, dest: &Path) -> Result<PathBuf, TaskError> {
    if !dest.starts_with(&ctx.table().category(task.category()).dest) {
        return Err(TaskError::OutsideDestination {
            task,
            path: dest.to_path_buf(),
        });
    }

    let full = ctx.root().join(dest);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(full)
}

fn relative_to_output(ctx: &PipelineContext, dest: &Path) -> PathBuf {
    dest.strip_prefix(ctx.table().output_root())
        .unwrap_or(dest)
        .to_path_buf()
}

/// Write `bytes` to `dest` (relative to the project root).
///
/// Returns the path relative to the output root.
pub(crate) fn write_output(
    ctx: &PipelineContext,
    task: TaskName,
    dest: &Path,
    bytes: &[u8],
) -> Result<PathBuf, TaskError> {
    let full = claim(ctx, task, dest)?;
    fs::write(&full, bytes).map_err(|e| TaskError::Write {
        path: full.clone(),
        source: e,
    })?;
    Ok(relative_to_output(ctx, dest))
}

/// Copy `source` byte for byte to `dest` (relative to the project root).
pub(crate) fn copy_output(
    ctx: &PipelineContext,
    task: TaskName,
    source: &Path,
    dest: &Path,
) -> Result<PathBuf, TaskError> {
    let full = claim(ctx, task, dest)?;
    fs::copy(source, &full).map_err(|e| TaskError::Write {
        path: full.clone(),
        source: e,
    })?;
    Ok(relative_to_output(ctx, dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixed(TaskName);

    impl TransformTask for Fixed {
        fn name(&self) -> TaskName {
            self.0
        }

        fn planned_outputs(&self, _ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError> {
            Ok(Vec::new())
        }

        fn run(&self, _ctx: &PipelineContext) -> Result<TaskReport, TaskError> {
            if self.0 == TaskName::Fonts {
                return Err(TaskError::Image {
                    path: PathBuf::from("x"),
                    message: "boom".to_string(),
                });
            }
            Ok(TaskReport::new(self.0))
        }
    }

    #[test]
    fn standard_table_has_every_task_once() {
        assert_eq!(TaskTable::standard().names(), TaskName::ALL.to_vec());
    }

    #[test]
    fn images_map_to_two_tasks() {
        let names: Vec<_> = TaskTable::standard()
            .for_category(CategoryKind::Images)
            .iter()
            .map(|t| t.name())
            .collect();

        assert_eq!(names, vec![TaskName::ImagesWebp, TaskName::ImagesResponsive]);
    }

    #[test]
    fn other_categories_map_to_one_task() {
        let table = TaskTable::standard();

        for kind in [
            CategoryKind::Markup,
            CategoryKind::Styles,
            CategoryKind::Fonts,
            CategoryKind::Assets,
        ] {
            assert_eq!(table.for_category(kind).len(), 1, "{kind}");
        }
    }

    #[tokio::test]
    async fn runs_all_tasks_and_keeps_order() {
        let temp = tempdir().unwrap();
        let ctx = Arc::new(PipelineContext::new(temp.path()));
        let tasks: Vec<Arc<dyn TransformTask>> = vec![
            Arc::new(Fixed(TaskName::Assets)),
            Arc::new(Fixed(TaskName::Fonts)),
            Arc::new(Fixed(TaskName::Markup)),
        ];

        let results = run_concurrently(ctx, tasks).await;

        let names: Vec<_> = results.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec![TaskName::Assets, TaskName::Fonts, TaskName::Markup]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_ok());
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn refuses_to_write_outside_own_destination() {
        let temp = tempdir().unwrap();
        let ctx = PipelineContext::new(temp.path());

        let err = write_output(
            &ctx,
            TaskName::Fonts,
            Path::new("dist/assets/css/a.woff2"),
            b"font",
        )
        .unwrap_err();

        assert!(matches!(err, TaskError::OutsideDestination { task: TaskName::Fonts, .. }));
        assert!(!temp.path().join("dist/assets/css/a.woff2").exists());
    }

    #[test]
    fn assets_may_share_nested_directories() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/scss/main.scss");
        touch(temp.path(), "src/assets/css/vendor.css");
        touch(temp.path(), "src/assets/images/logo.svg");

        let ctx = PipelineContext::new(temp.path());

        TaskTable::standard().check_outputs(&ctx).unwrap();
    }

    #[test]
    fn detects_asset_shadowing_compiled_css() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/scss/main.scss");
        touch(temp.path(), "src/assets/css/main.css");

        let err = TaskTable::standard()
            .check_outputs(&PipelineContext::new(temp.path()))
            .unwrap_err();

        assert!(matches!(
            err,
            TaskError::DestinationConflict {
                first: TaskName::Styles,
                second: TaskName::Assets,
                ..
            }
        ));
    }

    #[test]
    fn detects_images_sharing_a_stem() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/images/photo.jpg");
        touch(temp.path(), "src/images/photo.png");

        let err = TaskTable::standard()
            .check_outputs(&PipelineContext::new(temp.path()))
            .unwrap_err();

        match err {
            TaskError::DestinationConflict { first, second, path } => {
                assert_eq!((first, second), (TaskName::ImagesWebp, TaskName::ImagesWebp));
                assert_eq!(path, PathBuf::from("dist/assets/images/photo.webp"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn detects_source_named_like_a_variant() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/images/photo.jpg");
        touch(temp.path(), "src/images/photo-sm.jpg");

        let err = TaskTable::standard()
            .check_outputs(&PipelineContext::new(temp.path()))
            .unwrap_err();

        assert!(matches!(
            err,
            TaskError::DestinationConflict {
                first: TaskName::ImagesWebp,
                second: TaskName::ImagesResponsive,
                ..
            }
        ));
    }

    #[test]
    fn writes_relative_to_output_root() {
        let temp = tempdir().unwrap();
        let ctx = PipelineContext::new(temp.path());

        let written = write_output(
            &ctx,
            TaskName::Markup,
            Path::new("dist/blog/index.html"),
            b"<p>hi</p>",
        )
        .unwrap();

        assert_eq!(written, PathBuf::from("blog/index.html"));
        assert_eq!(
            fs::read_to_string(temp.path().join("dist/blog/index.html")).unwrap(),
            "<p>hi</p>"
        );
    }
}
