//! Maps file changes to the tasks that must re-run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobSet;
use tokio::sync::mpsc;

use kiln_pipeline::{
    run_concurrently, CategoryKind, PathTableError, PipelineContext, TaskError, TaskName,
    TaskReport, TaskTable, TransformTask,
};

use crate::reload::ReloadHub;
use crate::watcher::FileChangeEvent;

/// Re-runs only the tasks whose watch globs match a changed path.
///
/// Changes are handled one at a time and never coalesced, so a burst of
/// saves re-runs a task at least once per event.
pub struct WatchOrchestrator {
    ctx: Arc<PipelineContext>,
    tasks: TaskTable,
    matchers: Vec<(CategoryKind, GlobSet)>,
    canonical_root: Option<PathBuf>,
    notifier: Option<ReloadHub>,
}

impl WatchOrchestrator {
    pub fn new(ctx: Arc<PipelineContext>, tasks: TaskTable) -> Result<Self, PathTableError> {
        let matchers = CategoryKind::ALL
            .iter()
            .map(|&kind| Ok((kind, ctx.watch_set(kind)?)))
            .collect::<Result<Vec<_>, PathTableError>>()?;
        let canonical_root = ctx.root().canonicalize().ok();

        Ok(Self {
            ctx,
            tasks,
            matchers,
            canonical_root,
            notifier: None,
        })
    }

    /// Push reload signals to `hub` after each re-run.
    pub fn with_notifier(mut self, hub: ReloadHub) -> Self {
        self.notifier = Some(hub);
        self
    }

    /// Directories to hand to the file watcher.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        self.ctx.watch_roots()
    }

    /// Categories whose watch globs match `path`.
    pub fn categories_for(&self, path: &Path) -> Vec<CategoryKind> {
        let Some(relative) = self.relative(path) else {
            return Vec::new();
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        self.matchers
            .iter()
            .filter(|(_, set)| set.is_match(&relative))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Tasks a change to `path` triggers, in task-table order.
    pub fn tasks_for(&self, path: &Path) -> Vec<Arc<dyn TransformTask>> {
        let categories = self.categories_for(path);

        self.tasks
            .tasks()
            .iter()
            .filter(|t| categories.contains(&t.name().category()))
            .cloned()
            .collect()
    }

    /// Re-run the tasks a change triggers. Failures are logged and returned, never raised.
    ///
    /// Nothing runs while two tasks in the table would write the same file;
    /// the conflict is reported against the first triggered task.
    pub async fn dispatch(
        &self,
        event: &FileChangeEvent,
    ) -> Vec<(TaskName, Result<TaskReport, TaskError>)> {
        let tasks = self.tasks_for(&event.path);
        if tasks.is_empty() {
            tracing::debug!("Ignoring {:?} {}", event.kind, event.path.display());
            return Vec::new();
        }

        tracing::info!(
            "{:?} {}: running {}",
            event.kind,
            event.path.display(),
            tasks
                .iter()
                .map(|t| t.name().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        if let Err(e) = self.tasks.check_outputs(&self.ctx) {
            tracing::error!("Not running: {}", e);
            return vec![(tasks[0].name(), Err(e))];
        }

        let results = run_concurrently(Arc::clone(&self.ctx), tasks).await;

        for (task, result) in &results {
            match result {
                Ok(report) => {
                    if let Some(hub) = &self.notifier {
                        hub.notify(report);
                    }
                }
                Err(e) => tracing::error!("{} failed: {}", task, e),
            }
        }

        results
    }

    /// Dispatch every event until the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<FileChangeEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
        }
        tracing::debug!("Watch channel closed");
    }

    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        if path.is_relative() {
            return Some(path);
        }
        path.strip_prefix(self.ctx.root()).ok().or_else(|| {
            self.canonical_root
                .as_deref()
                .and_then(|root| path.strip_prefix(root).ok())
        })
    }
}
