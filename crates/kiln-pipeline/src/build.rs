//! Composite build: clean the output root, then run every task concurrently.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::context::PipelineContext;
use crate::paths::PathTableError;
use crate::tasks::{run_concurrently, TaskError, TaskName, TaskReport, TaskTable};

/// Where a build run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Cleaning,
    Transforming,
    Done,
    Failed,
}

/// Result of a build run.
#[derive(Debug)]
pub struct BuildResult {
    /// One report per task, in task-table order
    pub reports: Vec<TaskReport>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildResult {
    /// Number of files written across all tasks.
    pub fn outputs(&self) -> usize {
        self.reports.iter().map(|r| r.outputs.len()).sum()
    }

    /// Reports of tasks that caught a failure.
    pub fn recovered(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports.iter().filter(|r| r.recovered.is_some())
    }
}

/// Errors that end a build run.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to clean {path}: {source}")]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Task {task} failed: {source}")]
    Task {
        task: TaskName,
        #[source]
        source: TaskError,
    },

    #[error("Invalid path table: {0}")]
    PathTable(#[from] PathTableError),

    #[error("Cannot run tasks: {0}")]
    Outputs(#[source] TaskError),

    #[error("Build already ran; start a new one")]
    AlreadyRan,
}

/// One clean-then-transform build run.
pub struct CompositeBuild {
    ctx: Arc<PipelineContext>,
    tasks: TaskTable,
    phase: BuildPhase,
}

impl CompositeBuild {
    pub fn new(ctx: Arc<PipelineContext>, tasks: TaskTable) -> Self {
        Self {
            ctx,
            tasks,
            phase: BuildPhase::Idle,
        }
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Run the build. A run is terminal: calling this twice fails.
    pub async fn run(&mut self) -> Result<BuildResult, BuildError> {
        if self.phase != BuildPhase::Idle {
            return Err(BuildError::AlreadyRan);
        }

        let start = Instant::now();
        let outcome = self.execute().await;

        match outcome {
            Ok(reports) => {
                self.transition(BuildPhase::Done);
                Ok(BuildResult {
                    reports,
                    duration_ms: start.elapsed().as_millis() as u64,
                    output_dir: self.ctx.output_dir(),
                })
            }
            Err(e) => {
                self.transition(BuildPhase::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<Vec<TaskReport>, BuildError> {
        self.transition(BuildPhase::Cleaning);
        self.ctx.table().validate()?;
        self.tasks
            .check_outputs(&self.ctx)
            .map_err(BuildError::Outputs)?;

        let output_dir = self.ctx.output_dir();
        clean(&output_dir).await.map_err(|e| BuildError::Clean {
            path: output_dir.clone(),
            source: e,
        })?;

        self.transition(BuildPhase::Transforming);
        let results = run_concurrently(Arc::clone(&self.ctx), self.tasks.tasks().to_vec()).await;

        let mut reports = Vec::with_capacity(results.len());
        let mut first_error = None;

        for (task, result) in results {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!("{} failed: {}", task, e);
                    if first_error.is_none() {
                        first_error = Some(BuildError::Task { task, source: e });
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    fn transition(&mut self, next: BuildPhase) {
        tracing::debug!("Build phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

/// Remove the output root. A missing root is already clean.
pub async fn clean(output_dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(output_dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
