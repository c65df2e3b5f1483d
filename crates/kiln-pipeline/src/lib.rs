//! Asset pipeline for kiln sites.
//!
//! Maps source categories to output directories, runs one transform task per
//! category, and sequences them into a clean-then-transform composite build.

pub mod build;
pub mod context;
pub mod paths;
pub mod sources;
pub mod stale;
pub mod tasks;

pub use build::{clean, BuildError, BuildPhase, BuildResult, CompositeBuild};
pub use context::PipelineContext;
pub use paths::{AssetCategory, CategoryKind, PathTable, PathTableError};
pub use sources::{collect_sources, SourceFile};
pub use stale::{is_stale, StalenessFilter};
pub use tasks::{
    run_concurrently, MarkupOptions, TaskError, TaskName, TaskReport, TaskTable, TransformTask,
};
