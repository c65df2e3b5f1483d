//! Generic assets: unconditional byte copy.

use std::path::PathBuf;

use super::{copy_output, output_path, TaskError, TaskName, TaskReport, TransformTask};
use crate::context::PipelineContext;
use crate::paths::CategoryKind;
use crate::sources::collect_sources;

/// Copies everything under `src/assets` into `assets`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetsTask;

impl TransformTask for AssetsTask {
    fn name(&self) -> TaskName {
        TaskName::Assets
    }

    fn planned_outputs(&self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError> {
        let category = ctx.table().category(CategoryKind::Assets);
        Ok(collect_sources(ctx.root(), category)?
            .iter()
            .map(|asset| output_path(ctx, CategoryKind::Assets, &asset.relative))
            .collect())
    }

    fn run(&self, ctx: &PipelineContext) -> Result<TaskReport, TaskError> {
        let category = ctx.table().category(CategoryKind::Assets);
        let mut report = TaskReport::new(self.name());

        for asset in collect_sources(ctx.root(), category)? {
            let dest = output_path(ctx, CategoryKind::Assets, &asset.relative);
            report
                .outputs
                .push(copy_output(ctx, self.name(), &asset.path, &dest)?);
        }

        Ok(report)
    }
}
