//! One-shot build command.

use std::path::Path;

use anyhow::Result;
use kiln_pipeline::{CompositeBuild, TaskTable};

use crate::config::Config;

/// Run the build command.
pub async fn run(root: &Path, config: &Config) -> Result<()> {
    tracing::info!("Building {}...", root.display());

    let result = CompositeBuild::new(super::context(root, config), TaskTable::standard())
        .run()
        .await?;

    for report in result.recovered() {
        if let Some(message) = &report.recovered {
            tracing::warn!("{} produced no output: {}", report.task, message);
        }
    }

    tracing::info!(
        "Built {} files with {} tasks in {}ms",
        result.outputs(),
        result.reports.len(),
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
