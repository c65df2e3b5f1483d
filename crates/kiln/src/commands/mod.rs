pub mod build;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use kiln_pipeline::PipelineContext;

use crate::config::Config;

/// Pipeline context for the project at `root`.
fn context(root: &Path, config: &Config) -> Arc<PipelineContext> {
    Arc::new(PipelineContext::new(root).with_markup(config.markup.clone()))
}
