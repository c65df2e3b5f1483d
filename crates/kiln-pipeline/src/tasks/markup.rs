//! HTML pages: include expansion and comment stripping.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::Deserialize;

use kiln_include::{strip_comments, IncludeOptions, Resolver};

use super::{output_path, write_output, TaskError, TaskName, TaskReport, TransformTask};
use crate::context::PipelineContext;
use crate::paths::CategoryKind;
use crate::sources::collect_sources;

/// Include settings for the markup task (the `[markup]` config section).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkupOptions {
    /// Token that starts include directives and variables
    pub include_prefix: String,

    /// Include-file base directory, relative to the project root
    pub include_dir: PathBuf,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            include_prefix: "@@".to_string(),
            include_dir: PathBuf::from("src/components"),
        }
    }
}

/// Renders `src/pages/**/*.html` into the output root.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupTask;

impl TransformTask for MarkupTask {
    fn name(&self) -> TaskName {
        TaskName::Markup
    }

    fn planned_outputs(&self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError> {
        let category = ctx.table().category(CategoryKind::Markup);
        Ok(collect_sources(ctx.root(), category)?
            .iter()
            .map(|page| output_path(ctx, CategoryKind::Markup, &page.relative))
            .collect())
    }

    fn run(&self, ctx: &PipelineContext) -> Result<TaskReport, TaskError> {
        let category = ctx.table().category(CategoryKind::Markup);
        let pages = collect_sources(ctx.root(), category)?;

        let resolver = Resolver::new(IncludeOptions {
            prefix: ctx.markup().include_prefix.clone(),
            basepath: ctx.root().join(&ctx.markup().include_dir),
        })?;

        let outputs = pages
            .par_iter()
            .map(|page| {
                let html = resolver.render_file(&page.path)?;
                let html = strip_comments(&html);
                let dest = output_path(ctx, CategoryKind::Markup, &page.relative);
                write_output(ctx, self.name(), &dest, html.as_bytes())
            })
            .collect::<Result<Vec<_>, TaskError>>()?;

        let mut report = TaskReport::new(self.name());
        report.outputs = outputs;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn project() -> tempfile::TempDir {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/pages/blog")).unwrap();
        fs::create_dir_all(temp.path().join("src/components")).unwrap();
        temp
    }

    #[test]
    fn renders_pages_with_includes() {
        let temp = project();
        fs::write(
            temp.path().join("src/components/header.html"),
            "<!-- header -->\n<header>@@title</header>",
        )
        .unwrap();
        fs::write(
            temp.path().join("src/pages/index.html"),
            "<body>\n  @@include('header.html', {\"title\": \"Home\"})\n</body>",
        )
        .unwrap();
        fs::write(temp.path().join("src/pages/blog/post.html"), "<p>post</p>").unwrap();

        let ctx = PipelineContext::new(temp.path());
        let report = MarkupTask.run(&ctx).unwrap();

        assert_eq!(
            report.outputs,
            vec![PathBuf::from("blog/post.html"), PathBuf::from("index.html")]
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("dist/index.html")).unwrap(),
            "<body>\n  \n<header>Home</header>\n</body>"
        );
        assert!(temp.path().join("dist/blog/post.html").exists());
    }

    #[test]
    fn components_are_not_pages() {
        let temp = project();
        fs::write(temp.path().join("src/components/footer.html"), "<footer></footer>").unwrap();

        let ctx = PipelineContext::new(temp.path());
        let report = MarkupTask.run(&ctx).unwrap();

        assert!(report.outputs.is_empty());
        assert!(!temp.path().join("dist/footer.html").exists());
    }

    #[test]
    fn honours_custom_prefix_and_directory() {
        let temp = project();
        fs::create_dir_all(temp.path().join("partials")).unwrap();
        fs::write(temp.path().join("partials/nav.html"), "<nav></nav>").unwrap();
        fs::write(temp.path().join("src/pages/index.html"), "%%include('nav.html')").unwrap();

        let ctx = PipelineContext::new(temp.path()).with_markup(MarkupOptions {
            include_prefix: "%%".to_string(),
            include_dir: PathBuf::from("partials"),
        });
        MarkupTask.run(&ctx).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("dist/index.html")).unwrap(),
            "<nav></nav>"
        );
    }

    #[test]
    fn missing_include_fails_the_task() {
        let temp = project();
        fs::write(temp.path().join("src/pages/index.html"), "@@include('nope.html')").unwrap();

        let ctx = PipelineContext::new(temp.path());
        let err = MarkupTask.run(&ctx).unwrap_err();

        assert!(matches!(err, TaskError::Include(_)));
    }
}
