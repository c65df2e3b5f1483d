//! Stylesheets: Sass compilation, vendor prefixing, minification.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use super::{output_path, write_output, TaskError, TaskName, TaskReport, TransformTask};
use crate::context::PipelineContext;
use crate::paths::CategoryKind;
use crate::sources::{collect_sources, SourceFile};

/// Stylesheet compile failures. These never abort a build.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StyleError {
    #[error("Sass error: {0}")]
    Sass(String),

    #[error("CSS error: {0}")]
    Css(String),
}

const fn version(major: u32, minor: u32) -> Option<u32> {
    Some((major << 16) | (minor << 8))
}

/// Browsers the prefixer targets. No engine here needs the old grid syntax.
pub fn target_browsers() -> Browsers {
    Browsers {
        chrome: version(109, 0),
        edge: version(109, 0),
        firefox: version(115, 0),
        safari: version(15, 4),
        ios_saf: version(15, 4),
        opera: version(95, 0),
        samsung: version(20, 0),
        android: version(109, 0),
        ..Browsers::default()
    }
}

/// Compile a Sass entry point to CSS. Imports resolve against `load_path`.
pub fn compile_sass(entry: &Path, load_path: &Path) -> Result<String, StyleError> {
    let options = grass::Options::default().load_path(load_path);
    grass::from_path(entry, &options).map_err(|e| StyleError::Sass(e.to_string()))
}

/// Add vendor prefixes and minify.
pub fn finish_css(css: &str) -> Result<String, StyleError> {
    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| StyleError::Css(e.to_string()))?;

    stylesheet
        .minify(MinifyOptions {
            targets: Targets::from(target_browsers()),
            ..Default::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            targets: Targets::from(target_browsers()),
            ..Default::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    Ok(printed.code)
}

fn stylesheet_path(ctx: &PipelineContext, entry: &SourceFile) -> PathBuf {
    output_path(ctx, CategoryKind::Styles, &entry.relative.with_extension("css"))
}

/// Compiles `src/scss/main.scss` to `assets/css/main.css`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StylesTask;

impl TransformTask for StylesTask {
    fn name(&self) -> TaskName {
        TaskName::Styles
    }

    fn planned_outputs(&self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError> {
        let category = ctx.table().category(CategoryKind::Styles);
        Ok(collect_sources(ctx.root(), category)?
            .iter()
            .map(|entry| stylesheet_path(ctx, entry))
            .collect())
    }

    fn run(&self, ctx: &PipelineContext) -> Result<TaskReport, TaskError> {
        let category = ctx.table().category(CategoryKind::Styles);
        let load_path = ctx.root().join(&category.base);
        let mut report = TaskReport::new(self.name());

        for entry in collect_sources(ctx.root(), category)? {
            let css = match compile_sass(&entry.path, &load_path).and_then(|css| finish_css(&css)) {
                Ok(css) => css,
                Err(e) => {
                    tracing::error!("{}: {}", entry.path.display(), e);
                    report.recovered = Some(e.to_string());
                    continue;
                }
            };

            let dest = stylesheet_path(ctx, &entry);
            report.outputs.push(write_output(ctx, self.name(), &dest, css.as_bytes())?);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn project(main: &str) -> tempfile::TempDir {
        let temp = tempdir().unwrap();
        let scss = temp.path().join("src/scss");
        fs::create_dir_all(&scss).unwrap();
        fs::write(scss.join("_vars.scss"), "$accent: #ff0000;").unwrap();
        fs::write(scss.join("main.scss"), main).unwrap();
        temp
    }

    #[test]
    fn minifies_css() {
        let css = ".button {\n    background-color: blue;\n    padding: 10px;\n}\n";

        let minified = finish_css(css).unwrap();

        assert!(!minified.contains('\n'));
        assert!(minified.contains(".button"));
    }

    #[test]
    fn adds_vendor_prefixes() {
        let css = ".glass { backdrop-filter: blur(4px); }";

        let out = finish_css(css).unwrap();

        assert!(out.contains("-webkit-backdrop-filter"), "{out}");
    }

    #[test]
    fn compiles_main_with_partials() {
        let temp = project("@use 'vars';\n.title { .accent { color: vars.$accent; } }");
        let ctx = PipelineContext::new(temp.path());

        let report = StylesTask.run(&ctx).unwrap();

        assert_eq!(report.outputs, vec![PathBuf::from("assets/css/main.css")]);
        assert_eq!(report.recovered, None);
        let css = fs::read_to_string(temp.path().join("dist/assets/css/main.css")).unwrap();
        assert!(css.contains(".title .accent"));
        assert!(css.contains("red") || css.contains("#f00"));
        assert!(!temp.path().join("dist/assets/css/_vars.css").exists());
    }

    #[test]
    fn syntax_error_is_recovered() {
        let temp = project(".broken { color: red;");
        let ctx = PipelineContext::new(temp.path());

        let report = StylesTask.run(&ctx).unwrap();

        assert!(report.outputs.is_empty());
        assert!(report.recovered.is_some());
        assert!(!temp.path().join("dist/assets/css/main.css").exists());
    }

    #[test]
    fn no_entry_point_writes_nothing() {
        let temp = tempdir().unwrap();
        let ctx = PipelineContext::new(temp.path());

        let report = StylesTask.run(&ctx).unwrap();

        assert!(!report.wrote_anything());
    }
}
