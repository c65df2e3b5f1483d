//! Fonts: byte copy, skipping files already up to date.

use std::path::PathBuf;

use super::{copy_output, output_path, TaskError, TaskName, TaskReport, TransformTask};
use crate::context::PipelineContext;
use crate::paths::CategoryKind;
use crate::sources::collect_sources;
use crate::stale::StalenessFilter;

/// Copies `src/fonts` into `assets/fonts`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontsTask;

impl TransformTask for FontsTask {
    fn name(&self) -> TaskName {
        TaskName::Fonts
    }

    fn planned_outputs(&self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError> {
        let category = ctx.table().category(CategoryKind::Fonts);
        Ok(collect_sources(ctx.root(), category)?
            .iter()
            .map(|font| output_path(ctx, CategoryKind::Fonts, &font.relative))
            .collect())
    }

    fn run(&self, ctx: &PipelineContext) -> Result<TaskReport, TaskError> {
        let category = ctx.table().category(CategoryKind::Fonts);
        let candidates = collect_sources(ctx.root(), category)?;
        let total = candidates.len();

        let dest_dir = ctx.dest_dir(CategoryKind::Fonts);
        let stale = StalenessFilter::new(&dest_dir)
            .retain_stale(candidates)
            .map_err(|e| TaskError::Read {
                path: dest_dir.clone(),
                source: e,
            })?;

        let mut report = TaskReport::new(self.name());
        report.skipped = total - stale.len();

        for font in stale {
            let dest = output_path(ctx, CategoryKind::Fonts, &font.relative);
            report
                .outputs
                .push(copy_output(ctx, self.name(), &font.path, &dest)?);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn copies_fonts_preserving_structure() {
        let temp = tempdir().unwrap();
        let fonts = temp.path().join("src/fonts/inter");
        fs::create_dir_all(&fonts).unwrap();
        fs::write(fonts.join("regular.woff2"), b"\x00\x01font").unwrap();

        let ctx = PipelineContext::new(temp.path());
        let report = FontsTask.run(&ctx).unwrap();

        assert_eq!(report.outputs, vec![PathBuf::from("assets/fonts/inter/regular.woff2")]);
        assert_eq!(
            fs::read(temp.path().join("dist/assets/fonts/inter/regular.woff2")).unwrap(),
            b"\x00\x01font"
        );
    }

    #[test]
    fn skips_font_with_fresher_copy() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src/fonts/a.woff2");
        let dest = temp.path().join("dist/assets/fonts/a.woff2");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&src, b"new bytes").unwrap();
        fs::write(&dest, b"old bytes").unwrap();
        set_file_mtime(&src, FileTime::from_unix_time(1_000, 0)).unwrap();
        set_file_mtime(&dest, FileTime::from_unix_time(2_000, 0)).unwrap();

        let ctx = PipelineContext::new(temp.path());
        let report = FontsTask.run(&ctx).unwrap();

        assert!(report.outputs.is_empty());
        assert_eq!(report.skipped, 1);
        assert_eq!(fs::read(&dest).unwrap(), b"old bytes");
    }
}
