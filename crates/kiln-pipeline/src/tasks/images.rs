//! Images: WebP re-encoding and responsive WebP variants.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;
use rayon::prelude::*;

use super::{output_path, write_output, TaskError, TaskName, TaskReport, TransformTask};
use crate::context::PipelineContext;
use crate::paths::CategoryKind;
use crate::sources::{collect_sources, SourceFile};
use crate::stale::StalenessFilter;

/// Lossy WebP quality for every encoded image.
pub const QUALITY: f32 = 80.0;

/// Responsive variants: target width and filename suffix.
pub const VARIANTS: [(u32, &str); 2] = [(640, "-sm"), (1024, "-lg")];

fn image_error(path: &Path, message: impl ToString) -> TaskError {
    TaskError::Image {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn decode(path: &Path) -> Result<DynamicImage, TaskError> {
    let img = image::open(path).map_err(|e| image_error(path, e))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(image_error(path, "image has no pixels"));
    }
    Ok(img)
}

/// Encode as lossy WebP.
pub fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Vec<u8>, String> {
    // The encoder only accepts 8-bit RGB(A).
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let encoder = webp::Encoder::from_image(&normalized).map_err(|e| e.to_string())?;
    Ok(encoder.encode(quality).to_vec())
}

/// Scale to `width`, keeping the aspect ratio.
pub fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let (w, h) = (u64::from(img.width()), u64::from(img.height()));
    let height = ((h * u64::from(width) + w / 2) / w).max(1);
    img.resize_exact(width, height as u32, FilterType::Lanczos3)
}

/// `photo.jpg` with suffix `-sm` becomes `photo-sm.webp`.
fn variant_path(relative: &Path, suffix: &str) -> PathBuf {
    let stem = relative
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    relative.with_file_name(format!("{}{}.webp", stem, suffix))
}

fn webp_path(ctx: &PipelineContext, file: &SourceFile) -> PathBuf {
    output_path(ctx, CategoryKind::Images, &file.relative.with_extension("webp"))
}

/// Re-encodes every image as WebP next to its original name.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpTask;

impl TransformTask for WebpTask {
    fn name(&self) -> TaskName {
        TaskName::ImagesWebp
    }

    fn planned_outputs(&self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError> {
        let category = ctx.table().category(CategoryKind::Images);
        Ok(collect_sources(ctx.root(), category)?
            .iter()
            .map(|file| webp_path(ctx, file))
            .collect())
    }

    fn run(&self, ctx: &PipelineContext) -> Result<TaskReport, TaskError> {
        let category = ctx.table().category(CategoryKind::Images);
        let candidates = collect_sources(ctx.root(), category)?;
        let total = candidates.len();

        let dest_dir = ctx.dest_dir(CategoryKind::Images);
        let stale = StalenessFilter::new(&dest_dir)
            .with_extension("webp")
            .retain_stale(candidates)
            .map_err(|e| TaskError::Read {
                path: dest_dir.clone(),
                source: e,
            })?;

        let outputs = stale
            .par_iter()
            .map(|file| {
                let img = decode(&file.path)?;
                let bytes = encode_webp(&img, QUALITY).map_err(|e| image_error(&file.path, e))?;
                let dest = webp_path(ctx, file);
                write_output(ctx, self.name(), &dest, &bytes)
            })
            .collect::<Result<Vec<_>, TaskError>>()?;

        let mut report = TaskReport::new(self.name());
        report.skipped = total - stale.len();
        report.outputs = outputs;
        Ok(report)
    }
}

/// Writes the `-sm` and `-lg` width variants of every image, every run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsiveImagesTask;

impl ResponsiveImagesTask {
    fn variants(&self, ctx: &PipelineContext, file: &SourceFile) -> Result<Vec<PathBuf>, TaskError> {
        let img = decode(&file.path)?;

        VARIANTS
            .iter()
            .map(|&(width, suffix)| {
                let resized = resize_to_width(&img, width);
                let bytes = encode_webp(&resized, QUALITY).map_err(|e| image_error(&file.path, e))?;
                let dest = output_path(ctx, CategoryKind::Images, &variant_path(&file.relative, suffix));
                write_output(ctx, self.name(), &dest, &bytes)
            })
            .collect()
    }
}

impl TransformTask for ResponsiveImagesTask {
    fn name(&self) -> TaskName {
        TaskName::ImagesResponsive
    }

    fn planned_outputs(&self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, TaskError> {
        let category = ctx.table().category(CategoryKind::Images);
        Ok(collect_sources(ctx.root(), category)?
            .iter()
            .flat_map(|file| {
                VARIANTS.iter().map(move |&(_, suffix)| {
                    output_path(ctx, CategoryKind::Images, &variant_path(&file.relative, suffix))
                })
            })
            .collect())
    }

    fn run(&self, ctx: &PipelineContext) -> Result<TaskReport, TaskError> {
        let category = ctx.table().category(CategoryKind::Images);
        let images = collect_sources(ctx.root(), category)?;

        let outputs = images
            .par_iter()
            .map(|file| self.variants(ctx, file))
            .collect::<Result<Vec<_>, TaskError>>()?;

        let mut report = TaskReport::new(self.name());
        report.outputs = outputs.into_iter().flatten().collect();
        Ok(report)
    }
}
