//! The path table: which sources feed which output directory.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// A class of source file with its own transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryKind {
    Markup,
    Styles,
    Fonts,
    Images,
    Assets,
}

impl CategoryKind {
    /// Every category, in table order.
    pub const ALL: [CategoryKind; 5] = [
        CategoryKind::Markup,
        CategoryKind::Styles,
        CategoryKind::Fonts,
        CategoryKind::Images,
        CategoryKind::Assets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Styles => "styles",
            Self::Fonts => "fonts",
            Self::Images => "images",
            Self::Assets => "assets",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asset category. All paths are relative to the project root.
#[derive(Debug, Clone)]
pub struct AssetCategory {
    /// Which category this is
    pub kind: CategoryKind,

    /// Directory output paths are made relative to
    pub base: PathBuf,

    /// Globs selecting the files to transform
    pub sources: Vec<String>,

    /// Destination directory
    pub dest: PathBuf,

    /// Globs whose changes re-run this category (empty means `sources`)
    pub watch: Vec<String>,
}

impl AssetCategory {
    fn new(kind: CategoryKind, base: &str, sources: &[&str], dest: &str) -> Self {
        Self {
            kind,
            base: PathBuf::from(base),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            dest: PathBuf::from(dest),
            watch: Vec::new(),
        }
    }

    fn watching(mut self, watch: &[&str]) -> Self {
        self.watch = watch.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Globs that trigger a re-run of this category.
    pub fn watch_globs(&self) -> &[String] {
        if self.watch.is_empty() {
            &self.sources
        } else {
            &self.watch
        }
    }

    /// Compiled source globs.
    pub fn source_set(&self) -> Result<GlobSet, PathTableError> {
        compile_globs(&self.sources)
    }

    /// Compiled watch globs.
    pub fn watch_set(&self) -> Result<GlobSet, PathTableError> {
        compile_globs(self.watch_globs())
    }
}

/// Errors in a path table.
#[derive(Debug, thiserror::Error)]
pub enum PathTableError {
    #[error("Categories {first} and {second} both write to {dest}")]
    SharedDestination {
        first: CategoryKind,
        second: CategoryKind,
        dest: PathBuf,
    },

    #[error("Category {kind} writes to {dest}, outside the output root {root}")]
    OutsideOutputRoot {
        kind: CategoryKind,
        dest: PathBuf,
        root: PathBuf,
    },

    #[error("Invalid glob pattern {pattern}: {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Output root {0} must be a relative directory below the project root")]
    UnsafeOutputRoot(PathBuf),
}

/// Static mapping of categories to source globs and destination directories.
#[derive(Debug, Clone)]
pub struct PathTable {
    source_root: PathBuf,
    output_root: PathBuf,
    categories: [AssetCategory; 5],
}

impl PathTable {
    /// The standard `src/` to `dist/` layout.
    pub fn standard() -> Self {
        use CategoryKind::*;

        Self {
            source_root: PathBuf::from("src"),
            output_root: PathBuf::from("dist"),
            categories: [
                AssetCategory::new(Markup, "src/pages", &["src/pages/**/*.html"], "dist"),
                AssetCategory::new(Styles, "src/scss", &["src/scss/main.scss"], "dist/assets/css")
                    .watching(&["src/scss/**/*.scss"]),
                AssetCategory::new(
                    Fonts,
                    "src/fonts",
                    &["src/fonts/**/*.{ttf,woff,woff2,eot,otf}"],
                    "dist/assets/fonts",
                ),
                AssetCategory::new(
                    Images,
                    "src/images",
                    &["src/images/**/*.{jpg,jpeg,png,gif,webp,bmp,tif,tiff}"],
                    "dist/assets/images",
                ),
                AssetCategory::new(Assets, "src/assets", &["src/assets/**/*"], "dist/assets"),
            ],
        }
    }

    /// Root of every source directory.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Root of every destination directory; removed by the clean step.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn categories(&self) -> &[AssetCategory] {
        &self.categories
    }

    pub fn category(&self, kind: CategoryKind) -> &AssetCategory {
        &self.categories[kind.index()]
    }

    /// Check that destinations are distinct, inside the output root, and that every glob compiles.
    pub fn validate(&self) -> Result<(), PathTableError> {
        let below_root = self.output_root.components().count() > 0
            && self
                .output_root
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !below_root {
            return Err(PathTableError::UnsafeOutputRoot(self.output_root.clone()));
        }

        for (i, first) in self.categories.iter().enumerate() {
            if !first.dest.starts_with(&self.output_root) {
                return Err(PathTableError::OutsideOutputRoot {
                    kind: first.kind,
                    dest: first.dest.clone(),
                    root: self.output_root.clone(),
                });
            }

            for second in &self.categories[i + 1..] {
                if first.dest == second.dest {
                    return Err(PathTableError::SharedDestination {
                        first: first.kind,
                        second: second.kind,
                        dest: first.dest.clone(),
                    });
                }
            }

            first.source_set()?;
            first.watch_set()?;
        }

        Ok(())
    }

}

impl Default for PathTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Compile globs with `*` confined to one path segment. Matching ignores case.
pub fn compile_globs(patterns: &[String]) -> Result<GlobSet, PathTableError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(true)
            .build()
            .map_err(|e| PathTableError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| PathTableError::InvalidGlob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_valid() {
        PathTable::standard().validate().unwrap();
    }

    #[test]
    fn destinations_are_pairwise_distinct() {
        let table = PathTable::standard();

        for (i, a) in table.categories().iter().enumerate() {
            for b in &table.categories()[i + 1..] {
                assert_ne!(a.dest, b.dest, "{} and {} share a destination", a.kind, b.kind);
            }
        }
    }

    #[test]
    fn categories_are_indexed_by_kind() {
        let table = PathTable::standard();

        for kind in CategoryKind::ALL {
            assert_eq!(table.category(kind).kind, kind);
        }
    }

    #[test]
    fn markup_watches_pages() {
        let table = PathTable::standard();
        let set = table.category(CategoryKind::Markup).watch_set().unwrap();

        assert!(set.is_match("src/pages/about/index.html"));
        assert!(!set.is_match("src/scss/main.scss"));
    }

    #[test]
    fn extensions_match_in_any_case() {
        let table = PathTable::standard();
        let images = table.category(CategoryKind::Images).source_set().unwrap();
        let fonts = table.category(CategoryKind::Fonts).source_set().unwrap();

        assert!(images.is_match("src/images/IMG_0001.JPG"));
        assert!(images.is_match("src/images/photo.PNG"));
        assert!(fonts.is_match("src/fonts/Inter.WOFF2"));
        assert!(!images.is_match("src/images/notes.TXT"));
    }

    #[test]
    fn styles_source_is_only_the_entry_point() {
        let table = PathTable::standard();
        let styles = table.category(CategoryKind::Styles);

        assert!(styles.source_set().unwrap().is_match("src/scss/main.scss"));
        assert!(!styles.source_set().unwrap().is_match("src/scss/_vars.scss"));
        assert!(styles.watch_set().unwrap().is_match("src/scss/partials/_vars.scss"));
    }

    #[test]
    fn font_glob_matches_extensions() {
        let set = PathTable::standard()
            .category(CategoryKind::Fonts)
            .source_set()
            .unwrap();

        assert!(set.is_match("src/fonts/inter/a.woff2"));
        assert!(set.is_match("src/fonts/b.ttf"));
        assert!(!set.is_match("src/fonts/readme.txt"));
    }

    #[test]
    fn single_star_stays_in_segment() {
        let set = compile_globs(&["src/*.html".to_string()]).unwrap();

        assert!(set.is_match("src/a.html"));
        assert!(!set.is_match("src/nested/a.html"));
    }

    #[test]
    fn rejects_shared_destination() {
        let mut table = PathTable::standard();
        table.categories[CategoryKind::Fonts.index()].dest = PathBuf::from("dist/assets/css");

        let err = table.validate().unwrap_err();

        assert!(matches!(
            err,
            PathTableError::SharedDestination {
                first: CategoryKind::Styles,
                second: CategoryKind::Fonts,
                ..
            }
        ));
    }

    #[test]
    fn rejects_destination_outside_output() {
        let mut table = PathTable::standard();
        table.categories[CategoryKind::Assets.index()].dest = PathBuf::from("public");

        assert!(matches!(
            table.validate(),
            Err(PathTableError::OutsideOutputRoot { kind: CategoryKind::Assets, .. })
        ));
    }

    #[test]
    fn rejects_output_root_that_escapes() {
        for root in ["", "..", "/tmp/dist"] {
            let mut table = PathTable::standard();
            table.output_root = PathBuf::from(root);

            assert!(
                matches!(table.validate(), Err(PathTableError::UnsafeOutputRoot(_))),
                "{root:?} accepted"
            );
        }
    }

    #[test]
    fn rejects_invalid_glob() {
        let err = compile_globs(&["src/{a,b".to_string()]).unwrap_err();

        assert!(matches!(err, PathTableError::InvalidGlob { .. }));
    }
}
