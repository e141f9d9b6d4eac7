use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// Image formats picked up by the sorter and annotator
pub const IMG_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

// Format every image is re-encoded to by the normalizer, and the only one the splitter moves
pub const CANONICAL_EXTENSION: &str = "jpg";

// Sibling bounding box records
pub const ANNOTATION_EXTENSION: &str = "txt";

static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// True when `path` has one of the allow-listed image extensions (any case).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

/// True when `path` ends in `ext`, ignoring case.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Path of the annotation record that belongs to `image_path`.
pub fn annotation_path(image_path: &Path) -> PathBuf {
    image_path.with_extension(ANNOTATION_EXTENSION)
}

/// Axis-aligned bounding box in pixel coordinates.
///
/// Written to disk as a single `x y width height` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The on-disk record, newline terminated.
    pub fn to_record(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.x, self.y, self.width, self.height)
    }
}

/// Outcome of splitting one folder.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
}

// A single unit of work that could not be completed
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

// Per-stage processing statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub discovered: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub positive: usize,
    pub negative: usize,
    pub failures: Vec<FileFailure>,
}

impl StageReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Default::default()
        }
    }

    pub fn record_failure(&mut self, path: &Path, error: impl fmt::Display) {
        log::error!("{}", error);
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Fold another report for the same stage into this one.
    pub fn merge(&mut self, other: StageReport) {
        self.discovered += other.discovered;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.positive += other.positive;
        self.negative += other.negative;
        self.failures.extend(other.failures);
    }

    pub fn print_summary(&self) {
        log::info!("=== {} summary ===", self.stage);
        log::info!("Files discovered: {}", self.discovered);
        log::info!("Succeeded: {}", self.succeeded);
        if self.positive + self.negative > 0 {
            log::info!("Green: {}, non-green: {}", self.positive, self.negative);
        }
        if self.skipped > 0 {
            log::info!("Skipped: {}", self.skipped);
        }
        if self.has_failures() {
            log::error!("Failed: {}", self.failed());
        } else {
            log::info!("Failed: 0");
        }
    }
}
