//! Green-object dataset preparation
//!
//! This library sorts images by the share of green pixels they contain,
//! normalizes them to a fixed size, writes bounding box annotations for the
//! largest green region, and splits the result into train/val folders.

pub mod annotate;
pub mod color;
pub mod config;
pub mod error;
pub mod io;
pub mod normalize;
pub mod sorter;
pub mod split;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use annotate::{annotate, annotate_folder};
pub use color::{classify, classify_file, ColorBand};
pub use config::{DataLayout, PipelineConfig};
pub use error::{PrepError, Result};
pub use io::{ensure_folders_exist, finish_stage, log_file_counts, write_summary};
pub use normalize::{normalize, NormalizeOptions};
pub use sorter::sort_tree;
pub use split::{split_dataset, split_folder};
pub use types::{BoundingBox, SplitCounts, StageReport};
