use clap::{Args as ClapArgs, Parser};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::color::ColorBand;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_SORT_SOURCE: &str = "data/raw_images/Fruit_Flower_Veg";
pub const DEFAULT_GREEN_THRESHOLD: f64 = 0.05;
pub const DEFAULT_TARGET_SIZE: (u32, u32) = (320, 240);
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
pub const DEFAULT_VAL_SIZE: f32 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

// HSV bounds for green, OpenCV 8-bit scale (H 0..=179)
pub const GREEN_LOWER: [u8; 3] = [50, 100, 100];
pub const GREEN_UPPER: [u8; 3] = [70, 255, 255];

/// Options shared by every stage binary
#[derive(ClapArgs, Debug, Clone)]
pub struct CommonArgs {
    /// Root of the dataset folder layout
    #[arg(long = "data_dir", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Write the stage report as JSON to this file
    #[arg(long = "summary")]
    pub summary: Option<PathBuf>,
}

/// Create the dataset folder layout and report file counts.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct SetupArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Sort images into green and non-green folders by HSV pixel ratio.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct SortArgs {
    /// Directory tree to scan for images
    #[arg(default_value = DEFAULT_SORT_SOURCE)]
    pub source: PathBuf,

    /// Minimum fraction of green pixels for an image to count as green
    #[arg(long = "threshold", default_value_t = DEFAULT_GREEN_THRESHOLD, value_parser = validate_ratio)]
    pub threshold: f64,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Resize the sorted images to a fixed size and re-encode them as JPEG.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct CleanArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Write a bounding box record for the largest green region of each green image.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct AnnotateArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Move the sorted images into train and validation folders.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct SplitArgs {
    /// Proportion of each folder to use for validation
    #[arg(long = "val_size", default_value_t = DEFAULT_VAL_SIZE, value_parser = validate_size)]
    pub val_size: f32,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    #[command(flatten)]
    pub common: CommonArgs,
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

pub fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("THRESHOLD must be between 0.0 and 1.0".to_string()),
    }
}

/// Folder layout under the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub root: PathBuf,
    pub raw_images: PathBuf,
    pub green: PathBuf,
    pub non_green: PathBuf,
    pub train_green: PathBuf,
    pub train_non_green: PathBuf,
    pub val_green: PathBuf,
    pub val_non_green: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            raw_images: root.join("raw_images"),
            green: root.join("green"),
            non_green: root.join("non_green"),
            train_green: root.join("train/green"),
            train_non_green: root.join("train/non_green"),
            val_green: root.join("val/green"),
            val_non_green: root.join("val/non_green"),
            root,
        }
    }

    /// Every folder of the layout, inputs first.
    pub fn all_folders(&self) -> [&Path; 7] {
        [
            &self.raw_images,
            &self.green,
            &self.non_green,
            &self.train_green,
            &self.train_non_green,
            &self.val_green,
            &self.val_non_green,
        ]
    }

    /// The two sorted folders, green first.
    pub fn sorted_folders(&self) -> [&Path; 2] {
        [&self.green, &self.non_green]
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

/// Settings handed to each stage. Built once at startup, never mutated.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: DataLayout,
    pub band: ColorBand,
    pub threshold: f64,
    pub target_size: (u32, u32),
    pub jpeg_quality: u8,
    pub val_size: f32,
    pub seed: u64,
}

impl PipelineConfig {
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            layout: DataLayout::new(data_dir),
            ..Self::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: DataLayout::default(),
            band: ColorBand::green(),
            threshold: DEFAULT_GREEN_THRESHOLD,
            target_size: DEFAULT_TARGET_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            val_size: DEFAULT_VAL_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}
