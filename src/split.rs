use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

use crate::config::DataLayout;
use crate::error::Result;
use crate::types::{
    annotation_path, has_extension, is_image_file, SplitCounts, StageReport, CANONICAL_EXTENSION,
};
use crate::utils::{ensure_directory, list_files, move_file};

/// Shuffle `files` with a seeded RNG and cut off the validation share.
///
/// Returns `(train, val)`. The validation share is `floor(len * val_size)`
/// and comes from the front of the shuffled list.
pub fn shuffle_and_cut(
    mut files: Vec<PathBuf>,
    val_size: f32,
    seed: u64,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut rng = StdRng::seed_from_u64(seed);
    files.shuffle(&mut rng);

    let n_val = ((files.len() as f32 * val_size).floor() as usize).min(files.len());
    let train = files.split_off(n_val);
    (train, files)
}

/// Move an image, plus its annotation record if it has one, into `out_folder`.
///
/// Returns whether the image itself moved. Failures, including a record left
/// behind after its image moved, are recorded in `report`.
fn move_with_annotation(image: &Path, out_folder: &Path, report: &mut StageReport) -> bool {
    let Some(file_name) = image.file_name() else {
        return false;
    };
    let dest = out_folder.join(file_name);
    if let Err(e) = move_file(image, &dest) {
        report.record_failure(image, e);
        return false;
    }

    let ann_src = annotation_path(image);
    if ann_src.exists() {
        let ann_dst = annotation_path(&dest);
        if let Err(e) = move_file(&ann_src, &ann_dst) {
            // The image already moved: its record is now stranded in the source folder
            report.record_failure(
                &ann_src,
                format!(
                    "inconsistent split: {} moved to {} but its annotation did not: {}",
                    image.display(),
                    out_folder.display(),
                    e
                ),
            );
        }
    }

    debug!("Moved {} to {}", image.display(), out_folder.display());
    true
}

/// Move the canonical-format images of `src_folder` into `train_folder` and
/// `val_folder`, taking sibling annotation records along.
///
/// The split is reproducible: files are enumerated in name order before the
/// seeded shuffle. Files with other extensions stay where they are.
pub fn split_folder(
    src_folder: &Path,
    train_folder: &Path,
    val_folder: &Path,
    val_size: f32,
    seed: u64,
    report: &mut StageReport,
) -> Result<SplitCounts> {
    let all_files = list_files(src_folder)?;
    let (files, ignored): (Vec<PathBuf>, Vec<PathBuf>) = all_files
        .into_iter()
        .partition(|path| has_extension(path, CANONICAL_EXTENSION));

    let ignored_images = ignored
        .iter()
        .filter(|path| is_image_file(path))
        .count();
    if ignored_images > 0 {
        warn!(
            "{}: {} images without the .{} extension are not part of the split",
            src_folder.display(),
            ignored_images,
            CANONICAL_EXTENSION
        );
    }

    report.discovered += files.len();
    let (train_files, val_files) = shuffle_and_cut(files, val_size, seed);

    ensure_directory(train_folder)?;
    ensure_directory(val_folder)?;

    let mut counts = SplitCounts::default();
    for (split, split_files, out_folder, count) in [
        ("train", train_files, train_folder, &mut counts.train),
        ("val", val_files, val_folder, &mut counts.val),
    ] {
        let mut moved = 0;
        for image in &split_files {
            if move_with_annotation(image, out_folder, report) {
                moved += 1;
            }
        }
        info!(
            "split_folder: {} {}: {} images",
            split,
            out_folder.display(),
            moved
        );
        *count = moved;
    }

    report.succeeded += counts.train + counts.val;
    Ok(counts)
}

/// Split both sorted folders of `layout` into `train/<class>` and `val/<class>`.
///
/// Each folder is shuffled with the same `seed`.
pub fn split_dataset(layout: &DataLayout, val_size: f32, seed: u64) -> Result<StageReport> {
    let mut report = StageReport::new("split");

    for (is_green, src, train, val) in [
        (true, &layout.green, &layout.train_green, &layout.val_green),
        (false, &layout.non_green, &layout.train_non_green, &layout.val_non_green),
    ] {
        if !src.is_dir() {
            warn!("{} does not exist, nothing to split", src.display());
            continue;
        }
        let counts = split_folder(src, train, val, val_size, seed, &mut report)?;
        if is_green {
            report.positive += counts.train + counts.val;
        } else {
            report.negative += counts.train + counts.val;
        }
    }

    Ok(report)
}
