use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result};
use crate::types::{has_extension, StageReport, ANNOTATION_EXTENSION, CANONICAL_EXTENSION};
use crate::utils::{create_progress_bar, is_same_file, list_files, load_rgb_image};

/// Target geometry and encoding for normalized images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl NormalizeOptions {
    pub fn new((width, height): (u32, u32), quality: u8) -> Self {
        Self {
            width,
            height,
            quality,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum NormalizeOutcome {
    Rewritten,
    AlreadyNormalized,
}

/// Where `path` ends up after normalization.
pub fn canonical_path(path: &Path) -> PathBuf {
    path.with_extension(CANONICAL_EXTENSION)
}

fn is_normalized(path: &Path, options: &NormalizeOptions) -> bool {
    if canonical_path(path) != path {
        return false;
    }
    matches!(
        image::image_dimensions(path),
        Ok((w, h)) if w == options.width && h == options.height
    )
}

/// Resize one image to exactly the target size (aspect ratio is not kept),
/// write it as JPEG under the canonical extension, then delete the original
/// if it had a different extension.
fn normalize_file(path: &Path, options: &NormalizeOptions) -> Result<NormalizeOutcome> {
    if is_normalized(path, options) {
        debug!("Already normalized: {}", path.display());
        return Ok(NormalizeOutcome::AlreadyNormalized);
    }

    let image = load_rgb_image(path)?;
    let resized = imageops::resize(&image, options.width, options.height, FilterType::Triangle);

    let target = canonical_path(path);
    let file = File::create(&target).map_err(|e| PrepError::io("create image", &target, e))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, options.quality)
        .encode_image(&resized)
        .map_err(|e| PrepError::Encode {
            path: target.clone(),
            source: e,
        })?;
    writer
        .flush()
        .map_err(|e| PrepError::io("write image", &target, e))?;

    // On a case-insensitive filesystem `IMG.JPG` and `IMG.jpg` are the file just written
    if path.exists() && !is_same_file(path, &target) {
        fs::remove_file(path).map_err(|e| PrepError::io("remove original", path, e))?;
    }

    debug!("Processed and saved: {}", target.display());
    Ok(NormalizeOutcome::Rewritten)
}

/// Normalize every regular file in `folder` (annotation records excepted).
///
/// Afterwards exactly one `<stem>.jpg` survives per basename. Running it
/// again over a normalized folder rewrites and deletes nothing.
pub fn normalize(folder: &Path, options: &NormalizeOptions) -> Result<StageReport> {
    let mut report = StageReport::new("normalize");

    let files: Vec<PathBuf> = list_files(folder)?
        .into_iter()
        .filter(|path| !has_extension(path, ANNOTATION_EXTENSION))
        .collect();
    report.discovered = files.len();
    info!("Normalizing {} files in {}", files.len(), folder.display());

    // Sources sharing a stem write the same target, so they run in order
    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        groups.entry(canonical_path(&path)).or_default().push(path);
    }
    for (target, sources) in groups.iter().filter(|(_, s)| s.len() > 1) {
        warn!(
            "{} files normalize to {}; the last one processed wins",
            sources.len(),
            target.display()
        );
    }

    let pb = create_progress_bar(report.discovered as u64, "Clean");
    let outcomes: Vec<(PathBuf, Result<NormalizeOutcome>)> = groups
        .into_par_iter()
        .flat_map_iter(|(_, sources)| {
            let pb = &pb;
            sources.into_iter().map(move |path| {
                let outcome = normalize_file(&path, options);
                pb.inc(1);
                (path, outcome)
            })
        })
        .collect();
    pb.finish_with_message("Normalization complete");

    for (path, outcome) in outcomes {
        match outcome {
            Ok(NormalizeOutcome::Rewritten) => report.succeeded += 1,
            Ok(NormalizeOutcome::AlreadyNormalized) => report.skipped += 1,
            Err(e) => report.record_failure(&path, e),
        }
    }

    Ok(report)
}
