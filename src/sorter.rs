use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::color::{classify_file, ColorBand};
use crate::error::{PrepError, Result};
use crate::types::StageReport;
use crate::utils::{copy_file, create_progress_bar, ensure_directory, walk_images};

/// A source image and the file name it gets in the sorted folders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortJob {
    pub source: PathBuf,
    pub file_name: String,
}

enum SortOutcome {
    Positive,
    Negative,
    Failed(PrepError),
}

/// Assign destination file names to `files` (expected sorted by path).
///
/// The first file with a given basename keeps it. Later ones are prefixed
/// with their parent path relative to `root`, e.g. `apple/img1.jpg`
/// becomes `apple_img1.jpg`.
pub fn assign_destination_names(root: &Path, files: &[PathBuf]) -> Vec<SortJob> {
    let mut claimed: HashSet<String> = HashSet::with_capacity(files.len());
    let mut jobs = Vec::with_capacity(files.len());

    for source in files {
        let base = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut file_name = base.clone();
        if claimed.contains(&file_name.to_lowercase()) {
            let parent = source
                .strip_prefix(root)
                .ok()
                .and_then(|rel| rel.parent())
                .map(|parent| {
                    parent
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("_")
                })
                .unwrap_or_default();
            if !parent.is_empty() {
                file_name = sanitize_filename::sanitize(format!("{}_{}", parent, base));
            }

            // Two sources can still flatten to the same name
            let mut n = 1;
            let candidate = file_name.clone();
            while claimed.contains(&file_name.to_lowercase()) {
                let path = Path::new(&candidate);
                let stem = path.file_stem().unwrap_or_default().to_string_lossy();
                file_name = match path.extension() {
                    Some(ext) => format!("{}-{}.{}", stem, n, ext.to_string_lossy()),
                    None => format!("{}-{}", stem, n),
                };
                n += 1;
            }
            warn!(
                "Basename collision for {}; storing it as {}",
                source.display(),
                file_name
            );
        }

        claimed.insert(file_name.to_lowercase());
        jobs.push(SortJob {
            source: source.clone(),
            file_name,
        });
    }

    jobs
}

fn sort_one(
    job: &SortJob,
    positive_dir: &Path,
    negative_dir: &Path,
    band: &ColorBand,
    threshold: f64,
) -> SortOutcome {
    let is_green = match classify_file(&job.source, band, threshold) {
        Ok((is_green, _)) => is_green,
        Err(e) => return SortOutcome::Failed(e),
    };

    let dest_dir = if is_green { positive_dir } else { negative_dir };
    let dest = dest_dir.join(&job.file_name);
    if let Err(e) = copy_file(&job.source, &dest) {
        return SortOutcome::Failed(e);
    }

    debug!(
        "{}: {} (copied to {})",
        job.source.display(),
        if is_green { "GREEN" } else { "NON_GREEN" },
        dest_dir.display()
    );
    if is_green {
        SortOutcome::Positive
    } else {
        SortOutcome::Negative
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| PrepError::io("resolve path", path, e))
}

/// Classify every image under `root` and copy it into `positive_dir` or
/// `negative_dir`. Sources are never modified, so the sort can be replayed.
///
/// Images already inside either destination are left out of the walk.
/// Only failures that prevent the run from starting are returned as `Err`;
/// per-file failures are collected in the report.
pub fn sort_tree(
    root: &Path,
    positive_dir: &Path,
    negative_dir: &Path,
    band: &ColorBand,
    threshold: f64,
) -> Result<StageReport> {
    let mut report = StageReport::new("sort");

    let positive_dir = canonicalize(&ensure_directory(positive_dir)?)?;
    let negative_dir = canonicalize(&ensure_directory(negative_dir)?)?;

    // Walk the canonical root so paths under the destinations can be recognized
    let root = canonicalize(root)?;
    let (files, inside_destinations): (Vec<PathBuf>, Vec<PathBuf>) = walk_images(&root)?
        .into_iter()
        .partition(|path| !path.starts_with(&positive_dir) && !path.starts_with(&negative_dir));
    if !inside_destinations.is_empty() {
        warn!(
            "Ignoring {} images already inside {} or {}",
            inside_destinations.len(),
            positive_dir.display(),
            negative_dir.display()
        );
    }
    info!("Found {} images in {}", files.len(), root.display());
    report.discovered = files.len();

    let jobs = assign_destination_names(&root, &files);

    let pb = create_progress_bar(jobs.len() as u64, "Sort");
    let outcomes: Vec<(PathBuf, SortOutcome)> = jobs
        .par_iter()
        .map(|job| {
            let outcome = sort_one(job, &positive_dir, &negative_dir, band, threshold);
            pb.inc(1);
            (job.source.clone(), outcome)
        })
        .collect();
    pb.finish_with_message("Sorting complete");

    for (source, outcome) in outcomes {
        match outcome {
            SortOutcome::Positive => {
                report.succeeded += 1;
                report.positive += 1;
            }
            SortOutcome::Negative => {
                report.succeeded += 1;
                report.negative += 1;
            }
            SortOutcome::Failed(e) => report.record_failure(&source, e),
        }
    }

    Ok(report)
}
