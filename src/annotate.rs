use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use log::{debug, info};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::color::{band_mask, ColorBand};
use crate::error::{PrepError, Result};
use crate::types::{annotation_path, is_image_file, BoundingBox, StageReport};
use crate::utils::{create_progress_bar, list_files, load_rgb_image};

/// Polygon area of a closed contour (shoelace formula).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let doubled: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    (doubled as f64 / 2.0).abs()
}

/// Axis-aligned rectangle enclosing every contour point.
pub fn bounding_rect(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (x_min, y_min, x_max, y_max) = points.iter().fold(
        (first.x, first.y, first.x, first.y),
        |(x_min, y_min, x_max, y_max), p| {
            (x_min.min(p.x), y_min.min(p.y), x_max.max(p.x), y_max.max(p.y))
        },
    );
    Some(BoundingBox::new(
        x_min.max(0) as u32,
        y_min.max(0) as u32,
        (x_max - x_min + 1) as u32,
        (y_max - y_min + 1) as u32,
    ))
}

/// Bounding box of the largest external region set in `mask`, if any.
///
/// Regions are compared by contour polygon area; on a tie the first one
/// found in raster order wins.
pub fn largest_region(mask: &image::GrayImage) -> Option<BoundingBox> {
    let contours: Vec<Contour<i32>> = find_contours(mask);

    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let area = contour_area(&contour.points);
        if best.map_or(true, |(_, best_area)| area > best_area) {
            best = Some((contour, area));
        }
    }

    best.and_then(|(contour, _)| bounding_rect(&contour.points))
}

/// Find the largest region of `band` in the image and write its bounding box
/// next to the image as `<stem>.txt`, replacing any previous record.
///
/// Returns `Ok(None)` when nothing in the image matches. In that case no
/// record is written and a stale record from an earlier run is removed.
pub fn annotate(image_path: &Path, band: &ColorBand) -> Result<Option<BoundingBox>> {
    let image = load_rgb_image(image_path)?;
    let mask = band_mask(&image, band);
    let record_path = annotation_path(image_path);

    let Some(bbox) = largest_region(&mask) else {
        info!("No green region found in {}", image_path.display());
        if record_path.exists() {
            fs::remove_file(&record_path)
                .map_err(|e| PrepError::io("remove stale annotation", &record_path, e))?;
            debug!("Removed stale annotation {}", record_path.display());
        }
        return Ok(None);
    };

    let file =
        File::create(&record_path).map_err(|e| PrepError::io("create annotation", &record_path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(bbox.to_record().as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| PrepError::io("write annotation", &record_path, e))?;

    debug!("Annotated {}: {}", image_path.display(), bbox);
    Ok(Some(bbox))
}

/// Annotate every image directly inside `folder`.
///
/// `succeeded` counts written records, `skipped` counts images with no
/// matching region.
pub fn annotate_folder(folder: &Path, band: &ColorBand) -> Result<StageReport> {
    let mut report = StageReport::new("annotate");

    let images: Vec<PathBuf> = list_files(folder)?
        .into_iter()
        .filter(|path| is_image_file(path))
        .collect();
    report.discovered = images.len();
    info!("Annotating {} images in {}", images.len(), folder.display());

    let pb = create_progress_bar(images.len() as u64, "Annotate");
    let outcomes: Vec<(PathBuf, Result<Option<BoundingBox>>)> = images
        .into_par_iter()
        .map(|path| {
            let outcome = annotate(&path, band);
            pb.inc(1);
            (path, outcome)
        })
        .collect();
    pb.finish_with_message("Annotation complete");

    for (path, outcome) in outcomes {
        match outcome {
            Ok(Some(_)) => report.succeeded += 1,
            Ok(None) => report.skipped += 1,
            Err(e) => report.record_failure(&path, e),
        }
    }

    Ok(report)
}
