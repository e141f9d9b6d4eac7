use image::{ImageReader, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result};
use crate::types::is_image_file;

/// Decode an image file into 8-bit RGB.
///
/// The format is sniffed from the file contents, so a mislabeled extension
/// still decodes.
pub fn load_rgb_image(path: &Path) -> Result<RgbImage> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| PrepError::decode(path, image::ImageError::IoError(e)))?;
    let img = reader.decode().map_err(|e| PrepError::decode(path, e))?;
    let rgb = img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(PrepError::EmptyImage {
            path: path.to_path_buf(),
        });
    }
    Ok(rgb)
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create a directory (and parents) if it does not exist yet.
///
/// Existing contents are left alone: stages are restartable.
pub fn ensure_directory(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path).map_err(|e| PrepError::io("create directory", path, e))?;
    Ok(path.to_path_buf())
}

/// Regular files directly inside `folder`, sorted by file name.
pub fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder).map_err(|e| PrepError::io("read directory", folder, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PrepError::io("read directory", folder, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Allow-listed image files anywhere below `root`, sorted by path.
pub fn walk_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PrepError::io(
            "read directory",
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .skip_hidden(false)
        .sort(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| is_image_file(path))
        .collect();
    images.sort();
    Ok(images)
}

/// True when both paths name the same file on disk.
///
/// Catches aliases that compare unequal as paths, such as `IMG.JPG` and
/// `IMG.jpg` on a case-insensitive filesystem, or hard links.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    let (Ok(meta_a), Ok(meta_b)) = (fs::metadata(a), fs::metadata(b)) else {
        return false;
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta_a.dev() == meta_b.dev() && meta_a.ino() == meta_b.ino()
    }

    #[cfg(not(unix))]
    {
        let _ = (meta_a, meta_b);
        matches!(
            (fs::canonicalize(a), fs::canonicalize(b)),
            (Ok(ca), Ok(cb)) if ca.to_string_lossy().eq_ignore_ascii_case(&cb.to_string_lossy())
        )
    }
}

/// Copy `from` to `to`, refusing when both name the same file
/// (`fs::copy` would truncate it).
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if is_same_file(from, to) {
        return Err(PrepError::SameFile {
            path: from.to_path_buf(),
        });
    }
    fs::copy(from, to).map_err(|e| PrepError::io("copy", from, e))?;
    Ok(())
}

/// Move a file, falling back to copy + delete when a rename is not possible
/// (for example across filesystems).
///
/// An existing file at `to` is replaced; that is logged.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        log::warn!("Replacing existing {} with {}", to.display(), from.display());
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| PrepError::io("move (copy)", from, e))?;
    fs::remove_file(from).map_err(|e| PrepError::io("move (remove source)", from, e))
}

/// Number of regular files directly inside `folder`.
pub fn count_files(folder: &Path) -> Result<usize> {
    list_files(folder).map(|files| files.len())
}
