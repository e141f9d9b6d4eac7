use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

use greenprep::color::classify_file;
use greenprep::config::DataLayout;
use greenprep::utils::{copy_file, is_same_file, move_file};
use greenprep::{
    annotate, annotate_folder, ensure_folders_exist, normalize, sort_tree, split_dataset,
    split_folder, write_summary, BoundingBox, ColorBand, NormalizeOptions, PrepError, SplitCounts,
    StageReport,
};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([200, 30, 30]);

/// Red canvas with one green rectangle `(x, y, w, h)`
fn canvas_with_rect(width: u32, height: u32, rect: Option<(u32, u32, u32, u32)>) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| match rect {
        Some((rx, ry, rw, rh)) if x >= rx && x < rx + rw && y >= ry && y < ry + rh => GREEN,
        _ => RED,
    })
}

fn save_png(path: &Path, image: &RgbImage) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    image.save(path).unwrap();
}

fn green_image() -> RgbImage {
    canvas_with_rect(64, 48, Some((0, 0, 32, 48)))
}

fn red_image() -> RgbImage {
    canvas_with_rect(64, 48, None)
}

fn file_names(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn files_with_ext(folder: &Path, ext: &str) -> Vec<String> {
    file_names(folder)
        .into_iter()
        .filter(|name| name.ends_with(&format!(".{}", ext)))
        .collect()
}

#[test]
fn test_classify_file_reports_decode_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let bogus = temp_dir.path().join("broken.jpg");
    fs::write(&bogus, b"definitely not a jpeg").unwrap();

    let err = classify_file(&bogus, &ColorBand::green(), 0.05).unwrap_err();
    assert!(matches!(err, PrepError::Decode { .. }));
}

#[test]
fn test_sort_tree_copies_into_class_folders() {
    let temp_dir = tempfile::tempdir().unwrap();
    let raw = temp_dir.path().join("raw");
    let green_dir = temp_dir.path().join("green");
    let non_green_dir = temp_dir.path().join("non_green");

    save_png(&raw.join("leaves/leaf1.png"), &green_image());
    save_png(&raw.join("leaves/leaf2.PNG"), &green_image());
    save_png(&raw.join("mixed/deep/leaf3.png"), &green_image());
    save_png(&raw.join("apples/apple1.png"), &red_image());
    save_png(&raw.join("apple2.png"), &red_image());
    fs::write(raw.join("notes.txt"), "not an image").unwrap();
    fs::write(raw.join("broken.jpg"), "not an image either").unwrap();

    let report = sort_tree(&raw, &green_dir, &non_green_dir, &ColorBand::green(), 0.05).unwrap();

    assert_eq!(report.discovered, 6);
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.positive, 3);
    assert_eq!(report.negative, 2);
    assert_eq!(report.failed(), 1);
    assert!(report.failures[0].path.ends_with("broken.jpg"));

    assert_eq!(file_names(&green_dir), vec!["leaf1.png", "leaf2.PNG", "leaf3.png"]);
    assert_eq!(file_names(&non_green_dir), vec!["apple1.png", "apple2.png"]);

    // Sorting copies: the sources stay in place
    assert!(raw.join("leaves/leaf1.png").exists());
    assert!(raw.join("apple2.png").exists());
}

#[test]
fn test_sort_tree_keeps_colliding_basenames() {
    let temp_dir = tempfile::tempdir().unwrap();
    let raw = temp_dir.path().join("raw");
    let green_dir = temp_dir.path().join("green");
    let non_green_dir = temp_dir.path().join("non_green");

    save_png(&raw.join("a/img.png"), &green_image());
    save_png(&raw.join("b/img.png"), &green_image());

    let report = sort_tree(&raw, &green_dir, &non_green_dir, &ColorBand::green(), 0.05).unwrap();

    assert_eq!(report.positive, 2);
    assert!(!report.has_failures());
    assert_eq!(file_names(&green_dir), vec!["b_img.png", "img.png"]);
}

#[test]
fn test_sort_tree_missing_root_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let result = sort_tree(
        &temp_dir.path().join("missing"),
        &temp_dir.path().join("green"),
        &temp_dir.path().join("non_green"),
        &ColorBand::green(),
        0.05,
    );
    assert!(matches!(result, Err(PrepError::Io { .. })));
}

#[test]
fn test_sort_tree_root_containing_destinations() {
    let temp_dir = tempfile::tempdir().unwrap();
    let data = temp_dir.path().join("data");
    let green_dir = data.join("green");
    let non_green_dir = data.join("non_green");

    // An image sorted by an earlier run sits inside the walked root
    save_png(&green_dir.join("leaf.png"), &green_image());
    let leaf_before = fs::read(green_dir.join("leaf.png")).unwrap();
    save_png(&data.join("raw_images/fern.png"), &green_image());
    save_png(&data.join("raw_images/brick.png"), &red_image());

    for _ in 0..2 {
        let report =
            sort_tree(&data, &green_dir, &non_green_dir, &ColorBand::green(), 0.05).unwrap();
        assert_eq!(report.discovered, 2);
        assert_eq!((report.positive, report.negative), (1, 1));
        assert!(!report.has_failures());
    }

    assert_eq!(fs::read(green_dir.join("leaf.png")).unwrap(), leaf_before);
    assert_eq!(file_names(&green_dir), vec!["fern.png", "leaf.png"]);
    assert_eq!(file_names(&non_green_dir), vec!["brick.png"]);
}

#[test]
fn test_copy_file_refuses_same_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("leaf.png");
    save_png(&path, &green_image());
    let before = fs::read(&path).unwrap();

    let err = copy_file(&path, &path).unwrap_err();
    assert!(matches!(err, PrepError::SameFile { .. }));

    // A different spelling of the same path is caught too
    let aliased = temp_dir.path().join(".").join("leaf.png");
    assert!(copy_file(&path, &aliased).is_err());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_is_same_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let a = temp_dir.path().join("a.jpg");
    let b = temp_dir.path().join("b.jpg");
    fs::write(&a, "a").unwrap();
    fs::write(&b, "b").unwrap();

    assert!(is_same_file(&a, &a));
    assert!(!is_same_file(&a, &b));
    assert!(!is_same_file(&a, &temp_dir.path().join("missing.jpg")));

    let linked = temp_dir.path().join("linked.jpg");
    fs::hard_link(&a, &linked).unwrap();
    assert!(is_same_file(&a, &linked));
}

#[test]
fn test_annotate_exact_rectangle() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image_path = temp_dir.path().join("sample.png");
    save_png(&image_path, &canvas_with_rect(320, 240, Some((50, 60, 40, 30))));

    let bbox = annotate(&image_path, &ColorBand::green()).unwrap();

    assert_eq!(bbox, Some(BoundingBox::new(50, 60, 40, 30)));
    let record = fs::read_to_string(temp_dir.path().join("sample.txt")).unwrap();
    assert_eq!(record, "50 60 40 30\n");
}

#[test]
fn test_annotate_overwrites_previous_record() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image_path = temp_dir.path().join("sample.png");
    save_png(&image_path, &canvas_with_rect(100, 100, Some((10, 20, 5, 6))));
    fs::write(temp_dir.path().join("sample.txt"), "1 2 3 4\n").unwrap();

    annotate(&image_path, &ColorBand::green()).unwrap();

    let record = fs::read_to_string(temp_dir.path().join("sample.txt")).unwrap();
    assert_eq!(record, "10 20 5 6\n");
}

#[test]
fn test_annotate_without_match_writes_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image_path = temp_dir.path().join("plain.png");
    save_png(&image_path, &canvas_with_rect(320, 240, None));

    assert_eq!(annotate(&image_path, &ColorBand::green()).unwrap(), None);
    assert!(!temp_dir.path().join("plain.txt").exists());
}

#[test]
fn test_annotate_without_match_removes_stale_record() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image_path = temp_dir.path().join("plain.png");
    save_png(&image_path, &canvas_with_rect(32, 32, None));
    fs::write(temp_dir.path().join("plain.txt"), "1 2 3 4\n").unwrap();

    assert_eq!(annotate(&image_path, &ColorBand::green()).unwrap(), None);
    assert!(!temp_dir.path().join("plain.txt").exists());
}

#[test]
fn test_annotate_folder_counts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path();
    save_png(&folder.join("a.png"), &canvas_with_rect(64, 64, Some((4, 4, 8, 8))));
    save_png(&folder.join("b.png"), &canvas_with_rect(64, 64, Some((30, 30, 10, 10))));
    save_png(&folder.join("c.png"), &canvas_with_rect(64, 64, None));
    fs::write(folder.join("d.jpg"), "garbage").unwrap();

    let report = annotate_folder(folder, &ColorBand::green()).unwrap();

    assert_eq!(report.discovered, 4);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(files_with_ext(folder, "txt"), vec!["a.txt", "b.txt"]);
}

#[test]
fn test_normalize_resizes_and_replaces_extension() {
    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path();
    save_png(&folder.join("wide.png"), &canvas_with_rect(100, 50, Some((0, 0, 50, 50))));
    save_png(&folder.join("tall.bmp"), &canvas_with_rect(30, 90, None));
    fs::write(folder.join("wide.txt"), "0 0 1 1\n").unwrap();

    let options = NormalizeOptions::new((320, 240), 95);
    let report = normalize(folder, &options).unwrap();

    assert_eq!(report.discovered, 2);
    assert_eq!(report.succeeded, 2);
    assert!(!report.has_failures());
    assert_eq!(file_names(folder), vec!["tall.jpg", "wide.jpg", "wide.txt"]);

    for name in ["tall.jpg", "wide.jpg"] {
        let path = folder.join(name);
        assert_eq!(image::image_dimensions(&path).unwrap(), (320, 240));
        assert_eq!(
            image::ImageFormat::from_path(&path).unwrap(),
            image::ImageFormat::Jpeg
        );
        assert!(image::open(&path).is_ok());
    }
}

#[test]
fn test_normalize_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path();
    save_png(&folder.join("a.png"), &green_image());
    save_png(&folder.join("b.png"), &red_image());

    let options = NormalizeOptions::new((320, 240), 95);
    normalize(folder, &options).unwrap();
    let before: Vec<Vec<u8>> = ["a.jpg", "b.jpg"]
        .iter()
        .map(|name| fs::read(folder.join(name)).unwrap())
        .collect();

    let second = normalize(folder, &options).unwrap();

    assert_eq!(second.discovered, 2);
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(file_names(folder), vec!["a.jpg", "b.jpg"]);
    let after: Vec<Vec<u8>> = ["a.jpg", "b.jpg"]
        .iter()
        .map(|name| fs::read(folder.join(name)).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_normalize_skips_undecodable_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path();
    save_png(&folder.join("ok.png"), &green_image());
    fs::write(folder.join("broken.png"), "nope").unwrap();

    let report = normalize(folder, &NormalizeOptions::new((32, 24), 95)).unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed(), 1);
    assert!(folder.join("ok.jpg").exists());
    // The undecodable original is left for inspection
    assert!(folder.join("broken.png").exists());
}

#[test]
fn test_normalize_uppercase_extension() {
    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path();
    let upper = folder.join("IMG.JPG");
    green_image().save_with_format(&upper, image::ImageFormat::Jpeg).unwrap();

    let report = normalize(folder, &NormalizeOptions::new((320, 240), 95)).unwrap();

    assert_eq!(report.succeeded, 1);
    assert!(!report.has_failures());
    assert_eq!(file_names(folder), vec!["IMG.jpg"]);
    assert_eq!(image::image_dimensions(folder.join("IMG.jpg")).unwrap(), (320, 240));
}

#[cfg(unix)]
#[test]
fn test_normalize_records_failed_original_removal() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path().join("green");
    fs::create_dir_all(&folder).unwrap();
    // The target already exists, so writing it needs no folder permission
    RgbImage::new(320, 240).save(folder.join("a.jpg")).unwrap();
    save_png(&folder.join("a.png"), &green_image());

    fs::set_permissions(&folder, fs::Permissions::from_mode(0o555)).unwrap();
    if fs::write(folder.join("writable"), "").is_ok() {
        // Permissions are not enforced for this user (e.g. root)
        fs::remove_file(folder.join("writable")).unwrap();
        fs::set_permissions(&folder, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let report = normalize(&folder, &NormalizeOptions::new((320, 240), 95));
    fs::set_permissions(&folder, fs::Permissions::from_mode(0o755)).unwrap();
    let report = report.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed(), 1);
    assert!(report.failures[0].path.ends_with("a.png"));
    assert!(report.failures[0].message.contains("remove original"));
    assert!(folder.join("a.png").exists());
}

fn populate_split_source(folder: &Path, count: usize, annotated_every: usize) {
    fs::create_dir_all(folder).unwrap();
    for i in 0..count {
        fs::write(folder.join(format!("img{:02}.jpg", i)), format!("image {}", i)).unwrap();
        if i % annotated_every == 0 {
            fs::write(folder.join(format!("img{:02}.txt", i)), format!("{} 0 1 1\n", i)).unwrap();
        }
    }
}

#[test]
fn test_split_folder_ratio_and_pairs() {
    let temp_dir = tempfile::tempdir().unwrap();
    let src = temp_dir.path().join("green");
    let train = temp_dir.path().join("train/green");
    let val = temp_dir.path().join("val/green");
    populate_split_source(&src, 10, 2);

    let mut report = StageReport::new("split");
    let counts = split_folder(&src, &train, &val, 0.2, 42, &mut report).unwrap();

    assert_eq!(counts, SplitCounts { train: 8, val: 2 });
    assert!(!report.has_failures());
    assert!(files_with_ext(&src, "jpg").is_empty());
    assert!(files_with_ext(&src, "txt").is_empty());

    let train_images = files_with_ext(&train, "jpg");
    let val_images = files_with_ext(&val, "jpg");
    assert_eq!(train_images.len(), 8);
    assert_eq!(val_images.len(), 2);
    assert!(train_images.iter().all(|name| !val_images.contains(name)));

    // Every record travels with its image
    for (folder, images) in [(&train, &train_images), (&val, &val_images)] {
        for txt in files_with_ext(folder, "txt") {
            let stem = txt.trim_end_matches(".txt");
            assert!(images.contains(&format!("{}.jpg", stem)));
        }
    }
    let total_records = files_with_ext(&train, "txt").len() + files_with_ext(&val, "txt").len();
    assert_eq!(total_records, 5);

    // Moving again over the emptied folder is a no-op
    let mut report = StageReport::new("split");
    let counts = split_folder(&src, &train, &val, 0.2, 42, &mut report).unwrap();
    assert_eq!(counts, SplitCounts { train: 0, val: 0 });
    assert_eq!(files_with_ext(&train, "jpg").len(), 8);
    assert_eq!(files_with_ext(&val, "jpg").len(), 2);
}

#[test]
fn test_split_folder_is_reproducible() {
    let run = || -> Vec<String> {
        let temp_dir = tempfile::tempdir().unwrap();
        let src = temp_dir.path().join("src");
        let val = temp_dir.path().join("val");
        populate_split_source(&src, 20, 3);
        let mut report = StageReport::new("split");
        split_folder(&src, &temp_dir.path().join("train"), &val, 0.2, 42, &mut report).unwrap();
        files_with_ext(&val, "jpg")
    };

    let first = run();
    assert_eq!(first.len(), 4);
    assert_eq!(first, run());
}

#[test]
fn test_split_folder_ignores_other_formats() {
    let temp_dir = tempfile::tempdir().unwrap();
    let src = temp_dir.path().join("src");
    populate_split_source(&src, 5, 10);
    fs::write(src.join("left_behind.png"), "png").unwrap();

    let mut report = StageReport::new("split");
    let counts = split_folder(
        &src,
        &temp_dir.path().join("train"),
        &temp_dir.path().join("val"),
        0.2,
        42,
        &mut report,
    )
    .unwrap();

    assert_eq!(counts.train + counts.val, 5);
    assert_eq!(report.discovered, 5);
    assert_eq!(file_names(&src), vec!["left_behind.png"]);
}

#[test]
fn test_split_folder_reports_stranded_annotation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let src = temp_dir.path().join("green");
    let train = temp_dir.path().join("train/green");
    let val = temp_dir.path().join("val/green");
    populate_split_source(&src, 3, 1);
    // A directory where the record should land makes its move fail
    fs::create_dir_all(train.join("img01.txt")).unwrap();

    let mut report = StageReport::new("split");
    let counts = split_folder(&src, &train, &val, 0.0, 42, &mut report).unwrap();

    assert_eq!(counts, SplitCounts { train: 3, val: 0 });
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed(), 1);
    assert!(report.failures[0].path.ends_with("img01.txt"));
    assert!(report.failures[0].message.contains("inconsistent split"));
    assert!(train.join("img01.jpg").exists());
    assert_eq!(file_names(&src), vec!["img01.txt"]);
}

#[test]
fn test_split_folder_creates_outputs_before_moving() {
    let temp_dir = tempfile::tempdir().unwrap();
    let src = temp_dir.path().join("green");
    let train = temp_dir.path().join("train/green");
    populate_split_source(&src, 4, 1);
    // The validation folder cannot be created
    fs::write(temp_dir.path().join("val"), "in the way").unwrap();

    let mut report = StageReport::new("split");
    let result = split_folder(
        &src,
        &train,
        &temp_dir.path().join("val/green"),
        0.5,
        42,
        &mut report,
    );

    assert!(matches!(result, Err(PrepError::Io { .. })));
    // Nothing moved
    assert_eq!(files_with_ext(&src, "jpg").len(), 4);
    assert_eq!(files_with_ext(&src, "txt").len(), 4);
    assert!(!train.exists() || file_names(&train).is_empty());
}

#[test]
fn test_move_file_replaces_existing_destination() {
    let temp_dir = tempfile::tempdir().unwrap();
    let from = temp_dir.path().join("img.jpg");
    let to = temp_dir.path().join("out/img.jpg");
    fs::write(&from, "new").unwrap();
    fs::create_dir_all(to.parent().unwrap()).unwrap();
    fs::write(&to, "old").unwrap();

    move_file(&from, &to).unwrap();

    assert!(!from.exists());
    assert_eq!(fs::read_to_string(&to).unwrap(), "new");
}

#[test]
fn test_split_dataset_layout() {
    let temp_dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(temp_dir.path().join("data"));
    populate_split_source(&layout.green, 10, 1);
    populate_split_source(&layout.non_green, 5, 100);

    let report = split_dataset(&layout, 0.2, 42).unwrap();

    assert_eq!(report.discovered, 15);
    assert_eq!(report.succeeded, 15);
    assert_eq!(report.positive, 10);
    assert_eq!(report.negative, 5);
    assert_eq!(files_with_ext(&layout.train_green, "jpg").len(), 8);
    assert_eq!(files_with_ext(&layout.val_green, "jpg").len(), 2);
    assert_eq!(files_with_ext(&layout.train_green, "txt").len(), 8);
    assert_eq!(files_with_ext(&layout.train_non_green, "jpg").len(), 4);
    assert_eq!(files_with_ext(&layout.val_non_green, "jpg").len(), 1);
}

#[test]
fn test_ensure_folders_exist_and_summary() {
    let temp_dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(temp_dir.path().join("data"));

    let created = ensure_folders_exist(&layout).unwrap();
    assert_eq!(created.len(), 7);
    assert!(created.iter().all(|folder| folder.is_dir()));
    // Safe to run twice
    ensure_folders_exist(&layout).unwrap();

    let mut report = StageReport::new("sort");
    report.discovered = 3;
    report.succeeded = 2;
    report.record_failure(Path::new("raw/bad.jpg"), "failed to decode");

    let summary_path = temp_dir.path().join("summary.json");
    write_summary(&summary_path, &[report]).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(json[0]["stage"], "sort");
    assert_eq!(json[0]["discovered"], 3);
    assert_eq!(json[0]["failures"][0]["message"], "failed to decode");
}

#[test]
fn test_full_pipeline() {
    let temp_dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(temp_dir.path().join("data"));
    ensure_folders_exist(&layout).unwrap();
    let band = ColorBand::green();

    for i in 0..6 {
        save_png(
            &layout.raw_images.join(format!("plants/p{}.png", i)),
            &canvas_with_rect(400, 300, Some((100, 80, 160, 120))),
        );
    }
    for i in 0..4 {
        save_png(
            &layout.raw_images.join(format!("fruit/f{}.png", i)),
            &canvas_with_rect(400, 300, None),
        );
    }

    let sorted = sort_tree(&layout.raw_images, &layout.green, &layout.non_green, &band, 0.05).unwrap();
    assert_eq!((sorted.positive, sorted.negative), (6, 4));

    let options = NormalizeOptions::new((320, 240), 95);
    for folder in layout.sorted_folders() {
        let report = normalize(folder, &options).unwrap();
        assert!(!report.has_failures());
    }
    assert_eq!(files_with_ext(&layout.green, "jpg").len(), 6);
    assert!(files_with_ext(&layout.green, "png").is_empty());

    let annotated = annotate_folder(&layout.green, &band).unwrap();
    assert_eq!(annotated.succeeded, 6);

    let split = split_dataset(&layout, 0.2, 42).unwrap();
    assert!(!split.has_failures());
    assert_eq!(files_with_ext(&layout.train_green, "jpg").len(), 5);
    assert_eq!(files_with_ext(&layout.val_green, "jpg").len(), 1);
    assert_eq!(files_with_ext(&layout.train_green, "txt").len(), 5);
    assert_eq!(files_with_ext(&layout.val_green, "txt").len(), 1);
    assert_eq!(files_with_ext(&layout.train_non_green, "jpg").len(), 4);
    assert!(files_with_ext(&layout.val_non_green, "jpg").is_empty());

    let leftovers: Vec<PathBuf> = fs::read_dir(&layout.green)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(leftovers.is_empty());
}
