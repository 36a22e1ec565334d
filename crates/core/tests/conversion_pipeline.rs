//! End-to-end conversions through the scheduler with the real executors.
//!
//! Only in-process strategies are exercised here (image codecs, PDF text
//! extraction and PDF merging), so no external tool has to be installed.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use convoy_core::{
    job::{ImageResize, ImageSettings},
    testing::fixtures,
    AppSettings, Category, JobSettings, JobStatus, MemorySettingsStore, Scheduler,
    SchedulerConfig, ToolExecutorFactory, ToolsConfig,
};

fn scheduler(out: &Path, temp: &Path) -> Scheduler {
    let tools = ToolsConfig::default().with_temp_dir(temp.to_path_buf());
    let settings = AppSettings::default().with_default_output_dir(out);
    Scheduler::new(
        Arc::new(ToolExecutorFactory::new(tools)),
        Arc::new(MemorySettingsStore::new(settings.clone())),
        settings,
        &SchedulerConfig::default(),
    )
}

struct Dirs {
    root: TempDir,
}

impl Dirs {
    fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(root.path().join("out")).unwrap();
        std::fs::create_dir_all(root.path().join("in")).unwrap();
        Self { root }
    }

    fn input(&self, name: &str) -> std::path::PathBuf {
        self.root.path().join("in").join(name)
    }

    fn out(&self) -> std::path::PathBuf {
        self.root.path().join("out")
    }

    fn scheduler(&self) -> Scheduler {
        scheduler(&self.out(), &self.root.path().join("tmp"))
    }
}

#[tokio::test]
async fn test_png_to_jpg_with_resize() {
    let dirs = Dirs::new();
    let source = dirs.input("logo.png");
    fixtures::write_png(&source, 40, 20).unwrap();
    let scheduler = dirs.scheduler();

    let id = scheduler.enqueue(&source).await.unwrap()[0];
    scheduler.set_target(id, Category::Image, "jpg").await.unwrap();
    scheduler
        .update_settings(
            id,
            JobSettings::Image(ImageSettings {
                quality: 80,
                resize: ImageResize::Percent(50),
            }),
        )
        .await
        .unwrap();

    scheduler.start(id, None).await.unwrap();
    let record = scheduler.wait(id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed, "{:?}", record.error);

    let output = dirs.out().join("logo.jpg");
    assert_eq!(record.output_path.as_deref(), Some(output.as_path()));
    let img = image::open(&output).unwrap();
    assert_eq!((img.width(), img.height()), (20, 10));
}

#[tokio::test]
async fn test_pdf_to_text() {
    let dirs = Dirs::new();
    let source = dirs.input("report.pdf");
    fixtures::write_pdf(&source, "page", 2).unwrap();
    let scheduler = dirs.scheduler();

    let id = scheduler.enqueue(&source).await.unwrap()[0];
    scheduler
        .set_target(id, Category::Document, "txt")
        .await
        .unwrap();
    scheduler.start(id, None).await.unwrap();
    let record = scheduler.wait(id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed, "{:?}", record.error);

    let text = std::fs::read_to_string(dirs.out().join("report.txt")).unwrap();
    let first = text.find("page 1").unwrap();
    let second = text.find("page 2").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_pdf_merge_job() {
    let dirs = Dirs::new();
    let a = dirs.input("a.pdf");
    let b = dirs.input("b.pdf");
    fixtures::write_pdf(&a, "first", 1).unwrap();
    fixtures::write_pdf(&b, "second", 2).unwrap();
    let scheduler = dirs.scheduler();

    let output = dirs.out().join("joined.pdf");
    let id = scheduler
        .merge_paths(vec![a, b], output.clone())
        .await
        .unwrap();
    scheduler.start_all(None).await.unwrap();
    let record = scheduler.wait(id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed, "{:?}", record.error);
    assert_eq!(record.progress, 100);

    let merged = lopdf::Document::load(&output).unwrap();
    assert_eq!(merged.get_pages().len(), 3);
    assert!(merged.extract_text(&[1]).unwrap().contains("first 1"));
    assert!(merged.extract_text(&[3]).unwrap().contains("second 2"));
}

#[tokio::test]
async fn test_unsupported_pair_fails_with_message() {
    let dirs = Dirs::new();
    let source = dirs.input("photo.png");
    fixtures::write_png(&source, 4, 4).unwrap();
    let scheduler = dirs.scheduler();

    let id = scheduler.enqueue(&source).await.unwrap()[0];
    scheduler
        .set_target(id, Category::Archive, "zip")
        .await
        .unwrap();
    scheduler.start(id, None).await.unwrap();
    let record = scheduler.wait(id).await.unwrap();

    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(
        record.error.as_deref(),
        Some("Conversion for 'image to archive' is not implemented")
    );
    assert!(!dirs.out().join("photo.zip").exists());
}

#[tokio::test]
async fn test_corrupt_image_fails_without_affecting_batch() {
    let dirs = Dirs::new();
    let good = dirs.input("good.png");
    let bad = dirs.input("bad.png");
    fixtures::write_png(&good, 8, 8).unwrap();
    std::fs::write(&bad, b"definitely not a png").unwrap();
    let scheduler = dirs.scheduler();

    let ids = scheduler.enqueue(dirs.root.path().join("in")).await.unwrap();
    assert_eq!(ids.len(), 2);
    for id in &ids {
        scheduler.set_target(*id, Category::Image, "webp").await.unwrap();
    }
    scheduler.start_all(None).await.unwrap();

    // Directory walk is name-ordered: bad.png first
    let bad_record = scheduler.wait(ids[0]).await.unwrap();
    let good_record = scheduler.wait(ids[1]).await.unwrap();
    assert_eq!(bad_record.status, JobStatus::Failed);
    assert!(bad_record.error.is_some());
    assert_eq!(good_record.status, JobStatus::Completed, "{:?}", good_record.error);
    assert!(dirs.out().join("good.webp").exists());
}
