//! Testing utilities and mock implementations.
//!
//! This module provides scriptable executors so scheduler behavior can be
//! tested without the external tools installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use convoy_core::testing::{MockExecutor, MockExecutorFactory};
//!
//! let executor = MockExecutor::new()
//!     .with_progress(vec![10, 50, 90])
//!     .with_delay(Duration::from_millis(50));
//! let factory = MockExecutorFactory::new(executor.clone());
//!
//! // Build a scheduler with the factory, start jobs...
//! assert_eq!(executor.run_count(), 1);
//! ```

mod mock_executor;

pub use mock_executor::{MockExecutor, MockExecutorFactory};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Creates an empty file named `name` in `dir` and returns its path.
    pub fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(&path, b"");
        path
    }

    /// Writes a small RGBA PNG with a transparent left half.
    pub fn write_png(path: &Path, width: u32, height: u32) -> image::ImageResult<()> {
        let img = image::RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgba([255, 0, 0, 0])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        img.save_with_format(path, image::ImageFormat::Png)
    }

    /// Writes a PDF with `count` pages, each showing `label` and its page number.
    pub fn write_pdf(path: &Path, label: &str, count: usize) -> lopdf::Result<()> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for n in 0..count {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("{} {}", label, n + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path)?;
        Ok(())
    }
}
