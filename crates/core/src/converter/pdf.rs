//! PDF text extraction and PDF to DOCX conversion.

use async_trait::async_trait;
use docx_rs::{BreakType, Docx, Paragraph, Run};
use lopdf::Document;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::strategy::Strategy;

use super::error::ConverterError;
use super::process::{run_blocking, verify_output};
use super::traits::Executor;
use super::types::{ExecutionContext, ExecutionRequest, ProgressReporter};

/// Runs [`Strategy::PdfToText`] or [`Strategy::PdfToDocx`].
pub struct PdfExecutor {
    strategy: Strategy,
}

impl PdfExecutor {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }
}

/// Extracts the text of every page, in page order.
pub fn extract_pages(input: &Path, progress: &ProgressReporter) -> Result<Vec<String>, ConverterError> {
    let doc = Document::load(input)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let total = pages.len();
    debug!(path = %input.display(), pages = total, "Extracting PDF text");

    let mut texts = Vec::with_capacity(total);
    for (i, page) in pages.iter().enumerate() {
        texts.push(doc.extract_text(&[*page])?);
        progress.report_fraction(i + 1, total);
    }
    Ok(texts)
}

/// Writes the pages as one text file.
pub fn write_text(pages: &[String], output: &Path) -> Result<(), ConverterError> {
    std::fs::write(output, pages.concat())?;
    Ok(())
}

/// Writes the pages as a DOCX document, one paragraph per line and a page
/// break between pages.
pub fn write_docx(pages: &[String], output: &Path) -> Result<(), ConverterError> {
    let mut docx = Docx::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            docx = docx.add_paragraph(
                Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
            );
        }
        for line in page.lines() {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
        }
    }
    let file = File::create(output)?;
    docx.build()
        .pack(file)
        .map_err(|e| ConverterError::docx(e.to_string()))
}

#[async_trait]
impl Executor for PdfExecutor {
    fn name(&self) -> &str {
        self.strategy.as_str()
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        request.prepare_output_dir().await?;
        let input = request.input().to_path_buf();
        let output = request.output_path.clone();
        let progress = ctx.progress.clone();
        let strategy = self.strategy;

        run_blocking(move || {
            let pages = extract_pages(&input, &progress)?;
            match strategy {
                Strategy::PdfToText => write_text(&pages, &output),
                Strategy::PdfToDocx => write_docx(&pages, &output),
                other => Err(ConverterError::invalid_settings(format!(
                    "PDF executor cannot run strategy {}",
                    other
                ))),
            }
        })
        .await?;
        verify_output(&request.output_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_text_keeps_page_order() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        write_text(&["one\n".to_string(), "two\n".to_string()], &out).unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_write_docx_produces_zip() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.docx");
        write_docx(&["first page\nline two".to_string(), "second".to_string()], &out).unwrap();
        let bytes = std::fs::read(out).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_extract_missing_file_fails() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = extract_pages(Path::new("/nonexistent/convoy.pdf"), &ProgressReporter::new(tx))
            .unwrap_err();
        assert!(matches!(err, ConverterError::Pdf { .. } | ConverterError::Io(_)));
    }
}
