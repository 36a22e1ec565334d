//! Office document conversion through headless LibreOffice.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::config::{Tool, ToolsConfig};
use super::error::ConverterError;
use super::process::{os, ToolCommand};
use super::traits::Executor;
use super::types::{ExecutionContext, ExecutionRequest};

/// Converts documents, presentations and spreadsheets.
///
/// Exit code 0 is not trusted: the expected file must appear in the output
/// directory afterwards.
pub struct DocumentExecutor {
    tools: Arc<ToolsConfig>,
}

impl DocumentExecutor {
    pub fn new(tools: Arc<ToolsConfig>) -> Self {
        Self { tools }
    }

    pub(crate) fn command(&self, input: &Path, format: &str, out_dir: &Path) -> ToolCommand {
        ToolCommand::new(&self.tools, Tool::Soffice)
            // Paths are passed as raw OS strings; a UTF-8 locale makes the
            // engine decode them as UTF-8 whatever the host default is.
            .env("LC_ALL", "C.UTF-8")
            .env("LANG", "C.UTF-8")
            .args([
                os("--headless"),
                os("--convert-to"),
                os(format),
                os("--outdir"),
                os(out_dir),
                os(input),
            ])
    }
}

/// Finds `expected` in `dir`, comparing file names case-insensitively.
pub(crate) async fn find_output(dir: &Path, expected: &str) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_string_lossy().eq_ignore_ascii_case(expected)
            && entry.file_type().await?.is_file()
        {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

fn expected_name(input: &Path, format: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.{}", stem, format)
}

#[async_trait]
impl Executor for DocumentExecutor {
    fn name(&self) -> &str {
        "soffice"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        request.prepare_output_dir().await?;
        let out_dir = request.output_dir();
        let format = &request.target_format;

        self.command(request.input(), format, out_dir)
            .run(&ctx.cancel, |line| debug!(job_id = %ctx.job_id, "soffice: {}", line))
            .await?;

        let expected = expected_name(request.input(), format);
        match find_output(out_dir, &expected).await? {
            Some(path) => Ok(path),
            None => Err(ConverterError::OutputMissing {
                path: out_dir.join(expected),
            }),
        }
    }
}
