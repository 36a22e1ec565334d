//! Archive repacking through 7-Zip.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::config::{Tool, ToolsConfig};
use super::error::ConverterError;
use super::process::{os, verify_output, ToolCommand};
use super::traits::Executor;
use super::types::{ExecutionContext, ExecutionRequest};

/// Extracts an archive into a staging directory, then compresses the
/// staging contents into the target format.
pub struct ArchiveExecutor {
    tools: Arc<ToolsConfig>,
}

impl ArchiveExecutor {
    pub fn new(tools: Arc<ToolsConfig>) -> Self {
        Self { tools }
    }

    pub(crate) fn extract_args(input: &Path, staging: &Path) -> Vec<OsString> {
        let mut target = OsString::from("-o");
        target.push(staging);
        vec![os("x"), os(input), target, os("-y")]
    }

    pub(crate) fn compress_args(format: &str, output: &Path) -> Vec<OsString> {
        vec![
            os("a"),
            os(format!("-t{}", format)),
            os(output),
            os("*"),
            os("-y"),
        ]
    }

    async fn repack(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
        staging: &Path,
        output: &Path,
    ) -> Result<(), ConverterError> {
        ctx.progress.report(0);
        ToolCommand::new(&self.tools, Tool::SevenZip)
            .args(Self::extract_args(request.input(), staging))
            .run(&ctx.cancel, |line| debug!(job_id = %ctx.job_id, "7z: {}", line))
            .await?;

        ctx.progress.report(50);
        ToolCommand::new(&self.tools, Tool::SevenZip)
            .args(Self::compress_args(&request.target_format, output))
            .current_dir(staging)
            .run(&ctx.cancel, |line| debug!(job_id = %ctx.job_id, "7z: {}", line))
            .await
    }
}

fn close_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!(path = %path.display(), error = %e, "Failed to remove staging directory");
    }
}

/// Absolute form of `path`; compression runs with the staging directory as
/// its working directory.
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[async_trait]
impl Executor for ArchiveExecutor {
    fn name(&self) -> &str {
        "7z"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        request.prepare_output_dir().await?;
        let output = absolute(&request.output_path)?;

        // 7-Zip updates an existing archive in place instead of replacing it.
        match tokio::fs::remove_file(&output).await {
            Ok(()) => debug!(path = %output.display(), "Removed existing archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let temp_dir = self.tools.ensure_temp_dir().await?;
        let staging = tempfile::Builder::new()
            .prefix("extract-")
            .tempdir_in(temp_dir)?;

        let result = self.repack(request, ctx, staging.path(), &output).await;
        close_staging(staging);
        result?;

        verify_output(&output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_extract_args() {
        let args = ArchiveExecutor::extract_args(Path::new("/in/a.zip"), Path::new("/tmp/x"));
        assert_eq!(strings(&args), vec!["x", "/in/a.zip", "-o/tmp/x", "-y"]);
    }

    #[test]
    fn test_compress_args() {
        let args = ArchiveExecutor::compress_args("7z", Path::new("/out/a.7z"));
        assert_eq!(strings(&args), vec!["a", "-t7z", "/out/a.7z", "*", "-y"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_staging_removed_after_failure() {
        use crate::converter::{Execution, ExecutionPlan, ExecutorEvent};
        use crate::job::{JobId, JobSettings};
        use crate::strategy::Strategy;

        let temp = tempfile::TempDir::new().unwrap();
        let staging_root = temp.path().join("staging");
        let tools = ToolsConfig {
            sevenzip_path: PathBuf::from("false"),
            ..Default::default()
        }
        .with_temp_dir(staging_root.clone());

        let request = ExecutionRequest {
            job_id: JobId::new(3),
            plan: ExecutionPlan::Convert(Strategy::ArchiveRepack),
            inputs: vec![temp.path().join("bundle.zip")],
            input_category: None,
            output_category: None,
            output_path: temp.path().join("out").join("bundle.7z"),
            target_format: "7z".to_string(),
            settings: JobSettings::None,
        };
        let executor = ArchiveExecutor::new(Arc::new(tools));
        let (_handle, mut rx) = Execution::new(Arc::new(executor), request).start();

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(matches!(last, Some(ExecutorEvent::Failed { .. })));
        let leftovers = std::fs::read_dir(&staging_root).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
