use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::converter::ffmpeg::{probe_duration, remove_temp, run_transcoder};
use crate::converter::process::{run_blocking, verify_output};
use crate::converter::{ConverterError, ExecutionContext, ExecutionRequest, Executor, ToolsConfig};

use super::pdf::merge_pdfs;
use super::video::{concat_args, write_manifest};
use super::MergeKind;

/// Runs a PDF or video merge for one job.
pub struct MergeExecutor {
    tools: Arc<ToolsConfig>,
    kind: MergeKind,
}

impl MergeExecutor {
    pub fn new(tools: Arc<ToolsConfig>, kind: MergeKind) -> Self {
        Self { tools, kind }
    }

    async fn merge_videos(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<(), ConverterError> {
        let mut total = Some(0.0);
        for input in &request.inputs {
            total = match (total, probe_duration(&self.tools, input).await) {
                (Some(sum), Some(d)) => Some(sum + d),
                _ => None,
            };
        }

        let temp_dir = self.tools.ensure_temp_dir().await?;
        let manifest = write_manifest(temp_dir, &request.inputs)?;
        let args = concat_args(&self.tools, &manifest, &request.output_path);
        let result = run_transcoder(&self.tools, args, total, ctx, |p| p).await;
        remove_temp(manifest);
        result
    }
}

#[async_trait]
impl Executor for MergeExecutor {
    fn name(&self) -> &str {
        match self.kind {
            MergeKind::Pdf => "merge_pdf",
            MergeKind::Video => "merge_video",
        }
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        request.prepare_output_dir().await?;
        match self.kind {
            MergeKind::Pdf => {
                let inputs = request.inputs.clone();
                let output = request.output_path.clone();
                let progress = ctx.progress.clone();
                let pages = run_blocking(move || merge_pdfs(&inputs, &output, &progress)).await?;
                info!(job_id = %ctx.job_id, pages, "Merged PDF written");
            }
            MergeKind::Video => self.merge_videos(request, ctx).await?,
        }
        verify_output(&request.output_path).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::converter::{Execution, ExecutionPlan, ExecutorEvent};
    use crate::job::{JobId, JobSettings};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_manifest_removed_after_failed_concat() {
        let dir = TempDir::new().unwrap();
        let temp_root = dir.path().join("tmp");
        let tools = ToolsConfig {
            ffmpeg_path: PathBuf::from("false"),
            ffprobe_path: PathBuf::from("false"),
            ..Default::default()
        }
        .with_temp_dir(temp_root.clone());

        let request = ExecutionRequest {
            job_id: JobId::new(9),
            plan: ExecutionPlan::Merge(MergeKind::Video),
            inputs: vec![dir.path().join("a.mp4"), dir.path().join("b.mp4")],
            input_category: None,
            output_category: None,
            output_path: dir.path().join("joined.mp4"),
            target_format: "mp4".to_string(),
            settings: JobSettings::None,
        };
        let executor = MergeExecutor::new(Arc::new(tools), MergeKind::Video);
        let (_handle, mut rx) = Execution::new(Arc::new(executor), request).start();

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(matches!(last, Some(ExecutorEvent::Failed { .. })));
        assert_eq!(std::fs::read_dir(&temp_root).unwrap().count(), 0);
    }
}
