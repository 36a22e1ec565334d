//! Maps execution plans onto executors.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::merge::MergeExecutor;
use crate::strategy::Strategy;

use super::archive::ArchiveExecutor;
use super::config::ToolsConfig;
use super::document::DocumentExecutor;
use super::error::ConverterError;
use super::ffmpeg::FfmpegExecutor;
use super::pdf::PdfExecutor;
use super::raster::{ImageExecutor, RawImageExecutor};
use super::traits::{Executor, ExecutorFactory};
use super::types::{ExecutionContext, ExecutionPlan, ExecutionRequest};

/// Fails every job with a "not implemented" error.
pub struct UnsupportedExecutor;

#[async_trait]
impl Executor for UnsupportedExecutor {
    fn name(&self) -> &str {
        "unsupported"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        _ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        let name = |c: Option<crate::catalog::Category>| {
            c.map(|c| c.as_str()).unwrap_or("unknown")
        };
        Err(ConverterError::unsupported(format!(
            "{} to {}",
            name(request.input_category),
            name(request.output_category)
        )))
    }
}

/// Production factory backed by the external tools and in-process codecs.
pub struct ToolExecutorFactory {
    tools: Arc<ToolsConfig>,
}

impl ToolExecutorFactory {
    pub fn new(tools: ToolsConfig) -> Self {
        Self {
            tools: Arc::new(tools),
        }
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.tools
    }
}

impl ExecutorFactory for ToolExecutorFactory {
    fn create(&self, plan: ExecutionPlan) -> Arc<dyn Executor> {
        let tools = Arc::clone(&self.tools);
        match plan {
            ExecutionPlan::Merge(kind) => Arc::new(MergeExecutor::new(tools, kind)),
            ExecutionPlan::Convert(strategy) => match strategy {
                Strategy::PdfToDocx | Strategy::PdfToText => Arc::new(PdfExecutor::new(strategy)),
                Strategy::VideoToGif
                | Strategy::VideoToAudio
                | Strategy::VideoToImage
                | Strategy::MediaTranscode => Arc::new(FfmpegExecutor::new(tools, strategy)),
                Strategy::RawImageDecode => Arc::new(RawImageExecutor),
                Strategy::ImageTranscode => Arc::new(ImageExecutor),
                Strategy::DocumentConvert => Arc::new(DocumentExecutor::new(tools)),
                Strategy::ArchiveRepack => Arc::new(ArchiveExecutor::new(tools)),
                Strategy::Unsupported => Arc::new(UnsupportedExecutor),
            },
        }
    }
}
