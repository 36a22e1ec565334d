//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::error::ConverterError;
use super::types::{ExecutionContext, ExecutionPlan, ExecutionRequest};

/// One conversion strategy.
///
/// `execute` runs to a single outcome. Progress goes through
/// `ctx.progress`; cancellation is observed through `ctx.cancel`, and
/// executors owning an external process must kill it when the token fires.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Returns the name of this executor.
    fn name(&self) -> &str;

    /// Runs the conversion and returns the path of the written output.
    async fn execute(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError>;
}

/// Builds a fresh executor for every started job.
pub trait ExecutorFactory: Send + Sync {
    fn create(&self, plan: ExecutionPlan) -> Arc<dyn Executor>;
}
