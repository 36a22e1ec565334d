//! Mock executor for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::{
    ConverterError, ExecutionContext, ExecutionPlan, ExecutionRequest, Executor, ExecutorFactory,
    Tool,
};

/// Mock implementation of the Executor trait.
///
/// Provides controllable behavior for testing:
/// - Scripted progress values
/// - A run delay that honors (or ignores) cancellation
/// - Failure for every job or for specific inputs
/// - Recorded requests for assertions
///
/// Clones share their counters and recordings.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    progress: Vec<u8>,
    delay: Duration,
    honor_cancel: bool,
    failure: Option<String>,
    failing_inputs: Arc<HashSet<PathBuf>>,
    write_output: bool,
    runs: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<ExecutionRequest>>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// Create a mock that succeeds immediately without progress.
    pub fn new() -> Self {
        Self {
            progress: Vec::new(),
            delay: Duration::ZERO,
            honor_cancel: true,
            failure: None,
            failing_inputs: Arc::new(HashSet::new()),
            write_output: false,
            runs: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Progress values reported, in order, before the delay.
    pub fn with_progress(mut self, values: Vec<u8>) -> Self {
        self.progress = values;
        self
    }

    /// Simulated run time after progress is reported.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep running through the delay even after a cancel request.
    pub fn ignoring_cancel(mut self) -> Self {
        self.honor_cancel = false;
        self
    }

    /// Fail every run with a tool failure carrying `message`.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Fail only runs whose first input is `path`.
    pub fn failing_for_input(mut self, path: impl AsRef<Path>) -> Self {
        let mut inputs = (*self.failing_inputs).clone();
        inputs.insert(path.as_ref().to_path_buf());
        self.failing_inputs = Arc::new(inputs);
        self
    }

    /// Write an empty file at the output path on success.
    pub fn writing_output(mut self) -> Self {
        self.write_output = true;
        self
    }

    /// Number of times `execute` was entered.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<ExecutionRequest> {
        self.requests.read().await.clone()
    }

    /// Clear recorded requests.
    pub async fn clear_recorded(&self) {
        self.requests.write().await.clear();
    }

    fn failure_for(&self, request: &ExecutionRequest) -> Option<String> {
        if self.failing_inputs.contains(request.input()) {
            return Some(format!("mock failure for {}", request.input().display()));
        }
        self.failure.clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(request.clone());

        for value in &self.progress {
            ctx.progress.report(*value);
            tokio::task::yield_now().await;
        }

        if !self.delay.is_zero() {
            if self.honor_cancel {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = ctx.cancel.cancelled() => return Err(ConverterError::Cancelled),
                }
            } else {
                tokio::time::sleep(self.delay).await;
            }
        }

        if let Some(message) = self.failure_for(request) {
            return Err(ConverterError::tool_failed(Tool::Ffmpeg, message, None));
        }

        if self.write_output {
            request.prepare_output_dir().await?;
            tokio::fs::write(&request.output_path, b"").await?;
        }
        Ok(request.output_path.clone())
    }
}

/// Factory handing out clones of one [`MockExecutor`].
#[derive(Debug, Clone)]
pub struct MockExecutorFactory {
    executor: MockExecutor,
    plans: Arc<Mutex<Vec<ExecutionPlan>>>,
}

impl MockExecutorFactory {
    pub fn new(executor: MockExecutor) -> Self {
        Self {
            executor,
            plans: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The shared executor, for assertions.
    pub fn executor(&self) -> &MockExecutor {
        &self.executor
    }

    /// Plans requested so far, in order.
    pub fn created_plans(&self) -> Vec<ExecutionPlan> {
        self.plans.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ExecutorFactory for MockExecutorFactory {
    fn create(&self, plan: ExecutionPlan) -> Arc<dyn Executor> {
        if let Ok(mut plans) = self.plans.lock() {
            plans.push(plan);
        }
        Arc::new(self.executor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::Execution;
    use crate::converter::ExecutorEvent;
    use crate::job::{JobId, JobSettings};
    use crate::strategy::Strategy;

    fn request(input: &str) -> ExecutionRequest {
        ExecutionRequest {
            job_id: JobId::new(1),
            plan: ExecutionPlan::Convert(Strategy::MediaTranscode),
            inputs: vec![PathBuf::from(input)],
            input_category: None,
            output_category: None,
            output_path: PathBuf::from("/out/x.mkv"),
            target_format: "mkv".to_string(),
            settings: JobSettings::None,
        }
    }

    #[tokio::test]
    async fn test_failing_for_input_only() {
        let mock = MockExecutor::new().failing_for_input("/in/bad.mp4");

        let (_h, mut rx) = Execution::new(Arc::new(mock.clone()), request("/in/bad.mp4")).start();
        assert!(matches!(rx.recv().await, Some(ExecutorEvent::Failed { .. })));

        let (_h, mut rx) = Execution::new(Arc::new(mock.clone()), request("/in/ok.mp4")).start();
        assert!(matches!(rx.recv().await, Some(ExecutorEvent::Completed(_))));

        assert_eq!(mock.run_count(), 2);
        assert_eq!(mock.recorded_requests().await.len(), 2);
    }

    #[test]
    fn test_factory_records_plans() {
        let factory = MockExecutorFactory::new(MockExecutor::new());
        factory.create(ExecutionPlan::Convert(Strategy::VideoToGif));
        assert_eq!(
            factory.created_plans(),
            vec![ExecutionPlan::Convert(Strategy::VideoToGif)]
        );
    }
}
