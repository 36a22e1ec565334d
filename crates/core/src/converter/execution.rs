//! Runs one executor as an independently cancellable task.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::job::JobId;

use super::error::ConverterError;
use super::traits::Executor;
use super::types::{ExecutionContext, ExecutionRequest, ExecutorEvent, ProgressReporter};

/// A prepared, not yet started execution.
pub struct Execution {
    executor: Arc<dyn Executor>,
    request: ExecutionRequest,
    cancel: CancellationToken,
}

/// Handle to a started execution.
#[derive(Debug)]
pub struct ExecutionHandle {
    job_id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Execution {
    pub fn new(executor: Arc<dyn Executor>, request: ExecutionRequest) -> Self {
        Self {
            executor,
            request,
            cancel: CancellationToken::new(),
        }
    }

    /// Requests cancellation before the execution starts.
    ///
    /// A started execution whose token is already cancelled emits only
    /// `Cancelled` and never runs the executor.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Spawns the execution and returns its handle and event stream.
    ///
    /// The stream carries zero or more `Progress` events followed by exactly
    /// one terminal event, then closes.
    pub fn start(self) -> (ExecutionHandle, mpsc::UnboundedReceiver<ExecutorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let job_id = self.request.job_id;
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            let terminal = if self.cancel.is_cancelled() {
                debug!(job_id = %job_id, "Cancelled before start");
                ExecutorEvent::Cancelled
            } else {
                let ctx = ExecutionContext {
                    job_id,
                    progress: ProgressReporter::new(tx.clone()),
                    cancel: self.cancel.clone(),
                };
                let result = self.executor.execute(&self.request, &ctx).await;
                terminal_event(job_id, self.executor.name(), result, &self.cancel)
            };
            let _ = tx.send(terminal);
        });

        (
            ExecutionHandle {
                job_id,
                cancel,
                task,
            },
            rx,
        )
    }
}

fn terminal_event(
    job_id: JobId,
    executor: &str,
    result: Result<std::path::PathBuf, ConverterError>,
    cancel: &CancellationToken,
) -> ExecutorEvent {
    // A requested cancel wins over whatever the executor returned.
    if cancel.is_cancelled() {
        info!(job_id = %job_id, executor, "Execution cancelled");
        return ExecutorEvent::Cancelled;
    }
    match result {
        Ok(path) => {
            info!(job_id = %job_id, executor, path = %path.display(), "Execution completed");
            ExecutorEvent::Completed(path)
        }
        Err(ConverterError::Cancelled) => ExecutorEvent::Cancelled,
        Err(e) => {
            warn!(job_id = %job_id, executor, error = %e, "Execution failed");
            ExecutorEvent::Failed {
                kind: e.kind(),
                message: e.job_message(),
            }
        }
    }
}

impl ExecutionHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Requests cancellation. Idempotent; a no-op after the terminal event.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(job_id = %self.job_id, "Cancel requested");
        }
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the task has finished (its terminal event has been sent).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ExecutionPlan;
    use crate::job::JobSettings;
    use crate::strategy::Strategy;
    use crate::testing::MockExecutor;
    use std::path::PathBuf;
    use std::time::Duration;

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            job_id: JobId::new(7),
            plan: ExecutionPlan::Convert(Strategy::ImageTranscode),
            inputs: vec![PathBuf::from("/in/a.png")],
            input_category: None,
            output_category: None,
            output_path: PathBuf::from("/out/a.jpg"),
            target_format: "jpg".to_string(),
            settings: JobSettings::None,
        }
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<ExecutorEvent>) -> Vec<ExecutorEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_completed_is_last_event() {
        let executor = MockExecutor::new().with_progress(vec![10, 40, 90]);
        let (_handle, rx) = Execution::new(Arc::new(executor), request()).start();
        let events = collect(rx).await;
        assert_eq!(
            events,
            vec![
                ExecutorEvent::Progress(10),
                ExecutorEvent::Progress(40),
                ExecutorEvent::Progress(90),
                ExecutorEvent::Completed(PathBuf::from("/out/a.jpg")),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let executor = MockExecutor::new();
        let execution = Execution::new(Arc::new(executor.clone()), request());
        execution.cancel();
        let (_handle, rx) = execution.start();
        assert_eq!(collect(rx).await, vec![ExecutorEvent::Cancelled]);
        assert_eq!(executor.run_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_running() {
        let executor = MockExecutor::new().with_delay(Duration::from_secs(30));
        let (handle, rx) = Execution::new(Arc::new(executor), request()).start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        handle.cancel();
        let events = collect(rx).await;
        assert_eq!(events.last(), Some(&ExecutorEvent::Cancelled));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_ignored_token() {
        // The executor ignores the token and finishes anyway.
        let executor = MockExecutor::new()
            .with_delay(Duration::from_millis(50))
            .ignoring_cancel();
        let (handle, rx) = Execution::new(Arc::new(executor), request()).start();
        handle.cancel();
        assert_eq!(collect(rx).await, vec![ExecutorEvent::Cancelled]);
    }

    #[tokio::test]
    async fn test_failure_becomes_failed_event() {
        let executor = MockExecutor::new().failing_with("codec exploded");
        let (handle, rx) = Execution::new(Arc::new(executor), request()).start();
        let events = collect(rx).await;
        match events.as_slice() {
            [ExecutorEvent::Failed { message, .. }] => assert!(message.contains("codec exploded")),
            other => panic!("unexpected events: {:?}", other),
        }
        assert!(!handle.is_cancel_requested());
    }
}
