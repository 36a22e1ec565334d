//! Types shared by executors and the scheduler.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::catalog::Category;
use crate::job::{JobId, JobSettings};
use crate::merge::MergeKind;
use crate::strategy::Strategy;

use super::error::ErrorKind;

/// What an execution runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPlan {
    Convert(Strategy),
    Merge(MergeKind),
}

impl ExecutionPlan {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Convert(strategy) => strategy.as_str(),
            Self::Merge(MergeKind::Pdf) => "merge_pdf",
            Self::Merge(MergeKind::Video) => "merge_video",
        }
    }
}

/// Everything an executor needs, copied when the job starts.
///
/// Later edits to the job record never reach a running executor.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub job_id: JobId,
    pub plan: ExecutionPlan,
    /// One input for conversions, N inputs in selection order for merges.
    pub inputs: Vec<PathBuf>,
    pub input_category: Option<Category>,
    /// Category of the target format; `None` for merges.
    pub output_category: Option<Category>,
    /// Final output file.
    pub output_path: PathBuf,
    /// Target format (lowercase extension without dot).
    pub target_format: String,
    pub settings: JobSettings,
}

impl ExecutionRequest {
    /// The first input.
    pub fn input(&self) -> &Path {
        self.inputs.first().map(PathBuf::as_path).unwrap_or(Path::new(""))
    }

    /// Directory the output is written into.
    pub fn output_dir(&self) -> &Path {
        self.output_path.parent().unwrap_or(Path::new("."))
    }

    /// Creates the output directory if needed.
    pub async fn prepare_output_dir(&self) -> std::io::Result<()> {
        let dir = self.output_dir();
        if dir.as_os_str().is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(dir).await
    }
}

/// Event emitted by a running execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    /// Percent complete, non-decreasing per execution.
    Progress(u8),
    /// Terminal: output written.
    Completed(PathBuf),
    /// Terminal: conversion failed.
    Failed { kind: ErrorKind, message: String },
    /// Terminal: stopped by the user.
    Cancelled,
}

impl ExecutorEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Sends monotonic progress events for one execution.
///
/// Values not above the last reported one are dropped, and values above
/// 100 are clamped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ExecutorEvent>,
    // -1 until the first report.
    last: Arc<AtomicI16>,
}

impl ProgressReporter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ExecutorEvent>) -> Self {
        Self {
            tx,
            last: Arc::new(AtomicI16::new(-1)),
        }
    }

    /// Reports `percent` if it advances past the last reported value.
    pub fn report(&self, percent: u8) {
        let percent = i16::from(percent.min(100));
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            let _ = self.tx.send(ExecutorEvent::Progress(percent as u8));
        }
    }

    /// Reports `done / total` as a percentage.
    pub fn report_fraction(&self, done: usize, total: usize) {
        if total > 0 {
            self.report(((done.min(total) * 100) / total) as u8);
        }
    }

    /// Highest value reported so far.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst).max(0) as u8
    }
}

/// Per-execution context handed to an executor.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job_id: JobId,
    pub progress: ProgressReporter,
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
