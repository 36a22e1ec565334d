//! Types for the job scheduler.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::watch;

use crate::catalog::Category;
use crate::job::{JobId, JobRecord, JobStatus, ValidationError};
use crate::merge::MergeError;
use crate::settings::SettingsError;

/// Errors that can occur during scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Invalid job state for operation.
    #[error("job {id} is {status}; cannot {action}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    /// The job has no usable conversion.
    #[error("job {id} is not convertible: {reason}")]
    NotConvertible { id: JobId, reason: String },

    /// No output directory could be resolved.
    #[error("no output directory: set a default output directory or save next to the source")]
    NoOutputDirectory,

    /// Source path does not exist.
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Filesystem error while scanning sources.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings rejected at the edit boundary.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Preset not found.
    #[error("preset '{name}' not found for {category}")]
    PresetNotFound { category: Category, name: String },

    /// Merge preconditions failed.
    #[error("merge rejected: {0}")]
    Merge(#[from] MergeError),

    /// Settings persistence error.
    #[error("settings store error: {0}")]
    Settings(#[from] SettingsError),
}

impl From<ValidationError> for SchedulerError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidSettings(e.to_string())
    }
}

/// Where converted files are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLocation {
    /// The source file's directory.
    NextToSource,
    /// One shared directory.
    Directory(PathBuf),
}

impl OutputLocation {
    /// Output path for `source` converted to `format`: `<dir>/<stem>.<format>`.
    pub fn output_path(&self, source: &Path, format: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let file_name = format!("{}.{}", stem, format);
        match self {
            Self::NextToSource => source
                .parent()
                .map(|p| p.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
            Self::Directory(dir) => dir.join(file_name),
        }
    }
}

/// What changed about a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobChange {
    Added,
    /// Target or settings edited, or the job was reset.
    Edited,
    Started,
    Progress { percent: u8 },
    Finished { status: JobStatus },
    Removed,
}

/// Broadcast notification of a job change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobUpdate {
    pub id: JobId,
    pub change: JobChange,
}

/// Counts of jobs per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl SchedulerStatus {
    pub(crate) fn count(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::InProgress => self.in_progress += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}

/// Follows one job's record.
#[derive(Debug, Clone)]
pub struct JobWatcher {
    id: JobId,
    rx: watch::Receiver<JobRecord>,
}

impl JobWatcher {
    pub(crate) fn new(id: JobId, rx: watch::Receiver<JobRecord>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Latest known record.
    pub fn current(&self) -> JobRecord {
        self.rx.borrow().clone()
    }

    /// Waits until the job is terminal and returns its record.
    ///
    /// If the job is removed first, returns the last record seen.
    pub async fn finished(mut self) -> JobRecord {
        let finished = self
            .rx
            .wait_for(|r| r.status.is_terminal())
            .await
            .map(|record| record.clone());
        finished.unwrap_or_else(|_| self.rx.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        let source = Path::new("/photos/trip/IMG_001.CR2");
        assert_eq!(
            OutputLocation::NextToSource.output_path(source, "jpg"),
            PathBuf::from("/photos/trip/IMG_001.jpg")
        );
        assert_eq!(
            OutputLocation::Directory(PathBuf::from("/out")).output_path(source, "png"),
            PathBuf::from("/out/IMG_001.png")
        );
    }

    #[test]
    fn test_status_counts() {
        let mut status = SchedulerStatus::default();
        for s in [JobStatus::Pending, JobStatus::Failed, JobStatus::Pending] {
            status.count(s);
        }
        assert_eq!(status.total, 3);
        assert_eq!(status.pending, 2);
        assert_eq!(status.failed, 1);
    }

    #[test]
    fn test_error_messages() {
        let err = SchedulerError::InvalidState {
            id: JobId::new(4),
            status: JobStatus::InProgress,
            action: "edit settings",
        };
        assert_eq!(err.to_string(), "job 4 is in_progress; cannot edit settings");
    }
}
