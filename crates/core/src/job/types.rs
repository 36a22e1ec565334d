//! Job record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::catalog::Category;
use crate::merge::MergeKind;

use super::settings::JobSettings;

/// Opaque, monotonically issued job identifier.
///
/// Ids are never reused and are independent of any display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(Self)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, not started.
    Pending,
    /// An executor is running for this job.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped by the user.
    Cancelled,
}

impl JobStatus {
    /// Whether this status ends a job's active execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested output of a conversion job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionTarget {
    /// Output category.
    pub category: Category,
    /// Output format (lowercase extension without dot).
    pub format: String,
}

impl ConversionTarget {
    pub fn new(category: Category, format: impl Into<String>) -> Self {
        Self {
            category,
            format: crate::catalog::normalize_extension(&format.into()),
        }
    }
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Single-input conversion.
    Convert,
    /// Multi-input merge into a fixed output.
    Merge(MergeKind),
}

/// One queued item tracked by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    /// One path for conversions, N paths (in selection order) for merges.
    pub source_paths: Vec<PathBuf>,
    /// Category of the input, `None` if the extension is unknown.
    pub input_category: Option<Category>,
    /// Requested output; `None` means not convertible.
    pub target: Option<ConversionTarget>,
    pub settings: JobSettings,
    pub status: JobStatus,
    /// 0-100, non-decreasing while in progress.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Creates a pending conversion record for a single source.
    pub fn conversion(id: JobId, source: PathBuf) -> Self {
        let ext = crate::catalog::extension_of(&source).unwrap_or_default();
        let input_category = crate::catalog::category_of(&ext);
        let target = crate::catalog::default_target(&ext)
            .map(|(category, format)| ConversionTarget::new(category, format));

        Self {
            id,
            kind: JobKind::Convert,
            source_paths: vec![source],
            input_category,
            target,
            settings: JobSettings::for_category(input_category),
            status: JobStatus::Pending,
            progress: 0,
            output_path: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Creates a pending merge record writing to `output`.
    pub fn merge(id: JobId, kind: MergeKind, sources: Vec<PathBuf>, output: PathBuf) -> Self {
        let format = crate::catalog::extension_of(&output).unwrap_or_default();
        Self {
            id,
            kind: JobKind::Merge(kind),
            source_paths: sources,
            input_category: Some(kind.category()),
            target: Some(ConversionTarget::new(kind.category(), format)),
            settings: JobSettings::None,
            status: JobStatus::Pending,
            progress: 0,
            output_path: Some(output),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// The first (for conversions, only) source path.
    pub fn primary_source(&self) -> Option<&Path> {
        self.source_paths.first().map(PathBuf::as_path)
    }

    /// Normalized extension of the primary source.
    pub fn input_extension(&self) -> Option<String> {
        self.primary_source().and_then(crate::catalog::extension_of)
    }

    /// Short label for logs and listings.
    pub fn label(&self) -> String {
        match self.kind {
            JobKind::Merge(kind) => format!("merge of {} {} files", self.source_paths.len(), kind),
            JobKind::Convert => self
                .primary_source()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }
}
