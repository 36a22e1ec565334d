//! Error types for the converter module.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::config::Tool;

/// Coarse failure class a job ends with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No strategy exists for the category pair.
    UnsupportedConversion,
    /// External program not found at invocation time.
    ExternalToolMissing,
    /// Non-zero exit, malformed output or a codec/library failure.
    ExternalToolFailure,
    /// A bounded external call exceeded its budget.
    Timeout,
    /// Filesystem read/write/permission failure.
    IoFailure,
    /// Stopped by the user. Not a failure.
    CancelledByUser,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedConversion => "unsupported_conversion",
            Self::ExternalToolMissing => "external_tool_missing",
            Self::ExternalToolFailure => "external_tool_failure",
            Self::Timeout => "timeout",
            Self::IoFailure => "io_failure",
            Self::CancelledByUser => "cancelled_by_user",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while executing a conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// No conversion path exists.
    #[error("Conversion for '{category}' is not implemented")]
    UnsupportedConversion { category: String },

    /// External program could not be started.
    #[error("{tool} not found at path: {}", .path.display())]
    ToolMissing { tool: Tool, path: PathBuf },

    /// External program ran but did not succeed.
    #[error("{tool} failed: {reason}")]
    ToolFailed {
        tool: Tool,
        reason: String,
        stderr: Option<String>,
    },

    /// External program exceeded its time budget.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: Tool, timeout_secs: u64 },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job was cancelled.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Image decode/encode failed.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// Camera raw decode failed.
    #[error("Raw decode failed: {reason}")]
    RawDecode { reason: String },

    /// PDF parsing or writing failed.
    #[error("PDF error: {reason}")]
    Pdf { reason: String },

    /// DOCX writing failed.
    #[error("DOCX error: {reason}")]
    Docx { reason: String },

    /// The tool reported success but the expected output is absent.
    #[error("Expected output not found: {}", .path.display())]
    OutputMissing { path: PathBuf },

    /// The request carries settings the executor cannot use.
    #[error("Invalid settings: {reason}")]
    InvalidSettings { reason: String },
}

impl ConverterError {
    /// Creates a new tool failure with optional captured stderr.
    pub fn tool_failed(tool: Tool, reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ToolFailed {
            tool,
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new unsupported conversion error.
    pub fn unsupported(category: impl Into<String>) -> Self {
        Self::UnsupportedConversion {
            category: category.into(),
        }
    }

    pub fn pdf(reason: impl Into<String>) -> Self {
        Self::Pdf {
            reason: reason.into(),
        }
    }

    pub fn docx(reason: impl Into<String>) -> Self {
        Self::Docx {
            reason: reason.into(),
        }
    }

    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            reason: reason.into(),
        }
    }

    /// Maps this error onto the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedConversion { .. } | Self::InvalidSettings { .. } => {
                ErrorKind::UnsupportedConversion
            }
            Self::ToolMissing { .. } => ErrorKind::ExternalToolMissing,
            Self::ToolFailed { .. }
            | Self::Image(_)
            | Self::RawDecode { .. }
            | Self::Pdf { .. }
            | Self::Docx { .. }
            | Self::OutputMissing { .. } => ErrorKind::ExternalToolFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::IoFailure,
            Self::Cancelled => ErrorKind::CancelledByUser,
        }
    }

    /// Message shown for a failed job, including the stderr tail when present.
    pub fn job_message(&self) -> String {
        match self {
            Self::ToolFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}\n{}", self, stderr.trim_end()),
            _ => self.to_string(),
        }
    }
}

impl From<lopdf::Error> for ConverterError {
    fn from(e: lopdf::Error) -> Self {
        Self::pdf(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message() {
        let err = ConverterError::unsupported("archive");
        assert_eq!(err.to_string(), "Conversion for 'archive' is not implemented");
        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
    }

    #[test]
    fn test_kind_mapping() {
        let err = ConverterError::Timeout {
            tool: Tool::Soffice,
            timeout_secs: 60,
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("timed out"));

        let err = ConverterError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_eq!(ConverterError::Cancelled.kind(), ErrorKind::CancelledByUser);
        assert_eq!(
            ConverterError::OutputMissing {
                path: PathBuf::from("out.pdf")
            }
            .kind(),
            ErrorKind::ExternalToolFailure
        );
    }

    #[test]
    fn test_job_message_includes_stderr() {
        let err = ConverterError::tool_failed(
            Tool::Ffmpeg,
            "exited with code 1",
            Some("Invalid data found when processing input\n".to_string()),
        );
        assert_eq!(
            err.job_message(),
            "FFmpeg failed: exited with code 1\nInvalid data found when processing input"
        );
        let err = ConverterError::tool_failed(Tool::SevenZip, "exited with code 2", None);
        assert_eq!(err.job_message(), "7-Zip failed: exited with code 2");
    }
}
