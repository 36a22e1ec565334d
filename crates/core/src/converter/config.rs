//! Configuration for external conversion tools.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// External programs the executors drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    Soffice,
    SevenZip,
}

impl Tool {
    /// Label used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
            Self::Soffice => "soffice",
            Self::SevenZip => "7z",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ffmpeg => "FFmpeg",
            Self::Ffprobe => "FFprobe",
            Self::Soffice => "LibreOffice",
            Self::SevenZip => "7-Zip",
        })
    }
}

/// Paths and time budgets for external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Path to the LibreOffice binary.
    #[serde(default = "default_soffice_path")]
    pub soffice_path: PathBuf,

    /// Path to the 7-Zip binary.
    #[serde(default = "default_sevenzip_path")]
    pub sevenzip_path: PathBuf,

    /// Directory for intermediate files (palettes, manifests, staging).
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Timeout for a single transcoder run in seconds. 0 means unbounded.
    #[serde(default = "default_transcode_timeout")]
    pub transcode_timeout_secs: u64,

    /// Timeout for a single document conversion in seconds.
    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,

    /// Timeout for each archive extract/compress step in seconds. 0 means
    /// unbounded.
    #[serde(default = "default_archive_timeout")]
    pub archive_timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_soffice_path() -> PathBuf {
    PathBuf::from("soffice")
}

fn default_sevenzip_path() -> PathBuf {
    PathBuf::from("7z")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("convoy")
}

fn default_transcode_timeout() -> u64 {
    0
}

fn default_document_timeout() -> u64 {
    60
}

fn default_archive_timeout() -> u64 {
    0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            soffice_path: default_soffice_path(),
            sevenzip_path: default_sevenzip_path(),
            temp_dir: default_temp_dir(),
            transcode_timeout_secs: default_transcode_timeout(),
            document_timeout_secs: default_document_timeout(),
            archive_timeout_secs: default_archive_timeout(),
            ffmpeg_log_level: default_log_level(),
        }
    }
}

/// Whether one external tool could be located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub tool: Tool,
    /// Configured program name or path.
    pub configured: PathBuf,
    /// Resolved absolute path, if found.
    pub resolved: Option<PathBuf>,
}

impl DependencyStatus {
    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

impl ToolsConfig {
    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// Sets the document conversion timeout in seconds.
    pub fn with_document_timeout(mut self, timeout_secs: u64) -> Self {
        self.document_timeout_secs = timeout_secs;
        self
    }

    /// Sets the transcoder timeout in seconds.
    pub fn with_transcode_timeout(mut self, timeout_secs: u64) -> Self {
        self.transcode_timeout_secs = timeout_secs;
        self
    }

    /// Configured program for a tool.
    pub fn program(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Ffmpeg => &self.ffmpeg_path,
            Tool::Ffprobe => &self.ffprobe_path,
            Tool::Soffice => &self.soffice_path,
            Tool::SevenZip => &self.sevenzip_path,
        }
    }

    /// Time budget for one run of a tool. `None` means unbounded.
    pub fn timeout(&self, tool: Tool) -> Option<Duration> {
        let secs = match tool {
            Tool::Ffmpeg => self.transcode_timeout_secs,
            Tool::Ffprobe => 30,
            Tool::Soffice => self.document_timeout_secs,
            Tool::SevenZip => self.archive_timeout_secs,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    /// Resolves a tool on `PATH` (or as given, if it is a path).
    pub fn resolve(&self, tool: Tool) -> Option<PathBuf> {
        which::which(self.program(tool)).ok()
    }

    /// Reports, per external tool, whether it can be found.
    pub fn check_dependencies(&self) -> Vec<DependencyStatus> {
        [Tool::Ffmpeg, Tool::Ffprobe, Tool::Soffice, Tool::SevenZip]
            .into_iter()
            .map(|tool| DependencyStatus {
                tool,
                configured: self.program(tool).to_path_buf(),
                resolved: self.resolve(tool),
            })
            .collect()
    }

    /// Ensures the temp directory exists and returns it.
    pub async fn ensure_temp_dir(&self) -> std::io::Result<&Path> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        Ok(&self.temp_dir)
    }
}
