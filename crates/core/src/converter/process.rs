//! Running external tools with cancellation and time budgets.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics;

use super::config::{Tool, ToolsConfig};
use super::error::ConverterError;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// One external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    tool: Tool,
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Creates a command for `tool` using the configured program and budget.
    pub fn new(tools: &ToolsConfig, tool: Tool) -> Self {
        Self {
            tool,
            program: tools.program(tool).to_path_buf(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            timeout: tools.timeout(tool),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Runs the tool to completion, handing every stderr line to `on_line`.
    ///
    /// When `cancel` fires or the time budget runs out, the process is
    /// killed and awaited before returning `Cancelled` or `Timeout`. A
    /// non-zero exit becomes `ToolFailed` carrying the stderr tail.
    pub async fn run<F>(self, cancel: &CancellationToken, mut on_line: F) -> Result<(), ConverterError>
    where
        F: FnMut(&str) + Send,
    {
        let tool = self.tool;
        debug!(
            tool = tool.as_str(),
            program = %self.program.display(),
            args = self.args.len(),
            "Spawning external tool"
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| spawn_error(tool, &self.program, e))?;
        let stderr = child.stderr.take();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        let outcome = {
            let work = async {
                if let Some(stderr) = stderr {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Some(line) = lines.next_line().await? {
                        on_line(&line);
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
                child.wait().await
            };
            let deadline = async {
                match self.timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                status = work => Outcome::Exited(status),
                _ = cancel.cancelled() => Outcome::Cancelled,
                _ = deadline => Outcome::TimedOut,
            }
        };

        let result = match outcome {
            Outcome::Exited(Ok(status)) => check_status(tool, status, &tail),
            Outcome::Exited(Err(e)) => Err(ConverterError::Io(e)),
            Outcome::Cancelled => {
                let _ = child.kill().await;
                Err(ConverterError::Cancelled)
            }
            Outcome::TimedOut => {
                let _ = child.kill().await;
                Err(ConverterError::Timeout {
                    tool,
                    timeout_secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                })
            }
        };

        metrics::TOOL_INVOCATIONS
            .with_label_values(&[tool.as_str(), result_label(&result)])
            .inc();
        metrics::TOOL_DURATION
            .with_label_values(&[tool.as_str()])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

fn result_label(result: &Result<(), ConverterError>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(ConverterError::Cancelled) => "cancelled",
        Err(ConverterError::Timeout { .. }) => "timeout",
        Err(_) => "failed",
    }
}

fn check_status(tool: Tool, status: ExitStatus, tail: &VecDeque<String>) -> Result<(), ConverterError> {
    if status.success() {
        return Ok(());
    }
    let stderr = if tail.is_empty() {
        None
    } else {
        Some(tail.iter().cloned().collect::<Vec<_>>().join("\n"))
    };
    let reason = match status.code() {
        Some(code) => format!("exited with code {}", code),
        None => "terminated by signal".to_string(),
    };
    Err(ConverterError::tool_failed(tool, reason, stderr))
}

pub(crate) fn os(s: impl AsRef<OsStr>) -> OsString {
    s.as_ref().to_os_string()
}

/// Runs an in-process codec call on the blocking pool.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ConverterError>
where
    F: FnOnce() -> Result<T, ConverterError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConverterError::Io(std::io::Error::other(e)))?
}

/// Confirms a tool actually wrote `path`.
pub(crate) async fn verify_output(path: &Path) -> Result<PathBuf, ConverterError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(path.to_path_buf()),
        _ => Err(ConverterError::OutputMissing {
            path: path.to_path_buf(),
        }),
    }
}

/// Maps a spawn failure, treating "not found" as a missing tool.
pub(crate) fn spawn_error(tool: Tool, program: &Path, e: std::io::Error) -> ConverterError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ConverterError::ToolMissing {
            tool,
            path: program.to_path_buf(),
        }
    } else {
        ConverterError::Io(e)
    }
}
