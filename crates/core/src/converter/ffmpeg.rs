//! FFmpeg-based executors: transcodes, audio/frame extraction and GIFs.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::job::JobSettings;
use crate::strategy::Strategy;

use super::config::{Tool, ToolsConfig};
use super::error::ConverterError;
use super::process::{os, verify_output, ToolCommand};
use super::progress::{parse_duration, parse_timestamp, percent_of};
use super::traits::Executor;
use super::types::{ExecutionContext, ExecutionRequest};

const GIF_FILTER: &str = "fps=15,scale=480:-1:flags=lanczos";
const FRAME_OFFSET: &str = "00:00:05";

/// Runs the transcoder for one of the media strategies.
pub struct FfmpegExecutor {
    tools: Arc<ToolsConfig>,
    strategy: Strategy,
}

impl FfmpegExecutor {
    /// Creates an executor for a transcoder strategy.
    pub fn new(tools: Arc<ToolsConfig>, strategy: Strategy) -> Self {
        Self { tools, strategy }
    }

    fn input_args(input: &Path) -> Vec<OsString> {
        vec![os("-y"), os("-i"), os(input)]
    }

    fn output_args(&self, args: &mut Vec<OsString>, output: &Path) {
        args.extend([
            os("-loglevel"),
            os(&self.tools.ffmpeg_log_level),
            os("-progress"),
            os("pipe:2"),
            os(output),
        ]);
    }

    /// Arguments for a same-category transcode, applying bitrate, audio
    /// removal and resize settings.
    pub(crate) fn transcode_args(
        &self,
        input: &Path,
        output: &Path,
        settings: &JobSettings,
    ) -> Vec<OsString> {
        let mut args = Self::input_args(input);
        match settings {
            JobSettings::Video(video) => {
                if let Some(bitrate) = &video.video_bitrate {
                    args.extend([os("-b:v"), os(bitrate.as_str())]);
                }
                if video.remove_audio {
                    args.push(os("-an"));
                }
                if let Some(filter) = video.resize.scale_filter() {
                    args.extend([os("-vf"), os(filter)]);
                }
            }
            JobSettings::Audio(audio) => {
                if let Some(bitrate) = &audio.audio_bitrate {
                    args.extend([os("-b:a"), os(bitrate.as_str())]);
                }
            }
            JobSettings::Image(_) | JobSettings::None => {}
        }
        self.output_args(&mut args, output);
        args
    }

    /// Arguments that drop the video stream.
    pub(crate) fn audio_extract_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args = Self::input_args(input);
        args.push(os("-vn"));
        self.output_args(&mut args, output);
        args
    }

    /// Arguments that grab a single frame at a fixed offset.
    pub(crate) fn frame_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args = Self::input_args(input);
        args.extend([os("-ss"), os(FRAME_OFFSET), os("-vframes"), os("1")]);
        self.output_args(&mut args, output);
        args
    }

    pub(crate) fn palette_args(&self, input: &Path, palette: &Path) -> Vec<OsString> {
        let mut args = Self::input_args(input);
        args.extend([os("-vf"), os(format!("{},palettegen", GIF_FILTER))]);
        self.output_args(&mut args, palette);
        args
    }

    pub(crate) fn paletteuse_args(
        &self,
        input: &Path,
        palette: &Path,
        output: &Path,
    ) -> Vec<OsString> {
        let mut args = Self::input_args(input);
        args.extend([
            os("-i"),
            os(palette),
            os("-lavfi"),
            os(format!("{}[x];[x][1:v]paletteuse", GIF_FILTER)),
        ]);
        self.output_args(&mut args, output);
        args
    }

    async fn make_gif(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
        duration: Option<f64>,
    ) -> Result<(), ConverterError> {
        let temp_dir = self.tools.ensure_temp_dir().await?;
        let palette = tempfile::Builder::new()
            .prefix("palette-")
            .suffix(".png")
            .tempfile_in(temp_dir)?
            .into_temp_path();

        let result = async {
            ctx.progress.report(5);
            run_transcoder(
                &self.tools,
                self.palette_args(request.input(), &palette),
                None,
                ctx,
                |p| p,
            )
            .await?;

            ctx.progress.report(50);
            run_transcoder(
                &self.tools,
                self.paletteuse_args(request.input(), &palette, &request.output_path),
                duration,
                ctx,
                |p| 50 + p / 2,
            )
            .await
        }
        .await;

        remove_temp(palette);
        result
    }
}

/// Asks the probe tool for the total duration of `input`, in seconds.
///
/// Any failure yields `None`; progress then stays unreported.
pub(crate) async fn probe_duration(tools: &ToolsConfig, input: &Path) -> Option<f64> {
    let mut command = Command::new(&tools.ffprobe_path);
    command
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    let probe = command.output();

    let output = match tools.timeout(Tool::Ffprobe) {
        Some(limit) => tokio::time::timeout(limit, probe).await.ok()?,
        None => probe.await,
    };
    match output {
        Ok(output) if output.status.success() => {
            parse_duration(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            debug!(
                path = %input.display(),
                code = ?output.status.code(),
                "Duration probe failed"
            );
            None
        }
        Err(e) => {
            debug!(path = %input.display(), error = %e, "Duration probe could not run");
            None
        }
    }
}

/// Runs the transcoder, translating timestamps into progress.
///
/// `scale` maps the 0-100 run percentage into the job's overall range.
pub(crate) async fn run_transcoder<S>(
    tools: &ToolsConfig,
    args: Vec<OsString>,
    duration: Option<f64>,
    ctx: &ExecutionContext,
    scale: S,
) -> Result<(), ConverterError>
where
    S: Fn(u8) -> u8 + Send,
{
    let progress = ctx.progress.clone();
    ToolCommand::new(tools, Tool::Ffmpeg)
        .args(args)
        .run(&ctx.cancel, move |line| {
            if let (Some(total), Some(current)) = (duration, parse_timestamp(line)) {
                if let Some(pct) = percent_of(current, total) {
                    progress.report(scale(pct));
                }
            }
        })
        .await
}

/// Deletes a temporary file now, logging instead of failing.
pub(crate) fn remove_temp(path: tempfile::TempPath) {
    let shown = path.to_path_buf();
    if let Err(e) = path.close() {
        warn!(path = %shown.display(), error = %e, "Failed to remove temporary file");
    }
}

#[async_trait]
impl Executor for FfmpegExecutor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        request.prepare_output_dir().await?;
        let input = request.input();
        let output = &request.output_path;

        match self.strategy {
            Strategy::MediaTranscode => {
                let duration = probe_duration(&self.tools, input).await;
                let args = self.transcode_args(input, output, &request.settings);
                run_transcoder(&self.tools, args, duration, ctx, |p| p).await?;
            }
            Strategy::VideoToAudio => {
                let duration = probe_duration(&self.tools, input).await;
                let args = self.audio_extract_args(input, output);
                run_transcoder(&self.tools, args, duration, ctx, |p| p).await?;
            }
            Strategy::VideoToImage => {
                let args = self.frame_args(input, output);
                run_transcoder(&self.tools, args, None, ctx, |p| p).await?;
            }
            Strategy::VideoToGif => {
                let duration = probe_duration(&self.tools, input).await;
                self.make_gif(request, ctx, duration).await?;
            }
            other => {
                return Err(ConverterError::invalid_settings(format!(
                    "transcoder cannot run strategy {}",
                    other
                )))
            }
        }

        verify_output(output).await
    }
}
