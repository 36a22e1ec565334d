//! Command-line argument structures.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use convoy_core::Category;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convoy: batch file conversion",
    long_about = "Converts images, video, audio, documents and archives in batches, \
                  driving FFmpeg, LibreOffice and 7-Zip where needed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true, value_name = "PATH", env = "CONVOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Print Prometheus metrics to stdout before exiting.
    #[arg(long, global = true, default_value_t = false)]
    pub metrics: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Converts files (or every file under a directory) to one format
    Convert(ConvertArgs),
    /// Merges PDFs or videos into a single file
    Merge(MergeArgs),
    /// Lists the target formats offered for a file
    Formats {
        /// File whose extension is looked up
        path: PathBuf,
    },
    /// Manages saved presets
    #[command(subcommand)]
    Presets(PresetCommand),
    /// Checks that the external tools can be found
    Doctor,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input files or directories
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Target format, e.g. jpg, mp4, pdf
    #[arg(long = "to", value_name = "FORMAT")]
    pub format: String,

    /// Target category when a format exists in several (e.g. gif)
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<Category>,

    /// Directory converted files are written to
    #[arg(short, long, value_name = "DIR", conflicts_with = "next_to_source")]
    pub output_dir: Option<PathBuf>,

    /// Write each output next to its source
    #[arg(long)]
    pub next_to_source: bool,

    /// Apply a saved preset to matching jobs before the overrides below
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Per-category settings overrides.
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsArgs {
    /// Image encoder quality (1-100)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Resize: None, 50%, 1920px for images; None, 1080p, 720p, 480p for video
    #[arg(long, value_name = "LABEL")]
    pub resize: Option<String>,

    /// Video bitrate, e.g. 2M or Default
    #[arg(long, value_name = "BITRATE")]
    pub video_bitrate: Option<String>,

    /// Audio bitrate, e.g. 192k or Default
    #[arg(long, value_name = "BITRATE")]
    pub audio_bitrate: Option<String>,

    /// Drop the audio stream from video outputs
    #[arg(long)]
    pub remove_audio: bool,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Inputs, in the order they are joined
    #[arg(required = true, num_args = 2.., value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Merged output file
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// Lists presets, optionally for one category
    List {
        #[arg(long, value_name = "CATEGORY")]
        category: Option<Category>,
    },
    /// Saves settings as a named preset
    Save {
        name: String,

        /// image, video or audio
        #[arg(long, value_name = "CATEGORY")]
        category: Category,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Deletes a preset
    Delete {
        category: Category,
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "convoy", "convert", "a.png", "b.png", "--to", "jpg", "--quality", "80", "-o", "out",
        ])
        .unwrap();
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.paths.len(), 2);
        assert_eq!(args.format, "jpg");
        assert_eq!(args.settings.quality, Some(80));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_output_dir_conflicts_with_next_to_source() {
        let result = Cli::try_parse_from([
            "convoy", "convert", "a.png", "--to", "jpg", "-o", "out", "--next-to-source",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_needs_two_inputs() {
        assert!(Cli::try_parse_from(["convoy", "merge", "a.pdf", "-o", "x.pdf"]).is_err());
        assert!(Cli::try_parse_from(["convoy", "merge", "a.pdf", "b.pdf", "-o", "x.pdf"]).is_ok());
    }

    #[test]
    fn test_parse_preset_delete() {
        let cli = Cli::try_parse_from(["convoy", "presets", "delete", "video", "small"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Presets(PresetCommand::Delete {
                category: Category::Video,
                ..
            })
        ));
    }
}
