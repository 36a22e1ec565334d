use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::converter::process::os;
use crate::converter::ToolsConfig;

/// Writes a concat demuxer manifest listing `inputs` in order.
pub fn write_manifest(temp_dir: &Path, inputs: &[PathBuf]) -> std::io::Result<tempfile::TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("concat-")
        .suffix(".txt")
        .tempfile_in(temp_dir)?;
    file.write_all(manifest_body(inputs)?.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

fn manifest_body(inputs: &[PathBuf]) -> std::io::Result<String> {
    let mut body = String::new();
    for input in inputs {
        let absolute = if input.is_absolute() {
            input.clone()
        } else {
            std::env::current_dir()?.join(input)
        };
        let quoted = absolute.to_string_lossy().replace('\'', r"'\''");
        body.push_str(&format!("file '{}'\n", quoted));
    }
    Ok(body)
}

/// Transcoder arguments joining the manifest entries by stream copy.
pub fn concat_args(tools: &ToolsConfig, manifest: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-f"),
        os("concat"),
        os("-safe"),
        os("0"),
        os("-i"),
        os(manifest),
        os("-c"),
        os("copy"),
        os("-loglevel"),
        os(&tools.ffmpeg_log_level),
        os("-progress"),
        os("pipe:2"),
        os(output),
    ]
}
