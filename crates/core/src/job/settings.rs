//! Typed per-category conversion settings.
//!
//! Settings are validated at the edit boundary (`JobSettings::validate`)
//! and copied into the executor when a job starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::catalog::Category;

/// A settings value failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A transcoder bitrate such as `500k` or `2M`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bitrate(String);

impl Bitrate {
    /// The value passed to the transcoder.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Bitrate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.trim_end_matches(['k', 'K', 'm', 'M']);
        let suffix = &s[digits.len()..];
        if digits.is_empty() || suffix.len() > 1 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new(
                "bitrate",
                format!("'{}' is not of the form <digits>[k|M]", s),
            ));
        }
        if digits.chars().all(|c| c == '0') {
            return Err(ValidationError::new("bitrate", "must be greater than zero"));
        }
        // The transcoder reads a lowercase `m` as milli.
        let suffix = match suffix {
            "m" | "M" => "M",
            "k" | "K" => "k",
            _ => "",
        };
        Ok(Self(format!("{}{}", digits, suffix)))
    }
}

impl TryFrom<String> for Bitrate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bitrate> for String {
    fn from(value: Bitrate) -> Self {
        value.0
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses an optional bitrate where `Default` (or empty) means no override.
pub fn parse_optional_bitrate(s: &str) -> Result<Option<Bitrate>, ValidationError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("default") {
        Ok(None)
    } else {
        trimmed.parse().map(Some)
    }
}

/// How an image is resized before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageResize {
    #[default]
    None,
    /// Scale both dimensions by a percentage of the original.
    Percent(u8),
    /// Scale so the longer edge equals this many pixels.
    LongEdge(u32),
}

impl ImageResize {
    /// Computes the target dimensions for an image of `width` x `height`.
    ///
    /// Returns `None` when no resize applies. The long edge is the width
    /// only when width is strictly greater than height.
    pub fn target_dimensions(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let (w, h) = match *self {
            Self::None => return None,
            Self::Percent(pct) => {
                let scale = f64::from(pct) / 100.0;
                (
                    (f64::from(width) * scale) as u32,
                    (f64::from(height) * scale) as u32,
                )
            }
            Self::LongEdge(px) => {
                if width == 0 || height == 0 {
                    return None;
                }
                if width > height {
                    (px, (u64::from(height) * u64::from(px) / u64::from(width)) as u32)
                } else {
                    ((u64::from(width) * u64::from(px) / u64::from(height)) as u32, px)
                }
            }
        };
        Some((w.max(1), h.max(1)))
    }
}

impl FromStr for ImageResize {
    type Err = ValidationError;

    /// Accepts `None`, `50%`, `1920px` and labels like `1920px (Full HD)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.split_whitespace().next().unwrap_or("");
        if token.is_empty() || token.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        if let Some(pct) = token.strip_suffix('%') {
            let pct: u8 = pct
                .parse()
                .map_err(|_| ValidationError::new("resize", format!("bad percentage '{}'", s)))?;
            if pct == 0 || pct > 100 {
                return Err(ValidationError::new("resize", "percentage must be 1-100"));
            }
            return Ok(Self::Percent(pct));
        }
        if let Some(px) = token.strip_suffix("px") {
            let px: u32 = px
                .parse()
                .map_err(|_| ValidationError::new("resize", format!("bad pixel size '{}'", s)))?;
            if px == 0 {
                return Err(ValidationError::new("resize", "pixel size must be positive"));
            }
            return Ok(Self::LongEdge(px));
        }
        Err(ValidationError::new(
            "resize",
            format!("'{}' is not None, N% or Npx", s),
        ))
    }
}

impl TryFrom<String> for ImageResize {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImageResize> for String {
    fn from(value: ImageResize) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ImageResize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Percent(p) => write!(f, "{}%", p),
            Self::LongEdge(px) => write!(f, "{}px", px),
        }
    }
}

/// Named video output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VideoResize {
    #[default]
    None,
    P1080,
    P720,
    P480,
}

impl VideoResize {
    /// Output height in pixels; width is derived to keep the aspect ratio.
    pub fn height(&self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
        }
    }

    /// Transcoder scale filter: even width, fixed height.
    pub fn scale_filter(&self) -> Option<String> {
        self.height().map(|h| format!("scale=-2:{}", h))
    }
}

impl FromStr for VideoResize {
    type Err = ValidationError;

    /// Accepts `None`, `720p` and labels like `720p (1280x720)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_whitespace().next().unwrap_or("").to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "1080p" => Ok(Self::P1080),
            "720p" => Ok(Self::P720),
            "480p" => Ok(Self::P480),
            _ => Err(ValidationError::new(
                "resize",
                format!("'{}' is not one of None, 1080p, 720p, 480p", s),
            )),
        }
    }
}

impl TryFrom<String> for VideoResize {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VideoResize> for String {
    fn from(value: VideoResize) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VideoResize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.height() {
            None => f.write_str("None"),
            Some(h) => write!(f, "{}p", h),
        }
    }
}

/// Image conversion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSettings {
    /// Encoder quality (1-100), honored only by lossy formats.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Resize applied before encoding.
    #[serde(default)]
    pub resize: ImageResize,
}

fn default_quality() -> u8 {
    95
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            resize: ImageResize::None,
        }
    }
}

impl ImageSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ValidationError::new("quality", "must be between 1 and 100"));
        }
        match self.resize {
            ImageResize::Percent(p) if p == 0 || p > 100 => {
                Err(ValidationError::new("resize", "percentage must be 1-100"))
            }
            ImageResize::LongEdge(0) => {
                Err(ValidationError::new("resize", "pixel size must be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// Video conversion settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Video bitrate override; `None` keeps the transcoder default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<Bitrate>,
    /// Output resolution.
    #[serde(default)]
    pub resize: VideoResize,
    /// Drop the audio stream.
    #[serde(default)]
    pub remove_audio: bool,
}

/// Audio conversion settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Audio bitrate override; `None` keeps the transcoder default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<Bitrate>,
}

/// Settings attached to a job, shaped by the job's input category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum JobSettings {
    Image(ImageSettings),
    Video(VideoSettings),
    Audio(AudioSettings),
    /// Categories without tunable settings.
    #[default]
    None,
}

impl JobSettings {
    /// Default settings for an input category.
    pub fn for_category(category: Option<Category>) -> Self {
        match category {
            Some(Category::Image) => Self::Image(ImageSettings::default()),
            Some(Category::Video) => Self::Video(VideoSettings::default()),
            Some(Category::Audio) => Self::Audio(AudioSettings::default()),
            _ => Self::None,
        }
    }

    /// The category these settings belong to, if any.
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Image(_) => Some(Category::Image),
            Self::Video(_) => Some(Category::Video),
            Self::Audio(_) => Some(Category::Audio),
            Self::None => None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Image(s) => s.validate(),
            _ => Ok(()),
        }
    }

    pub fn as_image(&self) -> Option<&ImageSettings> {
        match self {
            Self::Image(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoSettings> {
        match self {
            Self::Video(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioSettings> {
        match self {
            Self::Audio(s) => Some(s),
            _ => None,
        }
    }
}
