//! Job records and their per-category settings.

mod preset;
mod settings;
mod types;

pub use preset::{Preset, Presets};
pub use settings::{
    parse_optional_bitrate, AudioSettings, Bitrate, ImageResize, ImageSettings, JobSettings,
    ValidationError, VideoResize, VideoSettings,
};
pub use types::{ConversionTarget, JobId, JobKind, JobRecord, JobStatus};
