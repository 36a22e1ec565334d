//! Persisted application settings and presets.
//!
//! The store contract is load/save of one [`AppSettings`] record; the file
//! format only has to survive a round trip.

mod store;

pub use store::{JsonSettingsStore, MemorySettingsStore, SettingsError, SettingsStore};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::Presets;

/// User-level settings shared by every job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Output directory used when not saving next to the source.
    #[serde(default)]
    pub default_output_dir: Option<PathBuf>,
    /// Remove finished jobs once nothing is running.
    #[serde(default)]
    pub clear_list_on_complete: bool,
    /// Write each output into its source's directory.
    #[serde(default)]
    pub save_to_source_dir: bool,
    #[serde(default)]
    pub presets: Presets,
}

impl AppSettings {
    pub fn with_default_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_output_dir = Some(dir.into());
        self
    }

    pub fn with_save_to_source_dir(mut self, enabled: bool) -> Self {
        self.save_to_source_dir = enabled;
        self
    }

    pub fn with_clear_list_on_complete(mut self, enabled: bool) -> Self {
        self.clear_list_on_complete = enabled;
        self
    }
}
