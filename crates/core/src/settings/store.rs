use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::AppSettings;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for settings persistence
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the settings, or defaults if nothing was saved yet
    async fn load(&self) -> Result<AppSettings, SettingsError>;

    /// Replace the saved settings
    async fn save(&self, settings: &AppSettings) -> Result<(), SettingsError>;
}

/// Settings stored as pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<AppSettings, SettingsError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(AppSettings::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| SettingsError::Serialization(e.to_string()))
    }

    async fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let json = serde_json::to_vec_pretty(settings)
            .map_err(|e| SettingsError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<AppSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<AppSettings, SettingsError> {
        Ok(self.settings.read().await.clone())
    }

    async fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        *self.settings.write().await = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ImageResize, ImageSettings, JobSettings, VideoSettings};
    use tempfile::TempDir;

    fn sample() -> AppSettings {
        let mut settings = AppSettings::default()
            .with_default_output_dir("/home/me/converted")
            .with_clear_list_on_complete(true);
        settings.presets.insert(
            "thumbnails",
            JobSettings::Image(ImageSettings {
                quality: 80,
                resize: ImageResize::LongEdge(1280),
            }),
        );
        settings.presets.insert(
            "small",
            JobSettings::Video(VideoSettings {
                video_bitrate: Some("1M".parse().unwrap()),
                ..Default::default()
            }),
        );
        settings
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("nested").join("settings.json"));
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = JsonSettingsStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, SettingsError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, br#"{"save_to_source_dir": true}"#).unwrap();
        let settings = JsonSettingsStore::new(path).load().await.unwrap();
        assert!(settings.save_to_source_dir);
        assert!(settings.presets.all().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySettingsStore::default();
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), sample());
    }
}
