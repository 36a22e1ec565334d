//! Named settings snapshots scoped to one category.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Category;

use super::settings::{AudioSettings, ImageSettings, JobSettings, VideoSettings};

/// A named settings bundle.
///
/// Applying a preset copies its settings into a job; there is no live link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: String,
    pub settings: JobSettings,
}

impl Preset {
    pub fn category(&self) -> Option<Category> {
        self.settings.category()
    }
}

/// Presets grouped by category, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presets {
    #[serde(default)]
    pub image: BTreeMap<String, ImageSettings>,
    #[serde(default)]
    pub video: BTreeMap<String, VideoSettings>,
    #[serde(default)]
    pub audio: BTreeMap<String, AudioSettings>,
}

impl Presets {
    /// Looks up a preset by category and name.
    pub fn get(&self, category: Category, name: &str) -> Option<Preset> {
        let settings = match category {
            Category::Image => self.image.get(name).cloned().map(JobSettings::Image),
            Category::Video => self.video.get(name).cloned().map(JobSettings::Video),
            Category::Audio => self.audio.get(name).cloned().map(JobSettings::Audio),
            _ => None,
        }?;
        Some(Preset {
            name: name.to_string(),
            settings,
        })
    }

    /// Stores `settings` under `name`, replacing any previous preset.
    ///
    /// Returns `false` for settings without a category.
    pub fn insert(&mut self, name: impl Into<String>, settings: JobSettings) -> bool {
        let name = name.into();
        match settings {
            JobSettings::Image(s) => {
                self.image.insert(name, s);
            }
            JobSettings::Video(s) => {
                self.video.insert(name, s);
            }
            JobSettings::Audio(s) => {
                self.audio.insert(name, s);
            }
            JobSettings::None => return false,
        }
        true
    }

    /// Removes a preset. Returns whether one existed.
    pub fn remove(&mut self, category: Category, name: &str) -> bool {
        match category {
            Category::Image => self.image.remove(name).is_some(),
            Category::Video => self.video.remove(name).is_some(),
            Category::Audio => self.audio.remove(name).is_some(),
            _ => false,
        }
    }

    /// Preset names for a category, sorted.
    pub fn names(&self, category: Category) -> Vec<String> {
        match category {
            Category::Image => self.image.keys().cloned().collect(),
            Category::Video => self.video.keys().cloned().collect(),
            Category::Audio => self.audio.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Every preset, grouped image, video, audio and sorted by name.
    pub fn all(&self) -> Vec<Preset> {
        [Category::Image, Category::Video, Category::Audio]
            .into_iter()
            .flat_map(|c| {
                self.names(c)
                    .into_iter()
                    .filter_map(move |n| self.get(c, &n))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ImageResize, VideoResize};

    #[test]
    fn test_insert_get_remove() {
        let mut presets = Presets::default();
        let settings = JobSettings::Image(ImageSettings {
            quality: 70,
            resize: ImageResize::Percent(50),
        });
        assert!(presets.insert("web", settings.clone()));
        let preset = presets.get(Category::Image, "web").unwrap();
        assert_eq!(preset.settings, settings);
        assert_eq!(preset.category(), Some(Category::Image));
        assert!(presets.get(Category::Video, "web").is_none());

        assert!(presets.remove(Category::Image, "web"));
        assert!(!presets.remove(Category::Image, "web"));
    }

    #[test]
    fn test_none_settings_rejected() {
        let mut presets = Presets::default();
        assert!(!presets.insert("nothing", JobSettings::None));
        assert!(presets.all().is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let mut presets = Presets::default();
        for name in ["zeta", "alpha", "mid"] {
            presets.insert(
                name,
                JobSettings::Video(VideoSettings {
                    resize: VideoResize::P480,
                    ..Default::default()
                }),
            );
        }
        assert_eq!(presets.names(Category::Video), vec!["alpha", "mid", "zeta"]);
        assert!(presets.names(Category::Archive).is_empty());
    }

    #[test]
    fn test_serialized_layout() {
        let mut presets = Presets::default();
        presets.insert("podcast", JobSettings::Audio(AudioSettings::default()));
        let json = serde_json::to_value(&presets).unwrap();
        assert!(json["audio"]["podcast"].is_object());
        assert!(json["image"].as_object().unwrap().is_empty());
    }
}
