//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use convoy_core::catalog;
use convoy_core::job::{parse_optional_bitrate, ImageResize, ValidationError, VideoResize};
use convoy_core::{
    Category, Config, JobId, JobRecord, JobSettings, JobStatus, JobWatcher, JsonSettingsStore,
    OutputLocation, Scheduler, SettingsStore, ToolExecutorFactory,
};

use crate::cli::{ConvertArgs, MergeArgs, PresetCommand, SettingsArgs};

/// Builds a scheduler over the configured tools and settings file.
async fn scheduler(config: &Config) -> Result<Scheduler> {
    let store: Arc<dyn SettingsStore> = Arc::new(JsonSettingsStore::new(&config.settings.path));
    let factory = Arc::new(ToolExecutorFactory::new(config.tools.clone()));
    Scheduler::load(factory, store, &config.scheduler)
        .await
        .with_context(|| format!("Failed to load settings from {:?}", config.settings.path))
}

impl SettingsArgs {
    fn is_empty(&self) -> bool {
        self.quality.is_none()
            && self.resize.is_none()
            && self.video_bitrate.is_none()
            && self.audio_bitrate.is_none()
            && !self.remove_audio
    }

    /// Applies the overrides that concern the settings' category.
    fn apply(&self, settings: JobSettings) -> Result<JobSettings, ValidationError> {
        Ok(match settings {
            JobSettings::Image(mut s) => {
                if let Some(quality) = self.quality {
                    s.quality = quality;
                }
                if let Some(resize) = &self.resize {
                    s.resize = resize.parse::<ImageResize>()?;
                }
                JobSettings::Image(s)
            }
            JobSettings::Video(mut s) => {
                if let Some(bitrate) = &self.video_bitrate {
                    s.video_bitrate = parse_optional_bitrate(bitrate)?;
                }
                if let Some(resize) = &self.resize {
                    s.resize = resize.parse::<VideoResize>()?;
                }
                s.remove_audio |= self.remove_audio;
                JobSettings::Video(s)
            }
            JobSettings::Audio(mut s) => {
                if let Some(bitrate) = &self.audio_bitrate {
                    s.audio_bitrate = parse_optional_bitrate(bitrate)?;
                }
                JobSettings::Audio(s)
            }
            JobSettings::None => JobSettings::None,
        })
    }
}

pub async fn convert(config: &Config, args: ConvertArgs) -> Result<bool> {
    let scheduler = scheduler(config).await?;
    let format = catalog::normalize_extension(&args.format);

    let mut ids = Vec::new();
    for path in &args.paths {
        let added = scheduler
            .enqueue(path)
            .await
            .with_context(|| format!("Failed to add {:?}", path))?;
        ids.extend(added);
    }

    let mut jobs = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(record) = scheduler.get(id).await else {
            continue;
        };
        let ext = record.input_extension().unwrap_or_default();
        let category = args
            .category
            .filter(|c| catalog::supports(&ext, *c, &format))
            .or_else(|| catalog::category_for_target(&ext, &format));
        match category {
            Some(category) => {
                scheduler.set_target(id, category, &format).await?;
                jobs.push(id);
            }
            None => {
                warn!(path = %record.label(), format = %format, "Format not offered, skipping");
                println!("[skipped] {}: cannot convert to {}", record.label(), format);
                scheduler.remove(id).await?;
            }
        }
    }
    if jobs.is_empty() {
        bail!("Nothing to convert to {}", format);
    }

    if let Some(name) = &args.preset {
        let mut applied = 0;
        let mut found = false;
        for category in [Category::Image, Category::Video, Category::Audio] {
            if scheduler.preset_names(category).await.contains(name) {
                found = true;
                applied += scheduler.apply_preset(category, name, &jobs).await?;
            }
        }
        if !found {
            bail!("Preset '{}' not found", name);
        }
        info!(preset = %name, applied, "Preset applied");
    }

    if !args.settings.is_empty() {
        for id in &jobs {
            let Some(record) = scheduler.get(*id).await else {
                continue;
            };
            let settings = args
                .settings
                .apply(record.settings)
                .context("Invalid settings")?;
            scheduler.update_settings(*id, settings).await?;
        }
    }

    let location = match (&args.output_dir, args.next_to_source) {
        (Some(dir), _) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create output directory {:?}", dir))?;
            Some(OutputLocation::Directory(dir.clone()))
        }
        (None, true) => Some(OutputLocation::NextToSource),
        (None, false) => None,
    };

    // Subscribe first: finished jobs may be cleared from the list.
    let watchers = watch_all(&scheduler, &jobs).await;
    let started = scheduler
        .start_all(location)
        .await
        .context("Failed to start conversions")?;
    info!(jobs = started.len(), "Batch started");

    let watchers = watchers
        .into_iter()
        .filter(|w| started.contains(&w.id()))
        .collect();
    let records = wait_for(&scheduler, watchers).await;
    report(&records);
    Ok(records.iter().any(|r| r.status == JobStatus::Failed))
}

pub async fn merge(config: &Config, args: MergeArgs) -> Result<bool> {
    let scheduler = scheduler(config).await?;
    let output = absolute(&args.output)?;
    if let Some(dir) = output.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    let id = scheduler.merge_paths(args.paths, output).await?;
    let watchers = watch_all(&scheduler, &[id]).await;
    scheduler.start(id, None).await?;

    let records = wait_for(&scheduler, watchers).await;
    report(&records);
    Ok(records.iter().any(|r| r.status == JobStatus::Failed))
}

pub fn formats(path: &Path) {
    let ext = catalog::extension_of(path).unwrap_or_default();
    let groups = catalog::target_formats(&ext);
    if groups.is_empty() {
        println!("{}: no conversions available", path.display());
        return;
    }
    for group in groups {
        println!("{}: {}", group.category, group.formats.join(", "));
    }
}

pub async fn presets(config: &Config, command: PresetCommand) -> Result<()> {
    let scheduler = scheduler(config).await?;
    match command {
        PresetCommand::List { category } => {
            for preset in scheduler.presets().await {
                if category.is_some() && preset.category() != category {
                    continue;
                }
                let settings = serde_json::to_string(&preset.settings)?;
                let category = preset.category().map(|c| c.as_str()).unwrap_or("none");
                println!("{}/{}: {}", category, preset.name, settings);
            }
        }
        PresetCommand::Save {
            name,
            category,
            settings,
        } => {
            let job_settings = JobSettings::for_category(Some(category));
            if job_settings == JobSettings::None {
                bail!("Presets exist only for image, video and audio");
            }
            let job_settings = settings.apply(job_settings).context("Invalid settings")?;
            scheduler.save_preset(&name, job_settings).await?;
            println!("Saved {}/{}", category, name);
        }
        PresetCommand::Delete { category, name } => {
            scheduler.delete_preset(category, &name).await?;
            println!("Deleted {}/{}", category, name);
        }
    }
    Ok(())
}

pub fn doctor(config: &Config) -> bool {
    let mut missing = false;
    for status in config.tools.check_dependencies() {
        match &status.resolved {
            Some(path) => println!("[ok]      {:<12} {}", status.tool.to_string(), path.display()),
            None => {
                missing = true;
                println!(
                    "[missing] {:<12} {} not found on PATH",
                    status.tool.to_string(),
                    status.configured.display()
                );
            }
        }
    }
    missing
}

async fn watch_all(scheduler: &Scheduler, ids: &[JobId]) -> Vec<JobWatcher> {
    let mut watchers = Vec::with_capacity(ids.len());
    for id in ids {
        watchers.extend(scheduler.watch(*id).await);
    }
    watchers
}

/// Waits for the watched jobs. Ctrl-C cancels everything and keeps waiting
/// until the cancellations are acknowledged.
async fn wait_for(scheduler: &Scheduler, watchers: Vec<JobWatcher>) -> Vec<JobRecord> {
    let waits = futures::future::join_all(watchers.into_iter().map(JobWatcher::finished));
    tokio::pin!(waits);

    tokio::select! {
        records = &mut waits => records,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, cancelling all jobs");
            scheduler.cancel_all().await;
            waits.await
        }
    }
}

fn report(records: &[JobRecord]) {
    for record in records {
        match record.status {
            JobStatus::Completed => println!(
                "[completed] {} -> {}",
                record.label(),
                record
                    .output_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            JobStatus::Failed => println!(
                "[failed] {}: {}",
                record.label(),
                record.error.as_deref().unwrap_or("unknown error")
            ),
            status => println!("[{}] {}", status, record.label()),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::job::{AudioSettings, ImageSettings, VideoSettings};
    use convoy_core::testing::{fixtures, MockExecutor, MockExecutorFactory};
    use convoy_core::{AppSettings, MemorySettingsStore, SchedulerConfig};
    use tempfile::TempDir;

    #[test]
    fn test_overrides_apply_per_category() {
        let args = SettingsArgs {
            quality: Some(70),
            resize: Some("720p".to_string()),
            video_bitrate: Some("2M".to_string()),
            audio_bitrate: Some("Default".to_string()),
            remove_audio: true,
        };

        let video = args.apply(JobSettings::Video(VideoSettings::default())).unwrap();
        let JobSettings::Video(video) = video else {
            panic!("expected video settings");
        };
        assert_eq!(video.resize, VideoResize::P720);
        assert_eq!(video.video_bitrate.unwrap().as_str(), "2M");
        assert!(video.remove_audio);

        let audio = args
            .apply(JobSettings::Audio(AudioSettings::default()))
            .unwrap();
        assert_eq!(audio, JobSettings::Audio(AudioSettings::default()));

        // 720p is not an image resize label
        assert!(args
            .apply(JobSettings::Image(ImageSettings::default()))
            .is_err());
    }

    #[test]
    fn test_image_overrides() {
        let args = SettingsArgs {
            quality: Some(60),
            resize: Some("50%".to_string()),
            ..Default::default()
        };
        let settings = args
            .apply(JobSettings::Image(ImageSettings::default()))
            .unwrap();
        assert_eq!(
            settings,
            JobSettings::Image(ImageSettings {
                quality: 60,
                resize: ImageResize::Percent(50),
            })
        );
        assert!(!args.is_empty());
        assert!(SettingsArgs::default().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_outlives_cleared_list() {
        let dir = TempDir::new().unwrap();
        let settings = AppSettings::default()
            .with_save_to_source_dir(true)
            .with_clear_list_on_complete(true);
        let scheduler = Scheduler::new(
            Arc::new(MockExecutorFactory::new(MockExecutor::new())),
            Arc::new(MemorySettingsStore::new(settings.clone())),
            settings,
            &SchedulerConfig::default(),
        );
        let mut ids = scheduler
            .enqueue(fixtures::touch(dir.path(), "a.png"))
            .await
            .unwrap();
        ids.extend(scheduler.enqueue(fixtures::touch(dir.path(), "b.png")).await.unwrap());

        let watchers = watch_all(&scheduler, &ids).await;
        let started = scheduler.start_all(None).await.unwrap();
        assert_eq!(started, ids);

        let records = wait_for(&scheduler, watchers).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == JobStatus::Completed));
        assert!(scheduler.jobs().await.is_empty());
    }
}
