//! Job scheduler implementation.
//!
//! The job table is guarded by one lock, held only for a state transition
//! and never across an executor run. Each started job gets a driver task
//! that consumes its executor events and applies them to the table.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::{self, Category};
use crate::config::SchedulerConfig;
use crate::converter::{
    ErrorKind, Execution, ExecutionHandle, ExecutionPlan, ExecutionRequest, ExecutorEvent,
    ExecutorFactory,
};
use crate::job::{ConversionTarget, JobId, JobKind, JobRecord, JobSettings, JobStatus, Preset};
use crate::merge;
use crate::metrics;
use crate::settings::{AppSettings, SettingsStore};
use crate::strategy;

use super::types::{
    JobChange, JobUpdate, JobWatcher, OutputLocation, SchedulerError, SchedulerStatus,
};

/// A job record plus the channel its watchers follow.
struct JobSlot {
    record: JobRecord,
    tx: watch::Sender<JobRecord>,
}

impl JobSlot {
    fn new(record: JobRecord) -> Self {
        let (tx, _) = watch::channel(record.clone());
        Self { record, tx }
    }

    fn publish(&self) {
        self.tx.send_replace(self.record.clone());
    }
}

/// Final records kept for `wait` after the list is cleared on completion.
const CLEARED_RETAINED: usize = 1024;

#[derive(Default)]
struct JobTable {
    jobs: BTreeMap<JobId, JobSlot>,
    /// At most one live execution per job id.
    running: HashMap<JobId, ExecutionHandle>,
    /// Jobs dropped by `clear_list_on_complete`, oldest first.
    cleared: BTreeMap<JobId, JobRecord>,
}

struct Inner {
    factory: Arc<dyn ExecutorFactory>,
    store: Arc<dyn SettingsStore>,
    settings: RwLock<AppSettings>,
    table: RwLock<JobTable>,
    next_id: AtomicU64,
    updates: broadcast::Sender<JobUpdate>,
}

/// Owns the job table and runs jobs through their lifecycle.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler with already loaded settings.
    pub fn new(
        factory: Arc<dyn ExecutorFactory>,
        store: Arc<dyn SettingsStore>,
        settings: AppSettings,
        config: &SchedulerConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            inner: Arc::new(Inner {
                factory,
                store,
                settings: RwLock::new(settings),
                table: RwLock::new(JobTable::default()),
                next_id: AtomicU64::new(1),
                updates,
            }),
        }
    }

    /// Create a scheduler, loading settings from `store`.
    pub async fn load(
        factory: Arc<dyn ExecutorFactory>,
        store: Arc<dyn SettingsStore>,
        config: &SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        let settings = store.load().await?;
        Ok(Self::new(factory, store, settings, config))
    }

    /// Subscribe to job changes.
    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.inner.updates.subscribe()
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Adds a file, or every file under a directory, to the queue.
    pub async fn enqueue(&self, path: impl AsRef<Path>) -> Result<Vec<JobId>, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        let files = tokio::task::spawn_blocking(move || collect_files(&path))
            .await
            .map_err(std::io::Error::other)??;

        let mut table = self.inner.table.write().await;
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = self.inner.issue_id();
            let record = JobRecord::conversion(id, file);
            info!(
                job_id = %id,
                path = %record.label(),
                category = record.input_category.map(|c| c.as_str()).unwrap_or("unknown"),
                "Job enqueued"
            );
            table.jobs.insert(id, JobSlot::new(record));
            metrics::JOBS_ENQUEUED.inc();
            self.inner.notify(id, JobChange::Added);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Creates a merge job from the sources of existing conversion jobs.
    ///
    /// The selected jobs stay in the queue.
    pub async fn merge(&self, ids: &[JobId], output: PathBuf) -> Result<JobId, SchedulerError> {
        let paths = {
            let table = self.inner.table.read().await;
            let mut paths = Vec::with_capacity(ids.len());
            for id in ids {
                let slot = table.jobs.get(id).ok_or(SchedulerError::JobNotFound(*id))?;
                if slot.record.kind != JobKind::Convert {
                    return Err(SchedulerError::NotConvertible {
                        id: *id,
                        reason: "merge jobs cannot be merged again".to_string(),
                    });
                }
                paths.extend(slot.record.primary_source().map(Path::to_path_buf));
            }
            paths
        };
        self.merge_paths(paths, output).await
    }

    /// Creates a merge job for `paths`, in order, writing to `output`.
    ///
    /// Preconditions are checked before a job id is issued.
    pub async fn merge_paths(
        &self,
        paths: Vec<PathBuf>,
        output: PathBuf,
    ) -> Result<JobId, SchedulerError> {
        let kind = merge::validate_merge(&paths, &output)?;

        let mut table = self.inner.table.write().await;
        let id = self.inner.issue_id();
        let record = JobRecord::merge(id, kind, paths, output);
        info!(job_id = %id, kind = %kind, inputs = record.source_paths.len(), "Merge job created");
        table.jobs.insert(id, JobSlot::new(record));
        metrics::JOBS_ENQUEUED.inc();
        self.inner.notify(id, JobChange::Added);
        Ok(id)
    }

    /// Get a job record.
    pub async fn get(&self, id: JobId) -> Option<JobRecord> {
        let table = self.inner.table.read().await;
        table.jobs.get(&id).map(|slot| slot.record.clone())
    }

    /// All job records in id order.
    pub async fn jobs(&self) -> Vec<JobRecord> {
        let table = self.inner.table.read().await;
        table.jobs.values().map(|slot| slot.record.clone()).collect()
    }

    /// Follow a job's record.
    pub async fn watch(&self, id: JobId) -> Option<JobWatcher> {
        let table = self.inner.table.read().await;
        table
            .jobs
            .get(&id)
            .map(|slot| JobWatcher::new(id, slot.tx.subscribe()))
    }

    /// Counts of jobs per status.
    pub async fn status(&self) -> SchedulerStatus {
        let table = self.inner.table.read().await;
        let mut status = SchedulerStatus::default();
        for slot in table.jobs.values() {
            status.count(slot.record.status);
        }
        status
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Sets the target of a conversion job.
    ///
    /// A target the catalog does not offer is accepted with a warning; the
    /// job then runs as an unsupported conversion.
    pub async fn set_target(
        &self,
        id: JobId,
        category: Category,
        format: &str,
    ) -> Result<(), SchedulerError> {
        let mut table = self.inner.table.write().await;
        let slot = table
            .jobs
            .get_mut(&id)
            .ok_or(SchedulerError::JobNotFound(id))?;
        ensure_not_running(&slot.record, "change target")?;
        if slot.record.kind != JobKind::Convert {
            return Err(SchedulerError::NotConvertible {
                id,
                reason: "merge output format is fixed".to_string(),
            });
        }

        let target = ConversionTarget::new(category, format);
        let ext = slot.record.input_extension().unwrap_or_default();
        if !catalog::supports(&ext, target.category, &target.format) {
            warn!(
                job_id = %id,
                ext = %ext,
                target = %target.format,
                "Target format not offered for this input"
            );
        }
        slot.record.target = Some(target);
        slot.publish();
        self.inner.notify(id, JobChange::Edited);
        Ok(())
    }

    /// Replaces a job's settings.
    ///
    /// Rejected while the job runs, when validation fails, or when the
    /// settings belong to another category than the job's input.
    pub async fn update_settings(
        &self,
        id: JobId,
        settings: JobSettings,
    ) -> Result<(), SchedulerError> {
        settings.validate()?;

        let mut table = self.inner.table.write().await;
        let slot = table
            .jobs
            .get_mut(&id)
            .ok_or(SchedulerError::JobNotFound(id))?;
        ensure_not_running(&slot.record, "edit settings")?;

        let expected = match slot.record.kind {
            JobKind::Convert => JobSettings::for_category(slot.record.input_category).category(),
            JobKind::Merge(_) => None,
        };
        if settings.category() != expected {
            return Err(SchedulerError::InvalidSettings(format!(
                "{} settings do not apply to {}",
                settings
                    .category()
                    .map(|c| c.as_str())
                    .unwrap_or("empty"),
                slot.record.label()
            )));
        }

        slot.record.settings = settings;
        slot.publish();
        self.inner.notify(id, JobChange::Edited);
        Ok(())
    }

    /// Moves a finished job back to pending so it can run again.
    pub async fn reset(&self, id: JobId) -> Result<(), SchedulerError> {
        let mut table = self.inner.table.write().await;
        let slot = table
            .jobs
            .get_mut(&id)
            .ok_or(SchedulerError::JobNotFound(id))?;
        match slot.record.status {
            JobStatus::Pending => return Ok(()),
            JobStatus::InProgress => {
                return Err(SchedulerError::InvalidState {
                    id,
                    status: JobStatus::InProgress,
                    action: "reset",
                })
            }
            _ => {}
        }

        let record = &mut slot.record;
        record.status = JobStatus::Pending;
        record.progress = 0;
        record.error = None;
        record.started_at = None;
        record.finished_at = None;
        if record.kind == JobKind::Convert {
            record.output_path = None;
        }
        slot.publish();
        debug!(job_id = %id, "Job reset to pending");
        self.inner.notify(id, JobChange::Edited);
        Ok(())
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// Starts one pending job.
    ///
    /// Returns `Ok(false)` without changing anything if the job is not
    /// pending. `location` overrides the configured output location.
    pub async fn start(
        &self,
        id: JobId,
        location: Option<OutputLocation>,
    ) -> Result<bool, SchedulerError> {
        let location = self.resolve_location(location).await;
        let mut table = self.inner.table.write().await;
        self.start_locked(&mut table, id, location.as_ref())
    }

    /// Starts every pending job as one batch.
    ///
    /// The output location is resolved once for the whole batch. Jobs that
    /// cannot start are skipped; they do not stop their siblings.
    pub async fn start_all(
        &self,
        location: Option<OutputLocation>,
    ) -> Result<Vec<JobId>, SchedulerError> {
        let location = self.resolve_location(location).await;
        let mut table = self.inner.table.write().await;

        let pending: Vec<JobId> = table
            .jobs
            .values()
            .filter(|slot| slot.record.status == JobStatus::Pending)
            .map(|slot| slot.record.id)
            .collect();
        let needs_location = pending.iter().any(|id| {
            table
                .jobs
                .get(id)
                .is_some_and(|slot| slot.record.kind == JobKind::Convert)
        });
        match &location {
            Some(location) => {
                info!(location = ?location, jobs = pending.len(), "Batch output location resolved")
            }
            None if needs_location => return Err(SchedulerError::NoOutputDirectory),
            None => {}
        }

        let mut started = Vec::new();
        for id in pending {
            match self.start_locked(&mut table, id, location.as_ref()) {
                Ok(true) => started.push(id),
                Ok(false) => {}
                Err(e) => warn!(job_id = %id, error = %e, "Skipping job"),
            }
        }
        Ok(started)
    }

    /// Cancels a job.
    ///
    /// A pending job becomes cancelled at once. A running job is asked to
    /// stop and becomes cancelled when its executor acknowledges. Finished
    /// jobs are left alone.
    pub async fn cancel(&self, id: JobId) -> Result<(), SchedulerError> {
        let mut table = self.inner.table.write().await;
        if !table.jobs.contains_key(&id) {
            return Err(SchedulerError::JobNotFound(id));
        }
        self.cancel_locked(&mut table, id);
        Ok(())
    }

    /// Cancels every pending and running job. Returns how many were affected.
    pub async fn cancel_all(&self) -> usize {
        let mut table = self.inner.table.write().await;
        let ids: Vec<JobId> = table
            .jobs
            .values()
            .filter(|slot| !slot.record.status.is_terminal())
            .map(|slot| slot.record.id)
            .collect();
        for id in &ids {
            self.cancel_locked(&mut table, *id);
        }
        if !ids.is_empty() {
            info!(jobs = ids.len(), "Cancel requested for all jobs");
        }
        ids.len()
    }

    /// Waits until a job is terminal and returns its record.
    ///
    /// A pending job is waited on until it is started and finishes. A job
    /// already cleared from the list on completion returns its final record.
    pub async fn wait(&self, id: JobId) -> Result<JobRecord, SchedulerError> {
        let watcher = {
            let table = self.inner.table.read().await;
            match table.jobs.get(&id) {
                Some(slot) => JobWatcher::new(id, slot.tx.subscribe()),
                None => {
                    return table
                        .cleared
                        .get(&id)
                        .cloned()
                        .ok_or(SchedulerError::JobNotFound(id))
                }
            }
        };
        Ok(watcher.finished().await)
    }

    /// Waits for every job running right now.
    pub async fn wait_all(&self) -> Vec<JobRecord> {
        let watchers: Vec<JobWatcher> = {
            let table = self.inner.table.read().await;
            table
                .running
                .keys()
                .filter_map(|id| table.jobs.get(id))
                .map(|slot| JobWatcher::new(slot.record.id, slot.tx.subscribe()))
                .collect()
        };
        futures::future::join_all(watchers.into_iter().map(JobWatcher::finished)).await
    }

    /// Removes a job, cancelling it first and waiting for the cancel to be
    /// acknowledged if it is running.
    pub async fn remove(&self, id: JobId) -> Result<JobRecord, SchedulerError> {
        let mut cancelled = None;
        loop {
            let watcher = {
                let mut table = self.inner.table.write().await;
                let Some(slot) = table.jobs.get(&id) else {
                    // The cancelled run may have been the last one and
                    // cleared the list.
                    return match cancelled {
                        Some(record) => {
                            table.cleared.remove(&id);
                            info!(job_id = %id, "Job removed");
                            Ok(record)
                        }
                        None => Err(SchedulerError::JobNotFound(id)),
                    };
                };
                let watcher = JobWatcher::new(id, slot.tx.subscribe());
                match table.running.get(&id) {
                    Some(handle) => {
                        handle.cancel();
                        watcher
                    }
                    None => {
                        let slot = table.jobs.remove(&id).ok_or(SchedulerError::JobNotFound(id))?;
                        info!(job_id = %id, "Job removed");
                        self.inner.notify(id, JobChange::Removed);
                        return Ok(slot.record);
                    }
                }
            };
            debug!(job_id = %id, "Waiting for cancel before removal");
            cancelled = Some(watcher.finished().await);
        }
    }

    /// Cancels everything, waits for running jobs, and empties the queue.
    ///
    /// Returns the number of records removed.
    pub async fn clear(&self) -> usize {
        self.cancel_all().await;
        self.wait_all().await;

        let mut table = self.inner.table.write().await;
        let idle: Vec<JobId> = table
            .jobs
            .keys()
            .filter(|id| !table.running.contains_key(id))
            .copied()
            .collect();
        for id in &idle {
            table.jobs.remove(id);
            self.inner.notify(*id, JobChange::Removed);
        }
        info!(removed = idle.len(), "Queue cleared");
        idle.len()
    }

    // =========================================================================
    // Settings and presets
    // =========================================================================

    /// Current application settings.
    pub async fn app_settings(&self) -> AppSettings {
        self.inner.settings.read().await.clone()
    }

    /// Edits the application settings and persists them.
    ///
    /// Nothing changes if saving fails.
    pub async fn configure<F>(&self, edit: F) -> Result<AppSettings, SchedulerError>
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut settings = self.inner.settings.write().await;
        let mut updated = settings.clone();
        edit(&mut updated);
        self.inner.store.save(&updated).await?;
        *settings = updated.clone();
        Ok(updated)
    }

    /// Every preset, grouped by category and sorted by name.
    pub async fn presets(&self) -> Vec<Preset> {
        self.inner.settings.read().await.presets.all()
    }

    /// Preset names for one category, sorted.
    pub async fn preset_names(&self, category: Category) -> Vec<String> {
        self.inner.settings.read().await.presets.names(category)
    }

    /// Saves `settings` as a preset of their category.
    pub async fn save_preset(&self, name: &str, settings: JobSettings) -> Result<(), SchedulerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchedulerError::InvalidSettings(
                "preset name is empty".to_string(),
            ));
        }
        settings.validate()?;
        if settings.category().is_none() {
            return Err(SchedulerError::InvalidSettings(
                "presets hold image, video or audio settings".to_string(),
            ));
        }

        self.configure(|s| {
            s.presets.insert(name, settings);
        })
        .await?;
        info!(preset = name, "Preset saved");
        Ok(())
    }

    /// Saves a job's current settings as a preset.
    pub async fn save_preset_from_job(&self, id: JobId, name: &str) -> Result<(), SchedulerError> {
        let record = self.get(id).await.ok_or(SchedulerError::JobNotFound(id))?;
        self.save_preset(name, record.settings).await
    }

    /// Deletes a preset.
    pub async fn delete_preset(&self, category: Category, name: &str) -> Result<(), SchedulerError> {
        let exists = self
            .inner
            .settings
            .read()
            .await
            .presets
            .get(category, name)
            .is_some();
        if !exists {
            return Err(SchedulerError::PresetNotFound {
                category,
                name: name.to_string(),
            });
        }
        self.configure(|s| {
            s.presets.remove(category, name);
        })
        .await?;
        info!(preset = name, category = %category, "Preset deleted");
        Ok(())
    }

    /// Copies a preset's settings into the given jobs.
    ///
    /// Only jobs whose input category matches the preset and that are not
    /// running are updated. Returns how many were.
    pub async fn apply_preset(
        &self,
        category: Category,
        name: &str,
        ids: &[JobId],
    ) -> Result<usize, SchedulerError> {
        let preset = self
            .inner
            .settings
            .read()
            .await
            .presets
            .get(category, name)
            .ok_or_else(|| SchedulerError::PresetNotFound {
                category,
                name: name.to_string(),
            })?;

        let mut table = self.inner.table.write().await;
        let mut applied = 0;
        for id in ids {
            let Some(slot) = table.jobs.get_mut(id) else {
                warn!(job_id = %id, "Preset target not found");
                continue;
            };
            if slot.record.kind != JobKind::Convert
                || slot.record.input_category != Some(category)
            {
                continue;
            }
            if slot.record.status == JobStatus::InProgress {
                debug!(job_id = %id, "Skipping running job for preset");
                continue;
            }
            slot.record.settings = preset.settings.clone();
            slot.publish();
            self.inner.notify(*id, JobChange::Edited);
            applied += 1;
        }
        debug!(preset = name, applied, "Preset applied");
        Ok(applied)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Explicit override, else next to the source, else the default output
    /// directory if it exists.
    async fn resolve_location(&self, location: Option<OutputLocation>) -> Option<OutputLocation> {
        if location.is_some() {
            return location;
        }
        let settings = self.inner.settings.read().await;
        if settings.save_to_source_dir {
            return Some(OutputLocation::NextToSource);
        }
        settings
            .default_output_dir
            .as_ref()
            .filter(|dir| dir.is_dir())
            .map(|dir| OutputLocation::Directory(dir.clone()))
    }

    fn start_locked(
        &self,
        table: &mut JobTable,
        id: JobId,
        location: Option<&OutputLocation>,
    ) -> Result<bool, SchedulerError> {
        let slot = table
            .jobs
            .get_mut(&id)
            .ok_or(SchedulerError::JobNotFound(id))?;
        if slot.record.status != JobStatus::Pending || table.running.contains_key(&id) {
            debug!(job_id = %id, status = %slot.record.status, "Start ignored");
            return Ok(false);
        }

        let request = build_request(&slot.record, location)?;
        let plan = request.plan;
        let executor = self.inner.factory.create(plan);

        slot.record.status = JobStatus::InProgress;
        slot.record.progress = 0;
        slot.record.error = None;
        slot.record.output_path = Some(request.output_path.clone());
        slot.record.started_at = Some(Utc::now());
        slot.record.finished_at = None;
        slot.publish();

        info!(
            job_id = %id,
            strategy = plan.label(),
            executor = executor.name(),
            output = %request.output_path.display(),
            "Job started"
        );
        let (handle, events) = Execution::new(executor, request).start();
        table.running.insert(id, handle);

        metrics::JOBS_STARTED.with_label_values(&[plan.label()]).inc();
        metrics::ACTIVE_JOBS.inc();
        self.inner.notify(id, JobChange::Started);

        tokio::spawn(drive(Arc::clone(&self.inner), id, plan, events));
        Ok(true)
    }

    fn cancel_locked(&self, table: &mut JobTable, id: JobId) {
        let Some(slot) = table.jobs.get_mut(&id) else {
            return;
        };
        match slot.record.status {
            JobStatus::Pending => {
                slot.record.status = JobStatus::Cancelled;
                slot.record.finished_at = Some(Utc::now());
                slot.publish();
                info!(job_id = %id, "Pending job cancelled");
                metrics::JOBS_FINISHED
                    .with_label_values(&[JobStatus::Cancelled.as_str()])
                    .inc();
                self.inner.notify(
                    id,
                    JobChange::Finished {
                        status: JobStatus::Cancelled,
                    },
                );
            }
            JobStatus::InProgress => {
                if let Some(handle) = table.running.get(&id) {
                    handle.cancel();
                }
            }
            status => debug!(job_id = %id, status = %status, "Cancel ignored"),
        }
    }
}

impl Inner {
    fn issue_id(&self) -> JobId {
        JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn notify(&self, id: JobId, change: JobChange) {
        // No subscribers is fine.
        let _ = self.updates.send(JobUpdate { id, change });
    }

    /// Applies a progress event, capped at 99 until completion.
    async fn record_progress(&self, id: JobId, percent: u8) {
        let percent = percent.min(99);
        let mut table = self.table.write().await;
        if let Some(slot) = table.jobs.get_mut(&id) {
            if slot.record.status == JobStatus::InProgress && percent > slot.record.progress {
                slot.record.progress = percent;
                slot.publish();
                self.notify(id, JobChange::Progress { percent });
            }
        }
    }

    /// Applies the terminal event and releases the job id.
    async fn finish(&self, id: JobId, plan: ExecutionPlan, event: ExecutorEvent, elapsed: Duration) {
        let clear_on_complete = self.settings.read().await.clear_list_on_complete;

        let mut table = self.table.write().await;
        if table.running.remove(&id).is_some() {
            metrics::ACTIVE_JOBS.dec();
        }
        let Some(slot) = table.jobs.get_mut(&id) else {
            warn!(job_id = %id, "Finished job no longer in the table");
            return;
        };

        let record = &mut slot.record;
        let status = match event {
            ExecutorEvent::Completed(path) => {
                if record.progress < 100 {
                    record.progress = 100;
                    self.notify(id, JobChange::Progress { percent: 100 });
                }
                info!(
                    job_id = %id,
                    path = %path.display(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job completed"
                );
                record.output_path = Some(path);
                JobStatus::Completed
            }
            ExecutorEvent::Failed { kind, message } => {
                warn!(job_id = %id, kind = %kind, error = %message, "Job failed");
                record.error = Some(message);
                JobStatus::Failed
            }
            ExecutorEvent::Cancelled => {
                info!(job_id = %id, "Job cancelled");
                JobStatus::Cancelled
            }
            ExecutorEvent::Progress(_) => {
                warn!(job_id = %id, "Execution ended without a result");
                record.error = Some("execution ended without a result".to_string());
                JobStatus::Failed
            }
        };
        record.status = status;
        record.finished_at = Some(Utc::now());
        slot.publish();
        self.notify(id, JobChange::Finished { status });

        metrics::JOBS_FINISHED
            .with_label_values(&[status.as_str()])
            .inc();
        metrics::JOB_DURATION
            .with_label_values(&[plan.label()])
            .observe(elapsed.as_secs_f64());

        if clear_on_complete && table.running.is_empty() {
            let finished: Vec<JobId> = table
                .jobs
                .values()
                .filter(|slot| slot.record.status.is_terminal())
                .map(|slot| slot.record.id)
                .collect();
            for id in &finished {
                if let Some(slot) = table.jobs.remove(id) {
                    table.cleared.insert(*id, slot.record);
                }
                self.notify(*id, JobChange::Removed);
            }
            while table.cleared.len() > CLEARED_RETAINED {
                table.cleared.pop_first();
            }
            info!(removed = finished.len(), "Cleared finished jobs");
        }
    }
}

/// Consumes one execution's events until its terminal event.
async fn drive(
    inner: Arc<Inner>,
    id: JobId,
    plan: ExecutionPlan,
    mut events: mpsc::UnboundedReceiver<ExecutorEvent>,
) {
    let started = Instant::now();
    let mut terminal = None;
    while let Some(event) = events.recv().await {
        match event {
            ExecutorEvent::Progress(percent) => inner.record_progress(id, percent).await,
            event => {
                terminal = Some(event);
                break;
            }
        }
    }
    let event = terminal.unwrap_or(ExecutorEvent::Failed {
        kind: ErrorKind::ExternalToolFailure,
        message: "execution ended without a result".to_string(),
    });
    inner.finish(id, plan, event, started.elapsed()).await;
}

fn ensure_not_running(record: &JobRecord, action: &'static str) -> Result<(), SchedulerError> {
    if record.status == JobStatus::InProgress {
        return Err(SchedulerError::InvalidState {
            id: record.id,
            status: record.status,
            action,
        });
    }
    Ok(())
}

/// Takes the private copy of everything the executor needs.
fn build_request(
    record: &JobRecord,
    location: Option<&OutputLocation>,
) -> Result<ExecutionRequest, SchedulerError> {
    let not_convertible = |reason: &str| SchedulerError::NotConvertible {
        id: record.id,
        reason: reason.to_string(),
    };

    match record.kind {
        JobKind::Merge(kind) => {
            let output_path = record
                .output_path
                .clone()
                .ok_or_else(|| not_convertible("merge has no output path"))?;
            Ok(ExecutionRequest {
                job_id: record.id,
                plan: ExecutionPlan::Merge(kind),
                inputs: record.source_paths.clone(),
                input_category: record.input_category,
                output_category: None,
                output_path,
                target_format: record
                    .target
                    .as_ref()
                    .map(|t| t.format.clone())
                    .unwrap_or_default(),
                settings: JobSettings::None,
            })
        }
        JobKind::Convert => {
            if record.input_category.is_none() {
                return Err(not_convertible("unrecognized file type"));
            }
            let target = record
                .target
                .as_ref()
                .ok_or_else(|| not_convertible("no target format"))?;
            let source = record
                .primary_source()
                .ok_or_else(|| not_convertible("no source path"))?;
            let location = location.ok_or(SchedulerError::NoOutputDirectory)?;

            let ext = record.input_extension().unwrap_or_default();
            let strategy =
                strategy::select(&ext, record.input_category, target.category, &target.format);
            Ok(ExecutionRequest {
                job_id: record.id,
                plan: ExecutionPlan::Convert(strategy),
                inputs: vec![source.to_path_buf()],
                input_category: record.input_category,
                output_category: Some(target.category),
                output_path: location.output_path(source, &target.format),
                target_format: target.format.clone(),
                settings: record.settings.clone(),
            })
        }
    }
}

/// A file, or every regular file under a directory in name order.
fn collect_files(path: &Path) -> Result<Vec<PathBuf>, SchedulerError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(SchedulerError::SourceNotFound(path.to_path_buf()));
    }
    let files = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;
    use crate::strategy::Strategy;
    use crate::testing::{fixtures, MockExecutor, MockExecutorFactory};
    use tempfile::TempDir;

    fn setup(executor: MockExecutor, out: &Path) -> (Scheduler, MockExecutorFactory) {
        let factory = MockExecutorFactory::new(executor);
        let scheduler = Scheduler::new(
            Arc::new(factory.clone()),
            Arc::new(MemorySettingsStore::default()),
            AppSettings::default().with_default_output_dir(out),
            &SchedulerConfig::default(),
        );
        (scheduler, factory)
    }

    #[tokio::test]
    async fn test_enqueue_directory_recursively() {
        let dir = TempDir::new().unwrap();
        fixtures::touch(dir.path(), "b.mp4");
        fixtures::touch(dir.path(), "a.png");
        fixtures::touch(dir.path(), "nested/c.flac");
        let (scheduler, _) = setup(MockExecutor::new(), dir.path());

        let ids = scheduler.enqueue(dir.path()).await.unwrap();
        assert_eq!(ids.len(), 3);
        let names: Vec<String> = scheduler
            .jobs()
            .await
            .iter()
            .map(|r| r.primary_source().unwrap().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.mp4", "c.flac"]);
    }

    #[tokio::test]
    async fn test_enqueue_missing_path() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _) = setup(MockExecutor::new(), dir.path());
        let err = scheduler.enqueue(dir.path().join("nope.png")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_start_selects_strategy_and_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let source = fixtures::touch(dir.path(), "photo.cr2");
        let (scheduler, factory) = setup(MockExecutor::new(), &out);

        let id = scheduler.enqueue(&source).await.unwrap()[0];
        scheduler.set_target(id, Category::Image, "jpg").await.unwrap();
        assert!(scheduler.start(id, None).await.unwrap());
        let record = scheduler.wait(id).await.unwrap();

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.output_path, Some(out.join("photo.jpg")));
        assert_eq!(
            factory.created_plans(),
            vec![ExecutionPlan::Convert(Strategy::RawImageDecode)]
        );
    }

    #[tokio::test]
    async fn test_unknown_extension_is_not_convertible() {
        let dir = TempDir::new().unwrap();
        let source = fixtures::touch(dir.path(), "notes.xyz");
        let (scheduler, factory) = setup(MockExecutor::new(), dir.path());

        let id = scheduler.enqueue(&source).await.unwrap()[0];
        let err = scheduler.start(id, None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NotConvertible { .. }));
        assert_eq!(scheduler.get(id).await.unwrap().status, JobStatus::Pending);
        assert!(factory.created_plans().is_empty());
    }

    #[tokio::test]
    async fn test_missing_output_directory() {
        let dir = TempDir::new().unwrap();
        let source = fixtures::touch(dir.path(), "a.png");
        let (scheduler, _) = setup(MockExecutor::new(), &dir.path().join("absent"));

        let id = scheduler.enqueue(&source).await.unwrap()[0];
        let err = scheduler.start(id, None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NoOutputDirectory));
        let err = scheduler.start_all(None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NoOutputDirectory));

        // An explicit location overrides the settings.
        assert!(scheduler
            .start(id, Some(OutputLocation::NextToSource))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_settings_rejected_while_running() {
        let dir = TempDir::new().unwrap();
        let source = fixtures::touch(dir.path(), "clip.mp4");
        let executor = MockExecutor::new().with_delay(Duration::from_secs(30));
        let (scheduler, _) = setup(executor, dir.path());

        let id = scheduler.enqueue(&source).await.unwrap()[0];
        scheduler.start(id, None).await.unwrap();
        let err = scheduler
            .update_settings(id, JobSettings::Video(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidState { .. }));

        scheduler.cancel(id).await.unwrap();
        assert_eq!(scheduler.wait(id).await.unwrap().status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_settings_category_must_match() {
        let dir = TempDir::new().unwrap();
        let source = fixtures::touch(dir.path(), "song.flac");
        let (scheduler, _) = setup(MockExecutor::new(), dir.path());
        let id = scheduler.enqueue(&source).await.unwrap()[0];

        let err = scheduler
            .update_settings(id, JobSettings::Image(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSettings(_)));

        let err = scheduler
            .update_settings(
                id,
                JobSettings::Image(crate::job::ImageSettings {
                    quality: 0,
                    ..Default::default()
                }),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quality"));
    }
}
