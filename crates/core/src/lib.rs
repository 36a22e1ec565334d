pub mod catalog;
pub mod config;
pub mod converter;
pub mod job;
pub mod merge;
pub mod metrics;
pub mod scheduler;
pub mod settings;
pub mod strategy;
pub mod testing;

pub use catalog::{Category, TargetGroup};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SchedulerConfig,
    SettingsConfig,
};
pub use converter::{
    ConverterError, DependencyStatus, ErrorKind, Execution, ExecutionHandle, ExecutionPlan,
    ExecutionRequest, Executor, ExecutorEvent, ExecutorFactory, Tool, ToolExecutorFactory,
    ToolsConfig,
};
pub use job::{
    ConversionTarget, JobId, JobKind, JobRecord, JobSettings, JobStatus, Preset, Presets,
};
pub use merge::{MergeError, MergeKind};
pub use scheduler::{
    JobChange, JobUpdate, JobWatcher, OutputLocation, Scheduler, SchedulerError, SchedulerStatus,
};
pub use settings::{AppSettings, JsonSettingsStore, MemorySettingsStore, SettingsStore};
pub use strategy::Strategy;
