//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scheduler (enqueued, started and finished jobs, job duration)
//! - External tools (invocations and run time)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Jobs added to the queue.
pub static JOBS_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("convoy_jobs_enqueued_total", "Total jobs added to the queue").unwrap()
});

/// Jobs started by strategy.
pub static JOBS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convoy_jobs_started_total", "Total jobs started"),
        &["strategy"],
    )
    .unwrap()
});

/// Jobs finished by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convoy_jobs_finished_total", "Total jobs that reached a terminal state"),
        &["outcome"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Job run time in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("convoy_job_duration_seconds", "Duration of job execution")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["strategy"],
    )
    .unwrap()
});

/// Jobs currently in progress.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("convoy_active_jobs", "Number of jobs currently in progress").unwrap()
});

// =============================================================================
// External Tool Metrics
// =============================================================================

/// External tool invocations by tool and result.
pub static TOOL_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convoy_tool_invocations_total",
            "Total external tool invocations",
        ),
        &["tool", "result"], // result: "success", "failed", "timeout", "cancelled"
    )
    .unwrap()
});

/// External tool run time in seconds.
pub static TOOL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convoy_tool_duration_seconds",
            "Duration of external tool runs",
        )
        .buckets(vec![0.05, 0.25, 1.0, 5.0, 30.0, 120.0, 600.0, 1800.0]),
        &["tool"],
    )
    .unwrap()
});

/// Returns all metrics for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(JOBS_ENQUEUED.clone()),
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(ACTIVE_JOBS.clone()),
        // External tools
        Box::new(TOOL_INVOCATIONS.clone()),
        Box::new(TOOL_DURATION.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        JOBS_FINISHED.with_label_values(&["completed"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"convoy_jobs_finished_total".to_string()));
    }
}
