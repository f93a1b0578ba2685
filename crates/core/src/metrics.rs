//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion pipeline (runs, step durations, persisted transactions)
//! - Job queue (enqueued, completed, retried, failed jobs)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs total by result.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledgerline_pipeline_runs_total", "Total ingestion pipeline runs"),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Step duration in seconds.
pub static PIPELINE_STEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ledgerline_pipeline_step_duration_seconds",
            "Duration of individual pipeline steps",
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 300.0]),
        &["step"],
    )
    .unwrap()
});

/// Transactions persisted total.
pub static TRANSACTIONS_PERSISTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ledgerline_transactions_persisted_total",
        "Total transactions persisted",
    )
    .unwrap()
});

// =============================================================================
// Job Queue Metrics
// =============================================================================

/// Jobs by lifecycle event.
pub static JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledgerline_jobs_total", "Parse jobs by lifecycle event"),
        &["result"], // "enqueued", "completed", "retried", "failed"
    )
    .unwrap()
});

/// Jobs currently being processed by workers.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ledgerline_jobs_in_flight", "Parse jobs currently running").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(PIPELINE_STEP_DURATION.clone()),
        Box::new(TRANSACTIONS_PERSISTED.clone()),
        // Queue
        Box::new(JOBS.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
    ]
}
