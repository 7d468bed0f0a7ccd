//! Prometheus metrics for transcode sessions.
//!
//! This module provides metrics for:
//! - Sessions (started, finished by result, duration)
//! - Parsing (phase closes by trigger, progress events, parse errors)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Session Metrics
// =============================================================================

/// Transcode sessions started.
pub static SESSIONS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transcoder_sessions_started_total",
        "Total transcode sessions started",
    )
    .unwrap()
});

/// Transcode sessions finished by result.
pub static SESSIONS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transcoder_sessions_finished_total",
            "Total transcode sessions finished",
        ),
        &["result"], // "success", "failed", "timeout"
    )
    .unwrap()
});

/// Wall-clock duration of a transcode session in seconds.
pub static SESSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transcoder_session_duration_seconds",
            "Duration of a transcode session",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Parser Metrics
// =============================================================================

/// Metadata phase closes by trigger.
pub static PHASE_CLOSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transcoder_metadata_phase_closed_total",
            "Metadata phase transitions by trigger",
        ),
        &["trigger"], // "stream_mapping", "process_exit", "progress"
    )
    .unwrap()
});

/// Progress snapshots emitted.
pub static PROGRESS_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transcoder_progress_events_total",
        "Total progress snapshots emitted",
    )
    .unwrap()
});

/// Diagnostic lines that failed classification.
pub static PARSE_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transcoder_parse_errors_total",
        "Total diagnostic lines that failed classification",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Sessions
        Box::new(SESSIONS_STARTED.clone()),
        Box::new(SESSIONS_FINISHED.clone()),
        Box::new(SESSION_DURATION.clone()),
        // Parser
        Box::new(PHASE_CLOSED.clone()),
        Box::new(PROGRESS_EVENTS.clone()),
        Box::new(PARSE_ERRORS.clone()),
    ]
}
