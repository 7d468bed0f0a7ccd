//! Prometheus metrics for the command-line runner.
//!
//! Exposes the core session and parser metrics plus counts of the events
//! written by this process, encoded in the Prometheus text format.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use transcoder_core::TranscodeEvent;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Events written to the event stream, by event type.
pub static EVENTS_WRITTEN: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transcoder_cli_events_written_total",
            "Total events written by the command-line runner",
        ),
        &["type"], // "metadata", "progress", "parse_error", "finished", "failed"
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(EVENTS_WRITTEN.clone())).unwrap();

    // Core metrics (sessions, parser)
    for metric in transcoder_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Counts one written event.
pub fn record_event(event: &TranscodeEvent) {
    let kind = match event {
        TranscodeEvent::Metadata(_) => "metadata",
        TranscodeEvent::Progress(_) => "progress",
        TranscodeEvent::ParseError { .. } => "parse_error",
        TranscodeEvent::Finished => "finished",
        TranscodeEvent::Failed { .. } => "failed",
    };
    EVENTS_WRITTEN.with_label_values(&[kind]).inc();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        record_event(&TranscodeEvent::Finished);

        let output = encode_metrics().unwrap();
        assert!(output.contains("transcoder_cli_events_written_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs metrics that have been accessed
        transcoder_core::metrics::SESSIONS_STARTED.inc();
        transcoder_core::metrics::PROGRESS_EVENTS.inc();
        transcoder_core::metrics::PARSE_ERRORS.inc();
        transcoder_core::metrics::SESSIONS_FINISHED
            .with_label_values(&["success"])
            .inc();

        let output = encode_metrics().unwrap();
        assert!(output.contains("transcoder_sessions_started_total"));
        assert!(output.contains("transcoder_sessions_finished_total"));
        assert!(output.contains("transcoder_progress_events_total"));
        assert!(output.contains("transcoder_parse_errors_total"));
    }
}
