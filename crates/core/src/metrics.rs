//! Prometheus metrics for the post-processing pipeline.
//!
//! This module provides metrics for:
//! - Producer inputs and queue depths
//! - Encoder sessions and jobs
//! - Reprocess submissions
//! - Tag assembly failures

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

// =============================================================================
// Inputs
// =============================================================================

/// Captured frames handed to the pipeline.
pub static FRAMES_RECEIVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("campost_frames_received_total", "Total captured frames received")
        .expect("valid metric definition")
});

/// Items waiting in each job queue.
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("campost_queue_depth", "Items waiting in each job queue"),
        &["queue"], // "frames", "metadata", "framework", "settings", "encode"
    )
    .expect("valid metric definition")
});

// =============================================================================
// Encoder
// =============================================================================

/// Encode jobs completed by the hardware encoder, by status.
pub static JOBS_ENCODED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("campost_jobs_encoded_total", "Total encode jobs completed"),
        &["status"], // "done", "failed"
    )
    .expect("valid metric definition")
});

/// Requests dropped with their resources released, by reason.
pub static JOBS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("campost_jobs_dropped_total", "Total capture requests dropped"),
        &["reason"],
    )
    .expect("valid metric definition")
});

/// In-flight encoder jobs aborted by stop or flush.
pub static JOBS_ABORTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("campost_jobs_aborted_total", "Total in-flight encode jobs aborted")
        .expect("valid metric definition")
});

/// Encoder sessions created.
pub static SESSIONS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("campost_sessions_created_total", "Total encoder sessions created")
        .expect("valid metric definition")
});

// =============================================================================
// Reprocess
// =============================================================================

/// Reprocess submissions by result.
pub static REPROCESS_SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "campost_reprocess_submissions_total",
            "Total frames submitted for reprocessing",
        ),
        &["result"], // "accepted", "rejected"
    )
    .expect("valid metric definition")
});

// =============================================================================
// Tags
// =============================================================================

/// Tag entries that could not be computed or stored.
pub static TAG_ENTRIES_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("campost_tag_entries_failed_total", "Total tag entries skipped"),
        &["field"],
    )
    .expect("valid metric definition")
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FRAMES_RECEIVED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(JOBS_ENCODED.clone()),
        Box::new(JOBS_DROPPED.clone()),
        Box::new(JOBS_ABORTED.clone()),
        Box::new(SESSIONS_CREATED.clone()),
        Box::new(REPROCESS_SUBMISSIONS.clone()),
        Box::new(TAG_ENTRIES_FAILED.clone()),
    ]
}

/// Registers every pipeline metric in `registry`.
pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_metrics() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();

        FRAMES_RECEIVED.inc();
        JOBS_DROPPED.with_label_values(&["test"]).inc();
        QUEUE_DEPTH.with_label_values(&["frames"]).set(0);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"campost_frames_received_total".to_string()));
        assert!(names.contains(&"campost_jobs_dropped_total".to_string()));
        assert!(names.contains(&"campost_queue_depth".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        assert!(register_metrics(&registry).is_err());
    }
}
