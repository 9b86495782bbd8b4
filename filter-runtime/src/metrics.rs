//! Prometheus metrics for filter evaluation

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

use crate::error::FaultKind;

// ── Evaluation metrics ───────────────────────────────────────────────────────

pub static EVALUATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sluice_filter_evaluations_total",
        "Filter evaluations by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static FAULTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sluice_filter_faults_total",
        "Faults absorbed during filter evaluation",
        &["kind"]
    )
    .unwrap()
});

pub static EVAL_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "sluice_filter_evaluation_duration_seconds",
        "Filter evaluation latency",
        vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 1.0]
    )
    .unwrap()
});

// ── Runtime metrics ──────────────────────────────────────────────────────────

pub static COMPILATIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sluice_filter_compilations_total",
        "Filter sources compiled (cache misses)"
    )
    .unwrap()
});

pub static RUNTIMES_CREATED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sluice_script_runtimes_created_total",
        "Script runtimes created, including recreations"
    )
    .unwrap()
});

pub fn record_fault(kind: FaultKind) {
    FAULTS_TOTAL.with_label_values(&[kind.as_str()]).inc();
}

pub fn record_outcome(outcome: Result<bool, FaultKind>) {
    let label = match outcome {
        Ok(true) => "allow",
        Ok(false) => "deny",
        Err(_) => "fault",
    };
    EVALUATIONS_TOTAL.with_label_values(&[label]).inc();
}

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
