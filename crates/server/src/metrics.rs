//! Prometheus metrics for the gallery server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry aggregate counts only (no record ids, URLs or identities),
//! but the endpoint should still be network-restricted to the scraper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upload metrics
pub static IMAGES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gallery_images_uploaded_total",
        "Total number of images accepted by the upload pipeline",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gallery_bytes_uploaded_total",
        "Total bytes stored by the upload pipeline",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gallery_upload_rejections_total",
            "Total rejected uploads by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

// Reconciliation metrics
pub static RECONCILE_RUNS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gallery_reconcile_runs_total",
            "Total reconciliation passes by operation",
        ),
        &["operation"],
    )
    .expect("metric creation failed")
});

pub static RECONCILE_ITEMS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gallery_reconcile_items_total",
            "Records visited by reconciliation, by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so integration tests can build several routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(IMAGES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RECONCILE_RUNS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RECONCILE_ITEMS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a rejected upload.
pub fn record_upload_rejection(reason: &str) {
    UPLOAD_REJECTIONS.with_label_values(&[reason]).inc();
}

/// Record a completed reconciliation pass and its per-record outcomes.
pub fn record_reconcile(operation: &str, outcomes: &[(&str, usize)]) {
    RECONCILE_RUNS.with_label_values(&[operation]).inc();
    for &(outcome, count) in outcomes {
        RECONCILE_ITEMS
            .with_label_values(&[operation, outcome])
            .inc_by(count as u64);
    }
}
