//! Prometheus metrics for the Silo server.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it;
//! restrict it to scraper IPs at the infrastructure level when enabled.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static SESSIONS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_upload_sessions_created_total",
        "Total number of upload sessions created",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_upload_sessions_completed_total",
        "Total number of upload sessions successfully completed",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_EXPIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_upload_sessions_expired_total",
        "Total number of upload sessions failed by the expiry sweep",
    )
    .expect("metric creation failed")
});

pub static CHUNKS_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("silo_chunks_stored_total", "Total number of chunks stored")
        .expect("metric creation failed")
});

pub static CHUNKS_DEDUPLICATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_chunks_deduplicated_total",
        "Total number of chunk uploads answered from an existing reservation",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "silo_bytes_uploaded_total",
        "Total bytes uploaded (newly stored chunks only)",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("silo_upload_errors_total", "Total errors by error code"),
        &["code"],
    )
    .expect("metric creation failed")
});

pub static CHUNK_UPLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "silo_chunk_upload_duration_seconds",
            "Time taken to store a single chunk",
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("metric creation failed")
});

pub static ASSEMBLE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "silo_assemble_duration_seconds",
            "Time taken to complete an upload session",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(SESSIONS_CREATED.clone()),
            Box::new(SESSIONS_COMPLETED.clone()),
            Box::new(SESSIONS_EXPIRED.clone()),
            Box::new(CHUNKS_STORED.clone()),
            Box::new(CHUNKS_DEDUPLICATED.clone()),
            Box::new(BYTES_UPLOADED.clone()),
            Box::new(UPLOAD_ERRORS.clone()),
            Box::new(CHUNK_UPLOAD_DURATION.clone()),
            Box::new(ASSEMBLE_DURATION.clone()),
        ];
        for metric in metrics {
            if let Err(err) = REGISTRY.register(metric) {
                tracing::warn!(error = %err, "failed to register metric");
            }
        }
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
