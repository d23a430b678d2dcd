//! Prometheus metrics for the dashboard.
//!
//! Provides a [`Metrics`] struct holding the prediction counters and
//! latency histogram, and a handler that renders them in Prometheus
//! exposition text format at `/metrics`.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Response, StatusCode};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::api::AppState;

/// Holds all Prometheus metric collectors for the dashboard.
#[derive(Clone)]
pub struct Metrics {
    /// Private registry so tests are deterministic.
    registry: Registry,

    /// Predictions served, labelled by outcome (leave|stay) and category.
    pub predictions_total: IntCounterVec,

    /// End-to-end pipeline latency in seconds.
    pub prediction_duration_seconds: Histogram,

    /// Rejected or failed predictions, labelled by error kind.
    pub prediction_errors_total: IntCounterVec,
}

impl Metrics {
    /// Create a new `Metrics` instance with all collectors registered.
    ///
    /// # Panics
    ///
    /// Panics if any metric fails to register. This only happens on a
    /// programming error (duplicate or malformed metric names).
    pub fn new() -> Self {
        let registry = Registry::new();

        let predictions_total = IntCounterVec::new(
            Opts::new("attrition_predictions_total", "Total predictions served"),
            &["outcome", "category"],
        )
        .expect("metric: predictions_total");
        registry
            .register(Box::new(predictions_total.clone()))
            .expect("register predictions_total");

        let prediction_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "attrition_prediction_duration_seconds",
                "Prediction pipeline duration in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]),
        )
        .expect("metric: prediction_duration_seconds");
        registry
            .register(Box::new(prediction_duration_seconds.clone()))
            .expect("register prediction_duration_seconds");

        let prediction_errors_total = IntCounterVec::new(
            Opts::new(
                "attrition_prediction_errors_total",
                "Total rejected or failed predictions",
            ),
            &["kind"],
        )
        .expect("metric: prediction_errors_total");
        registry
            .register(Box::new(prediction_errors_total.clone()))
            .expect("register prediction_errors_total");

        Self {
            registry,
            predictions_total,
            prediction_duration_seconds,
            prediction_errors_total,
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn gather_text(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| e.to_string())?;
        String::from_utf8(buffer).map_err(|e| e.to_string())
    }

    /// Record a served prediction.
    pub fn record_prediction(&self, will_leave: bool, category: &str, duration_secs: f64) {
        let outcome = if will_leave { "leave" } else { "stay" };
        self.predictions_total
            .with_label_values(&[outcome, category])
            .inc();
        self.prediction_duration_seconds.observe(duration_secs);
    }

    /// Record a rejected or failed prediction.
    pub fn record_error(&self, kind: &str) {
        self.prediction_errors_total.with_label_values(&[kind]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Axum handler that returns Prometheus-format metrics.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response<Body> {
    let (status, content_type, body) = match state.metrics.gather_text() {
        Ok(text) => (
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            text,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            format!("Failed to gather metrics: {e}"),
        ),
    };
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Ok(value) = content_type.parse() {
        response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, value);
    }
    response
}
