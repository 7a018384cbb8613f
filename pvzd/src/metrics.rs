//! Prometheus metrics.
//!
//! All collectors live in a registry owned by [`Metrics`]; nothing is
//! registered globally, so tests can build as many instances as they like.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::{PvzError, PvzResult};

/// Service metrics.
pub struct Metrics {
    registry: Registry,
    /// Requests by method, matched route and status code
    pub http_requests_total: IntCounterVec,
    /// Request latency by method and matched route
    pub http_request_duration_seconds: HistogramVec,
    /// Pickup points created
    pub pvz_created_total: IntCounter,
    /// Receptions opened
    pub reception_created_total: IntCounter,
    /// Products appended
    pub products_added_total: IntCounter,
}

impl Metrics {
    /// Create and register all collectors in a fresh registry.
    pub fn new() -> PvzResult<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .map_err(metrics_error)?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
            ),
            &["method", "endpoint"],
        )
        .map_err(metrics_error)?;

        let pvz_created_total =
            IntCounter::new("pvz_created_total", "Total number of created pickup points")
                .map_err(metrics_error)?;
        let reception_created_total =
            IntCounter::new("reception_created_total", "Total number of opened receptions")
                .map_err(metrics_error)?;
        let products_added_total =
            IntCounter::new("products_added_total", "Total number of added products")
                .map_err(metrics_error)?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(pvz_created_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(reception_created_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(products_added_total.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            pvz_created_total,
            reception_created_total,
            products_added_total,
        })
    }

    /// Record one finished HTTP request
    pub fn observe_request(&self, method: &str, endpoint: &str, status: u16, seconds: f64) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(seconds);
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> PvzResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;

        String::from_utf8(buffer).map_err(|e| PvzError::Internal(e.to_string()))
    }
}

fn metrics_error(err: prometheus::Error) -> PvzError {
    PvzError::Internal(format!("metrics: {}", err))
}
