//! Prometheus metrics (spec.md §4.3, §7) exposed over HTTP the way
//! `examples/other_examples/manifests/kofj-nostr-rs-relay` pairs the
//! `prometheus` crate with a small HTTP exposition endpoint — here built on
//! `axum` instead of `hyper` directly, matching the rest of this crate's
//! async stack.

use crate::common::consts::CYCLE_DURATION_BUCKETS;
use crate::common::error::{self, Error};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Per-service cycle metrics (spec.md §4.3). One instance per running
/// service process; all label values are fixed at construction.
pub struct ServiceMetrics {
    pub cycle_duration_seconds: Histogram,
    pub cycles_success: IntCounter,
    pub cycles_failed: IntCounter,
    pub consecutive_failures: IntGauge,
    pub last_cycle_timestamp: IntGauge,
    pub up: IntGauge,
    registry: Registry,
}

impl ServiceMetrics {
    pub fn new(service: &str) -> error::Result<Self> {
        let registry = Registry::new();

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("cycle_duration_seconds", "Duration of one service cycle")
                .const_label("service", service)
                .buckets(CYCLE_DURATION_BUCKETS.to_vec()),
        )
        .map_err(|e| Error::CustomError(e.to_string()))?;

        let cycles_success = IntCounter::with_opts(
            Opts::new("cycles_success", "Cycles completed without error")
                .const_label("service", service),
        )
        .map_err(|e| Error::CustomError(e.to_string()))?;

        let cycles_failed = IntCounter::with_opts(
            Opts::new("cycles_failed", "Cycles that returned an error")
                .const_label("service", service),
        )
        .map_err(|e| Error::CustomError(e.to_string()))?;

        let consecutive_failures = IntGauge::with_opts(
            Opts::new("consecutive_failures", "Current run of failed cycles")
                .const_label("service", service),
        )
        .map_err(|e| Error::CustomError(e.to_string()))?;

        let last_cycle_timestamp = IntGauge::with_opts(
            Opts::new("last_cycle_timestamp", "Unix timestamp of the last completed cycle")
                .const_label("service", service),
        )
        .map_err(|e| Error::CustomError(e.to_string()))?;

        let up = IntGauge::with_opts(
            Opts::new("up", "1 while the service process is alive").const_label("service", service),
        )
        .map_err(|e| Error::CustomError(e.to_string()))?;
        up.set(1);

        registry
            .register(Box::new(cycle_duration_seconds.clone()))
            .map_err(|e| Error::CustomError(e.to_string()))?;
        registry
            .register(Box::new(cycles_success.clone()))
            .map_err(|e| Error::CustomError(e.to_string()))?;
        registry
            .register(Box::new(cycles_failed.clone()))
            .map_err(|e| Error::CustomError(e.to_string()))?;
        registry
            .register(Box::new(consecutive_failures.clone()))
            .map_err(|e| Error::CustomError(e.to_string()))?;
        registry
            .register(Box::new(last_cycle_timestamp.clone()))
            .map_err(|e| Error::CustomError(e.to_string()))?;
        registry
            .register(Box::new(up.clone()))
            .map_err(|e| Error::CustomError(e.to_string()))?;

        Ok(Self {
            cycle_duration_seconds,
            cycles_success,
            cycles_failed,
            consecutive_failures,
            last_cycle_timestamp,
            up,
            registry,
        })
    }

    fn render(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .expect("prometheus text encoding is infallible");
        String::from_utf8(buffer).expect("prometheus output is valid utf-8")
    }
}

async fn metrics_handler(State(metrics): State<Arc<ServiceMetrics>>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

/// Serves `/metrics` (spec.md §7's container health-check surface) until
/// `shutdown` signals. Also doubles as the liveness check: the listener
/// answering at all means the process is up.
pub async fn serve(
    metrics: Arc<ServiceMetrics>,
    host: &str,
    port: u16,
    path: &str,
    shutdown: crate::common::shutdown::Shutdown,
) -> error::Result<()> {
    let app = Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::IoError(e))?;

    tracing::info!(%addr, %path, "metrics endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let mut rx = shutdown.subscribe();
            let _ = rx.changed().await;
        })
        .await
        .map_err(|e| Error::IoError(e))?;

    Ok(())
}
