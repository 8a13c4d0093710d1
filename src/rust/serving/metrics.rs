//! Prometheus metrics for the prediction service.

use std::sync::Arc;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{extract::State, Router};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use tokio::net::TcpListener;
use tracing::info;

/// Counters and histograms shared by every request handler.
///
/// Clones share the same underlying collectors, so increments are visible
/// from any clone and safe from concurrent requests.
#[derive(Clone)]
pub struct ServingMetrics {
    registry: Arc<Registry>,
    /// Model invocations, successful or not.
    pub predictions_total: IntCounter,
    /// Model invocations that failed.
    pub prediction_errors_total: IntCounter,
    /// Wall-clock time spent inside the model call, in seconds.
    pub prediction_latency_seconds: Histogram,
    /// Requests rejected before reaching the model.
    pub data_validation_errors_total: IntCounter,
}

impl ServingMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let predictions_total =
            IntCounter::new("model_predictions_total", "Total number of predictions")?;
        let prediction_errors_total = IntCounter::new(
            "prediction_errors_total",
            "Total number of failed model invocations",
        )?;
        let prediction_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "prediction_latency_seconds",
                "Time spent processing prediction",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
            ]),
        )?;
        let data_validation_errors_total = IntCounter::new(
            "data_validation_errors_total",
            "Number of data validation errors",
        )?;

        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(prediction_errors_total.clone()))?;
        registry.register(Box::new(prediction_latency_seconds.clone()))?;
        registry.register(Box::new(data_validation_errors_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            prediction_errors_total,
            prediction_latency_seconds,
            data_validation_errors_total,
        })
    }

    /// Record one model invocation.
    pub fn record_prediction(&self, success: bool, duration_secs: f64) {
        self.predictions_total.inc();
        self.prediction_latency_seconds.observe(duration_secs);
        if !success {
            self.prediction_errors_total.inc();
        }
    }

    /// Get Prometheus text output.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Serves `GET /metrics` on its own listener, separate from the API port.
pub struct MetricsServer {
    metrics: ServingMetrics,
    addr: String,
}

impl MetricsServer {
    pub fn new(metrics: ServingMetrics, addr: impl Into<String>) -> Self {
        Self {
            metrics,
            addr: addr.into(),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .with_state(self.metrics.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("Metrics server listening on http://{}/metrics", self.addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn scrape(State(metrics): State<ServingMetrics>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics.gather(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_metrics_new() {
        let m = ServingMetrics::new().unwrap();
        m.data_validation_errors_total.inc();
        m.record_prediction(true, 0.002);
        let output = m.gather();
        assert!(output.contains("model_predictions_total"));
        assert!(output.contains("prediction_latency_seconds_bucket"));
        assert!(output.contains("data_validation_errors_total"));
    }

    #[test]
    fn test_record_prediction_failure() {
        let m = ServingMetrics::new().unwrap();
        m.record_prediction(true, 0.001);
        m.record_prediction(false, 0.004);
        assert_eq!(m.predictions_total.get(), 2);
        assert_eq!(m.prediction_errors_total.get(), 1);
        assert_eq!(m.prediction_latency_seconds.get_sample_count(), 2);
    }

    #[test]
    fn test_clone_shares_collectors() {
        let m1 = ServingMetrics::new().unwrap();
        let m2 = m1.clone();
        m2.record_prediction(true, 0.01);
        assert_eq!(m1.predictions_total.get(), 1);
    }

    #[test]
    fn test_concurrent_increments() {
        let m = ServingMetrics::new().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = m.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_prediction(true, 0.0001);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(m.predictions_total.get(), 800);
    }

    #[tokio::test]
    async fn test_scrape_endpoint() {
        let m = ServingMetrics::new().unwrap();
        m.record_prediction(true, 0.01);
        let server = MetricsServer::new(m, "127.0.0.1:0");

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("model_predictions_total 1"));
    }
}
