// Prometheus metrics for the HTTP surface

use codebench_common::types::ExecutionResult;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge, Encoder,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    pub static ref EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "codebench_executions_total",
        "Executions by final path and outcome",
        &["path", "outcome"]
    )
    .unwrap();
    pub static ref FAILOVERS_TOTAL: IntCounter = register_int_counter!(
        "codebench_failovers_total",
        "Requests that needed the secondary path"
    )
    .unwrap();
    pub static ref EXECUTION_DURATION: HistogramVec = register_histogram_vec!(
        "codebench_execution_duration_seconds",
        "Program run time by language",
        &["language"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();
    pub static ref IN_FLIGHT: IntGauge =
        register_int_gauge!("codebench_executions_in_flight", "Executions currently running").unwrap();
    pub static ref JOBS_ENQUEUED: IntCounter =
        register_int_counter!("codebench_jobs_enqueued_total", "Jobs pushed to the queue").unwrap();
}

pub fn observe(result: &ExecutionResult) {
    let path = result.path.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string());
    let outcome = match (result.success, result.error_kind) {
        (true, _) => "success".to_string(),
        (false, Some(kind)) => kind.to_string(),
        (false, None) => "failure".to_string(),
    };
    EXECUTIONS_TOTAL.with_label_values(&[&path, &outcome]).inc();
    if result.attempts.len() > 1 {
        FAILOVERS_TOTAL.inc();
    }
    if result.success {
        EXECUTION_DURATION
            .with_label_values(&[&result.language])
            .observe(result.execution_time);
    }
}

/// Text exposition of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Holds a gauge up for as long as it lives. Dropping it, including when
/// the request future is cancelled mid-run, brings the gauge back down.
pub struct GaugeGuard(IntGauge);

impl GaugeGuard {
    pub fn inc(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_guard_releases_on_drop() {
        let gauge = IntGauge::new("guard_scope", "test gauge").unwrap();
        {
            let _held = GaugeGuard::inc(&gauge);
            let _again = GaugeGuard::inc(&gauge);
            assert_eq!(gauge.get(), 2);
        }
        assert_eq!(gauge.get(), 0);
    }

    #[tokio::test]
    async fn test_guard_releases_when_request_is_cancelled() {
        let gauge = IntGauge::new("guard_cancel", "test gauge").unwrap();
        let work = {
            let gauge = gauge.clone();
            async move {
                let _in_flight = GaugeGuard::inc(&gauge);
                std::future::pending::<()>().await;
            }
        };

        let outcome = tokio::time::timeout(Duration::from_millis(10), work).await;
        assert!(outcome.is_err());
        assert_eq!(gauge.get(), 0);
    }
}
