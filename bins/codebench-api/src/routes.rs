use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/analyze", post(handlers::analyze))
        .route("/benchmarks/suite", post(handlers::run_suite))
        .route("/jobs", post(handlers::submit_job))
        .route("/jobs/:job_id", get(handlers::get_job_result))
        .route("/languages", get(handlers::list_languages))
        .route("/stats/benchmarks", get(handlers::benchmark_stats))
        .route("/stats/executions", get(handlers::execution_stats))
        .route("/stats/languages", get(handlers::language_comparison))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
}
