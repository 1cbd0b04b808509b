// HTTP route handlers for the codebench API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use codebench_common::history::ExecutionStatistics;
use codebench_common::redis;
use codebench_common::types::{BenchmarkCategory, ExecutionJob, ExecutionRequest, JobState, Language};
use codebench_engine::SuiteRequest;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

/// Executions considered by `/stats/executions`
const STATS_WINDOW: usize = 1000;

/// Upper bound on programs in one `/benchmarks/suite` call
const MAX_SUITE_CASES: usize = 50;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// 400 with the valid ids when the language is not one we run
fn validate_language(request: &ExecutionRequest) -> Result<Language, Response> {
    Language::parse(&request.language).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("Unsupported language: {}", request.language),
                "supported": Language::valid_ids(),
            })),
        )
            .into_response()
    })
}

async fn acquire(state: &AppState) -> Result<OwnedSemaphorePermit, Response> {
    state
        .limiter
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| error_response(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down"))
}

/// POST /execute - Run code and return the result
pub async fn execute(State(state): State<Arc<AppState>>, Json(request): Json<ExecutionRequest>) -> Response {
    if let Err(rejection) = validate_language(&request) {
        return rejection;
    }
    let _permit = match acquire(&state).await {
        Ok(permit) => permit,
        Err(rejection) => return rejection,
    };

    let _in_flight = metrics::GaugeGuard::inc(&metrics::IN_FLIGHT);
    let result = state.bench.execute(&request).await;
    metrics::observe(&result);

    (StatusCode::OK, Json(result)).into_response()
}

/// POST /analyze - Run code and return result, benchmark and suggestions
pub async fn analyze(State(state): State<Arc<AppState>>, Json(request): Json<ExecutionRequest>) -> Response {
    if let Err(rejection) = validate_language(&request) {
        return rejection;
    }
    let _permit = match acquire(&state).await {
        Ok(permit) => permit,
        Err(rejection) => return rejection,
    };

    let _in_flight = metrics::GaugeGuard::inc(&metrics::IN_FLIGHT);
    let report = state.bench.execute_with_analysis(&request).await;
    metrics::observe(&report.execution);

    (StatusCode::OK, Json(report)).into_response()
}

/// POST /benchmarks/suite - Run several programs and summarize their scores
pub async fn run_suite(State(state): State<Arc<AppState>>, Json(suite): Json<SuiteRequest>) -> Response {
    if Language::parse(&suite.language).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("Unsupported language: {}", suite.language),
                "supported": Language::valid_ids(),
            })),
        )
            .into_response();
    }
    if suite.cases.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "A suite needs at least one case");
    }
    if suite.cases.len() > MAX_SUITE_CASES {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("A suite takes at most {} cases", MAX_SUITE_CASES),
        );
    }
    // Cases run one at a time, so the suite holds a single permit
    let _permit = match acquire(&state).await {
        Ok(permit) => permit,
        Err(rejection) => return rejection,
    };

    let _in_flight = metrics::GaugeGuard::inc(&metrics::IN_FLIGHT);
    let summary = state.bench.run_suite(&suite).await;
    for case in &summary.results {
        metrics::observe(&case.report.execution);
    }

    (StatusCode::OK, Json(summary)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct JobSubmission {
    #[serde(flatten)]
    pub request: ExecutionRequest,
    #[serde(default)]
    pub analyze: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// POST /jobs - Queue code for a worker
pub async fn submit_job(State(state): State<Arc<AppState>>, Json(payload): Json<JobSubmission>) -> Response {
    if let Err(rejection) = validate_language(&payload.request) {
        return rejection;
    }
    let Some(redis_conn) = &state.redis else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Job queue is not available");
    };

    let job = ExecutionJob::new(payload.request, payload.analyze);
    let mut conn = redis_conn.clone();
    match redis::push_job(&mut conn, &job).await {
        Ok(()) => {
            metrics::JOBS_ENQUEUED.inc();
            info!(
                job_id = %job.id,
                language = %job.request.language,
                analyze = job.analyze,
                source_size = job.request.source.len(),
                "Job queued"
            );
            (StatusCode::CREATED, Json(SubmitResponse { job_id: job.id.to_string() })).into_response()
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Failed to queue job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to queue job: {}", e))
        }
    }
}

/// GET /jobs/{job_id} - Result, pending marker or 404
pub async fn get_job_result(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Response {
    let job_uuid = match Uuid::parse_str(&job_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid job ID format"),
    };
    let Some(redis_conn) = &state.redis else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Job queue is not available");
    };

    let mut conn = redis_conn.clone();
    match redis::get_result::<serde_json::Value>(&mut conn, &job_uuid).await {
        Ok(Some(result)) => return (StatusCode::OK, Json(result)).into_response(),
        Ok(None) => {}
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to fetch job result");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to query job: {}", e));
        }
    }

    match redis::get_status(&mut conn, &job_uuid).await {
        Ok(Some(JobState::Failed)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Job failed without a stored result: {}", job_id),
        ),
        Ok(Some(status)) if status != JobState::Completed => (
            StatusCode::ACCEPTED,
            Json(json!({
                "job_id": job_id,
                "status": status,
                "message": "Job is queued or still executing"
            })),
        )
            .into_response(),
        Ok(_) => error_response(StatusCode::NOT_FOUND, format!("Unknown job: {}", job_id)),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to fetch job status");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to query job: {}", e))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LanguageInfo {
    pub id: Language,
    pub display_name: String,
    pub file_extension: String,
    pub compiled: bool,
    pub timeout_secs: u64,
    pub memory_limit_mb: u64,
    pub installed: bool,
    pub remote: bool,
}

/// GET /languages
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Response {
    let remote = state.bench.has_remote();
    let languages: Vec<LanguageInfo> = state
        .bench
        .registry()
        .configs()
        .map(|config| LanguageInfo {
            id: config.language,
            display_name: config.display_name.clone(),
            file_extension: config.file_extension.clone(),
            compiled: config.compile_command.is_some(),
            timeout_secs: config.timeout_secs,
            memory_limit_mb: config.memory_limit_mb,
            installed: config.is_installed(),
            remote: remote && config.judge0_id.is_some(),
        })
        .collect();
    (StatusCode::OK, Json(languages)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct BenchmarkFilter {
    pub language: Option<String>,
    pub category: Option<String>,
}

/// GET /stats/benchmarks?language=&category=
pub async fn benchmark_stats(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BenchmarkFilter>,
) -> Response {
    let language = match filter.language.as_deref().map(str::parse::<Language>).transpose() {
        Ok(language) => language,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let category = match filter.category.as_deref().map(str::parse::<BenchmarkCategory>).transpose() {
        Ok(category) => category,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.bench.performance().statistics(language, category) {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No benchmarks match the filter"),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ComparisonQuery {
    /// Comma-separated ids; all languages when absent
    pub languages: Option<String>,
}

/// GET /stats/languages?languages=python,java
pub async fn language_comparison(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ComparisonQuery>,
) -> Response {
    let languages = match query
        .languages
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::parse::<Language>)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(languages) => languages,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let comparison = state.bench.performance().compare_languages(&languages);
    if comparison.total_languages_analyzed == 0 {
        return error_response(StatusCode::NOT_FOUND, "No benchmarks recorded for these languages");
    }
    (StatusCode::OK, Json(comparison)).into_response()
}

/// GET /stats/executions
pub async fn execution_stats(State(state): State<Arc<AppState>>) -> Response {
    let records = state.bench.history().recent(STATS_WINDOW);
    (StatusCode::OK, Json(ExecutionStatistics::from_records(&records))).into_response()
}

/// GET /status - Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let installed: Vec<Language> = state
        .bench
        .registry()
        .configs()
        .filter(|c| c.is_installed())
        .map(|c| c.language)
        .collect();
    let body = json!({
        "status": "ok",
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "remote_enabled": state.bench.has_remote(),
        "queue_enabled": state.redis.is_some(),
        "installed_languages": installed,
        "available_permits": state.limiter.available_permits(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /metrics - Prometheus text format
pub async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to encode metrics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}
