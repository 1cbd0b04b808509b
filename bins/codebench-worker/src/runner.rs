// Runs one queued job and persists its outcome

use codebench_common::redis;
use codebench_common::types::{ExecutionJob, JobState};
use codebench_engine::CodeBench;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Result payload stored for a job: an `AnalysisReport` when analysis
/// was requested, otherwise the bare `ExecutionResult`
pub async fn run_job(bench: &CodeBench, job: &ExecutionJob) -> anyhow::Result<serde_json::Value> {
    let payload = if job.analyze {
        let report = bench.execute_with_analysis(&job.request).await;
        info!(
            job_id = %job.id,
            success = report.execution.success,
            complexity = %report.complexity,
            score = report.execution.performance_score,
            "Analysis completed"
        );
        serde_json::to_value(report)?
    } else {
        let result = bench.execute(&job.request).await;
        info!(
            job_id = %job.id,
            success = result.success,
            path = ?result.path,
            score = result.performance_score,
            "Execution completed"
        );
        serde_json::to_value(result)?
    };
    Ok(payload)
}

/// Where a job's status and result are written
#[async_trait]
pub trait JobSink: Send {
    async fn mark(&mut self, job_id: &Uuid, state: JobState) -> anyhow::Result<()>;

    /// Store the result payload and mark the job completed
    async fn store(&mut self, job_id: &Uuid, payload: &serde_json::Value) -> anyhow::Result<()>;
}

#[async_trait]
impl JobSink for ConnectionManager {
    async fn mark(&mut self, job_id: &Uuid, state: JobState) -> anyhow::Result<()> {
        redis::set_status(self, job_id, state).await?;
        Ok(())
    }

    async fn store(&mut self, job_id: &Uuid, payload: &serde_json::Value) -> anyhow::Result<()> {
        redis::store_result(self, job_id, payload).await?;
        Ok(())
    }
}

fn failure_payload(job_id: &Uuid, error: &anyhow::Error) -> serde_json::Value {
    json!({
        "job_id": job_id.to_string(),
        "status": JobState::Failed,
        "error": error.to_string(),
    })
}

/// Leave a failed job in a terminal state: an error payload when it can be
/// stored, and the `failed` status either way
async fn fail_job<S: JobSink>(sink: &mut S, job_id: &Uuid, cause: &anyhow::Error) {
    if let Err(e) = sink.store(job_id, &failure_payload(job_id, cause)).await {
        error!(error = %e, "Failed to persist failure payload");
    }
    if let Err(e) = sink.mark(job_id, JobState::Failed).await {
        error!(error = %e, "Failed to mark job failed");
    }
}

#[instrument(skip(sink, bench, job), fields(job_id = %job.id, language = %job.request.language))]
pub async fn handle_job<S: JobSink>(sink: &mut S, bench: &CodeBench, job: ExecutionJob) {
    let start = Instant::now();
    if let Err(e) = sink.mark(&job.id, JobState::Running).await {
        error!(error = %e, "Failed to mark job running");
    }

    let payload = match run_job(bench, &job).await {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Failed to encode job result");
            fail_job(sink, &job.id, &e).await;
            return;
        }
    };

    match sink.store(&job.id, &payload).await {
        Ok(()) => info!(execution_ms = start.elapsed().as_millis() as u64, "Result persisted to Redis"),
        Err(e) => {
            error!(error = %e, "Failed to persist result");
            fail_job(sink, &job.id, &e).await;
        }
    }
}
