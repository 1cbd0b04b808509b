use crate::history::ExecutionHistoryStore;
use crate::types::{ExecutionJob, ExecutionRecord, JobState};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

// Redis key semantics shared by the API and the worker so the two
// never drift.

pub const QUEUE_KEY: &str = "codebench:queue";
pub const RESULT_PREFIX: &str = "codebench:result";
pub const STATUS_PREFIX: &str = "codebench:status";
pub const HISTORY_KEY: &str = "codebench:history";

/// Results and statuses expire after a day
pub const RESULT_TTL_SECS: u64 = 86400;
pub const HISTORY_MAX_LEN: isize = 1000;
const HISTORY_CHANNEL_CAPACITY: usize = 256;

pub fn result_key(job_id: &Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, job_id)
}

pub fn status_key(job_id: &Uuid) -> String {
    format!("{}:{}", STATUS_PREFIX, job_id)
}

fn encode<T: Serialize>(value: &T) -> RedisResult<String> {
    serde_json::to_string(value).map_err(|e| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
    })
}

fn decode<T: DeserializeOwned>(payload: &str) -> RedisResult<T> {
    serde_json::from_str(payload).map_err(|e| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
    })
}

/// Enqueue a job (RPUSH, FIFO) and mark it queued
pub async fn push_job(conn: &mut ConnectionManager, job: &ExecutionJob) -> RedisResult<()> {
    let payload = encode(job)?;
    set_status(conn, &job.id, JobState::Queued).await?;
    conn.rpush(QUEUE_KEY, payload).await
}

/// Pop the next job, waiting up to `timeout_seconds` so the caller can
/// notice shutdown
pub async fn pop_job(
    conn: &mut ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<ExecutionJob>> {
    let popped: Option<(String, String)> = conn.blpop(QUEUE_KEY, timeout_seconds).await?;
    match popped {
        Some((_key, payload)) => Ok(Some(decode(&payload)?)),
        None => Ok(None),
    }
}

pub async fn set_status(conn: &mut ConnectionManager, job_id: &Uuid, state: JobState) -> RedisResult<()> {
    let payload = encode(&state)?;
    conn.set_ex(status_key(job_id), payload, RESULT_TTL_SECS as _).await
}

pub async fn get_status(conn: &mut ConnectionManager, job_id: &Uuid) -> RedisResult<Option<JobState>> {
    let payload: Option<String> = conn.get(status_key(job_id)).await?;
    payload.map(|p| decode(&p)).transpose()
}

/// Store a finished job's result and flip its status to completed
pub async fn store_result<T: Serialize>(
    conn: &mut ConnectionManager,
    job_id: &Uuid,
    result: &T,
) -> RedisResult<()> {
    let payload = encode(result)?;
    let _: () = conn.set_ex(result_key(job_id), payload, RESULT_TTL_SECS as _).await?;
    set_status(conn, job_id, JobState::Completed).await
}

pub async fn get_result<T: DeserializeOwned>(
    conn: &mut ConnectionManager,
    job_id: &Uuid,
) -> RedisResult<Option<T>> {
    let payload: Option<String> = conn.get(result_key(job_id)).await?;
    payload.map(|p| decode(&p)).transpose()
}

/// Last `limit` history records, oldest first
pub async fn recent_history(conn: &mut ConnectionManager, limit: usize) -> RedisResult<Vec<ExecutionRecord>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let start = -(limit.min(HISTORY_MAX_LEN as usize) as isize);
    let rows: Vec<String> = conn.lrange(HISTORY_KEY, start, -1).await?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match decode::<ExecutionRecord>(&row) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed history entry: {}", e),
        }
    }
    Ok(records)
}

/// History store backed by a capped Redis list.
///
/// Appends go through a bounded channel to one writer task; a full
/// channel drops the record with a warning instead of blocking.
pub struct RedisHistoryStore {
    tx: mpsc::Sender<ExecutionRecord>,
}

impl RedisHistoryStore {
    /// Spawns the writer task on the current tokio runtime
    pub fn spawn(conn: ConnectionManager) -> Self {
        let (tx, rx) = mpsc::channel(HISTORY_CHANNEL_CAPACITY);
        tokio::spawn(history_writer(conn, rx));
        Self { tx }
    }
}

impl ExecutionHistoryStore for RedisHistoryStore {
    fn append(&self, record: ExecutionRecord) {
        if let Err(e) = self.tx.try_send(record) {
            warn!("History record dropped: {}", e);
        }
    }
}

async fn history_writer(mut conn: ConnectionManager, mut rx: mpsc::Receiver<ExecutionRecord>) {
    while let Some(record) = rx.recv().await {
        let payload = match encode(&record) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to encode history record: {}", e);
                continue;
            }
        };
        let pushed: RedisResult<()> = conn.rpush(HISTORY_KEY, payload).await;
        if let Err(e) = pushed {
            warn!(execution_id = %record.execution_id, "Failed to persist history record: {}", e);
            continue;
        }
        let trimmed: RedisResult<()> = conn.ltrim(HISTORY_KEY, -HISTORY_MAX_LEN, -1).await;
        if let Err(e) = trimmed {
            warn!("Failed to trim history list: {}", e);
        }
        debug!(execution_id = %record.execution_id, "History record persisted");
    }
    debug!("History writer stopped");
}
