//! Remote judge client against an in-process fake Judge0 server.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use codebench_common::types::{ErrorKind, ExecutionMode, ExecutionPath, ExecutionRequest};
use codebench_engine::judge::{JudgeConfig, RemoteJudgeClient};
use codebench_engine::{CodeBench, ExecError, ExecutionBackend, LanguageRegistry};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct FakeJudge {
    /// Polls answered with "Processing" before the final status
    pending_polls: u32,
    polls: Arc<AtomicU32>,
    submissions: Arc<AtomicU32>,
    final_response: Value,
    reject_submissions: bool,
}

impl FakeJudge {
    fn finishing_with(pending_polls: u32, final_response: Value) -> Self {
        Self {
            pending_polls,
            polls: Arc::new(AtomicU32::new(0)),
            submissions: Arc::new(AtomicU32::new(0)),
            final_response,
            reject_submissions: false,
        }
    }
}

async fn submit(State(fake): State<FakeJudge>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    fake.submissions.fetch_add(1, Ordering::SeqCst);
    if fake.reject_submissions {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "quota exceeded"})));
    }
    assert!(body["source_code"].is_string());
    assert!(body["language_id"].is_u64());
    (StatusCode::CREATED, Json(json!({"token": "tok-1"})))
}

async fn status(State(fake): State<FakeJudge>, Path(token): Path<String>) -> Json<Value> {
    assert_eq!(token, "tok-1");
    let n = fake.polls.fetch_add(1, Ordering::SeqCst);
    if n < fake.pending_polls {
        Json(json!({"status": {"id": 2, "description": "Processing"}}))
    } else {
        Json(fake.final_response.clone())
    }
}

async fn spawn(fake: FakeJudge) -> String {
    let app = Router::new()
        .route("/languages", get(|| async { Json(json!([{"id": 71, "name": "Python (3.8.1)"}])) }))
        .route("/submissions", post(submit))
        .route("/submissions/:token", get(status))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(url: &str, max_polls: u32) -> RemoteJudgeClient {
    let config = JudgeConfig::new(url)
        .with_api_key("test-key")
        .with_polling(Duration::from_millis(10), max_polls);
    RemoteJudgeClient::new(config).unwrap()
}

fn accepted() -> Value {
    json!({
        "status": {"id": 3, "description": "Accepted"},
        "stdout": "Hello World!\n",
        "stderr": null,
        "compile_output": null,
        "time": "0.012",
        "memory": 3072,
        "exit_code": 0
    })
}

#[tokio::test]
async fn test_accepted_after_polling() {
    let fake = FakeJudge::finishing_with(2, accepted());
    let polls = fake.polls.clone();
    let url = spawn(fake).await;

    let registry = LanguageRegistry::builtin();
    let python = registry.get("python").unwrap();
    let request = ExecutionRequest::new("print('Hello World!')", "python");
    let metrics = client(&url, 10).execute(&request, python).await.unwrap();

    assert_eq!(metrics.stdout, "Hello World!\n");
    assert_eq!(metrics.execution_time, 0.012);
    assert_eq!(metrics.memory_usage, 3);
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_compile_error_verdict() {
    let url = spawn(FakeJudge::finishing_with(
        0,
        json!({
            "status": {"id": 6, "description": "Compilation Error"},
            "compile_output": "main.cpp:1:1: error: expected ';'"
        }),
    ))
    .await;

    let registry = LanguageRegistry::builtin();
    let cpp = registry.get("cpp").unwrap();
    let err = client(&url, 5)
        .execute(&ExecutionRequest::new("int main() {", "cpp"), cpp)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Compile { .. }));
    assert!(err.to_string().contains("expected ';'"));
}

#[tokio::test]
async fn test_runtime_error_carries_stderr() {
    let url = spawn(FakeJudge::finishing_with(
        0,
        json!({
            "status": {"id": 11, "description": "Runtime Error (NZEC)"},
            "stdout": "partial\n",
            "stderr": "ZeroDivisionError: division by zero",
            "exit_code": 1
        }),
    ))
    .await;

    let registry = LanguageRegistry::builtin();
    let python = registry.get("python").unwrap();
    let err = client(&url, 5)
        .execute(&ExecutionRequest::new("1/0", "python"), python)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    assert_eq!(err.to_string(), "Runtime Error: ZeroDivisionError: division by zero");
    assert_eq!(err.metrics().unwrap().stdout, "partial\n");
}

#[tokio::test]
async fn test_poll_limit_is_a_timeout() {
    let url = spawn(FakeJudge::finishing_with(u32::MAX, accepted())).await;

    let registry = LanguageRegistry::builtin();
    let python = registry.get("python").unwrap();
    let err = client(&url, 3)
        .execute(&ExecutionRequest::new("while True: pass", "python"), python)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.kind().triggers_failover());
}

#[tokio::test]
async fn test_rejected_submission() {
    let mut fake = FakeJudge::finishing_with(0, accepted());
    fake.reject_submissions = true;
    let url = spawn(fake).await;

    let registry = LanguageRegistry::builtin();
    let python = registry.get("python").unwrap();
    let err = client(&url, 3)
        .execute(&ExecutionRequest::new("print(1)", "python"), python)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Submission);
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn test_availability_needs_key_and_health() {
    let url = spawn(FakeJudge::finishing_with(0, accepted())).await;
    assert!(client(&url, 1).is_available().await);

    let keyless = RemoteJudgeClient::new(JudgeConfig::new(&url)).unwrap();
    assert!(!keyless.is_available().await);

    let unreachable = client("http://127.0.0.1:9", 1);
    assert!(!unreachable.is_available().await);
}

#[tokio::test]
async fn test_service_prefers_remote_when_forced() {
    let fake = FakeJudge::finishing_with(1, accepted());
    let submissions = fake.submissions.clone();
    let url = spawn(fake).await;

    let bench = CodeBench::builder()
        .remote_backend(Arc::new(client(&url, 10)))
        .build()
        .unwrap();
    let request = ExecutionRequest::new("print('Hello World!')", "python").with_mode(ExecutionMode::Remote);
    let result = bench.execute(&request).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.path, Some(ExecutionPath::Remote));
    assert_eq!(result.attempts, vec![ExecutionPath::Remote]);
    assert_eq!(result.stdout, "Hello World!\n");
    assert_eq!(submissions.load(Ordering::SeqCst), 1);
}
