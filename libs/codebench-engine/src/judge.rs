//! Judge0-compatible remote execution client.
//!
//! Submission is asynchronous (`wait=false`); the result is fetched by
//! polling `GET /submissions/{token}` at a fixed interval inside an
//! explicit deadline. Dropping the future cancels the polling.

use crate::backend::{ExecError, ExecutionBackend, RawMetrics};
use crate::engine::effective_timeout;
use crate::languages::LanguageConfig;
use async_trait::async_trait;
use codebench_common::config::Settings;
use codebench_common::types::{ExecutionPath, ExecutionRequest};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_DEADLINE_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub base_url: String,
    /// RapidAPI key; without one the remote path reports unavailable
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl JudgeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            api_host: None,
            poll_interval: Duration::from_millis(1000),
            max_polls: 30,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.judge0_api_key.clone(),
            api_host: settings.judge0_host.clone(),
            poll_interval: Duration::from_millis(settings.judge0_poll_interval_ms),
            max_polls: settings.judge0_max_polls.max(1),
            ..Self::new(settings.judge0_url.clone())
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Upper bound on the whole polling loop
    pub fn poll_budget(&self) -> Duration {
        self.poll_interval * self.max_polls + POLL_DEADLINE_SLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling { attempt: u32 },
    Finished,
    Expired,
}

/// A submission in flight. Only the polling loop mutates it.
#[derive(Debug, Clone)]
pub struct RemoteSubmission {
    pub token: String,
    pub language_id: u32,
    pub state: PollState,
    pub status: Option<JudgeStatus>,
    submitted_at: Instant,
}

impl RemoteSubmission {
    pub fn new(token: impl Into<String>, language_id: u32) -> Self {
        Self {
            token: token.into(),
            language_id,
            state: PollState::Submitted,
            status: None,
            submitted_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }
}

#[derive(Debug, Serialize)]
struct SubmissionBody<'a> {
    source_code: &'a str,
    language_id: u32,
    stdin: Option<&'a str>,
    expected_output: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SubmissionCreated {
    token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeStatus {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteResponse {
    pub status: JudgeStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Kilobytes
    #[serde(default)]
    pub memory: Option<f64>,
    /// Seconds, sent as a string or a number
    #[serde(default)]
    pub time: Option<serde_json::Value>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl RemoteResponse {
    pub fn is_terminal(&self) -> bool {
        self.status.id > 2
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_status_id(self.status.id)
    }

    pub fn time_seconds(&self) -> Option<f64> {
        match self.time.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn memory_mb(&self) -> u64 {
        self.memory.map(|kb| (kb.max(0.0) / 1024.0) as u64).unwrap_or(0)
    }

    /// `Runtime Error: …` and `Compile Error: …` parts, in that order
    pub fn error_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(stderr) = self.stderr.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(format!("Runtime Error: {}", stderr.trim_end()));
        }
        if let Some(compile) = self.compile_output.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(format!("Compile Error: {}", compile.trim_end()));
        }
        if parts.is_empty() {
            let description = if self.status.description.is_empty() {
                format!("status {}", self.status.id)
            } else {
                self.status.description.clone()
            };
            parts.push(match self.message.as_deref().filter(|m| !m.trim().is_empty()) {
                Some(message) => format!("{}: {}", description, message.trim()),
                None => description,
            });
        }
        parts.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    WrongOutput,
    TimeLimit,
    CompileError,
    RuntimeError,
    Other,
}

impl Verdict {
    pub fn from_status_id(id: u32) -> Self {
        match id {
            3 => Verdict::Accepted,
            4 => Verdict::WrongOutput,
            5 => Verdict::TimeLimit,
            6 => Verdict::CompileError,
            7..=12 => Verdict::RuntimeError,
            _ => Verdict::Other,
        }
    }
}

/// Result of one poll
#[derive(Debug, Clone)]
pub enum PollOutcome {
    InProgress(JudgeStatus),
    Done(RemoteResponse),
}

pub struct RemoteJudgeClient {
    http: reqwest::Client,
    config: JudgeConfig,
}

impl RemoteJudgeClient {
    pub fn new(config: JudgeConfig) -> Result<Self, ExecError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExecError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        let mut builder = self.http.request(method, url);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("X-RapidAPI-Key", key);
        }
        if let Some(host) = &self.config.api_host {
            builder = builder.header("X-RapidAPI-Host", host);
        }
        builder
    }

    /// Health probe: needs a credential and a 200 from `GET /languages`
    pub async fn is_available(&self) -> bool {
        if self.config.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return false;
        }
        let probe = self
            .request(reqwest::Method::GET, "/languages")
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await;
        match probe {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                warn!(status = %response.status(), "Remote judge health check failed");
                false
            }
            Err(e) => {
                warn!("Remote judge unreachable: {}", e);
                false
            }
        }
    }

    #[instrument(skip(self, request, config), fields(language = %config.language))]
    pub async fn submit(
        &self,
        request: &ExecutionRequest,
        config: &LanguageConfig,
    ) -> Result<RemoteSubmission, ExecError> {
        let language_id = config.judge0_id.ok_or_else(|| ExecError::UnsupportedLanguage {
            language: config.language.to_string(),
            supported: "languages with a remote mapping".to_string(),
        })?;

        let body = SubmissionBody {
            source_code: &request.source,
            language_id,
            stdin: request.stdin.as_deref(),
            expected_output: None,
        };

        let response = self
            .request(reqwest::Method::POST, "/submissions?base64_encoded=false&wait=false")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ExecError::Submission(format!("HTTP {}: {}", status, text.trim())));
        }

        let created: SubmissionCreated = response
            .json()
            .await
            .map_err(|e| ExecError::ResultParsing(e.to_string()))?;
        let token = created
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExecError::ResultParsing("submission response has no token".to_string()))?;

        info!(token = %token, language_id = language_id, "Submitted to remote judge");
        Ok(RemoteSubmission::new(token, language_id))
    }

    /// One status fetch
    pub async fn poll(&self, token: &str) -> Result<PollOutcome, ExecError> {
        let path = format!("/submissions/{}?base64_encoded=false", token);
        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| ExecError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExecError::Submission(format!(
                "status fetch for {} returned HTTP {}",
                token,
                response.status()
            )));
        }

        let parsed: RemoteResponse = response
            .json()
            .await
            .map_err(|e| ExecError::ResultParsing(e.to_string()))?;

        if parsed.is_terminal() {
            Ok(PollOutcome::Done(parsed))
        } else {
            Ok(PollOutcome::InProgress(parsed.status))
        }
    }

    /// Poll until a terminal status, the attempt limit or the deadline
    pub async fn await_result(&self, submission: &mut RemoteSubmission) -> Result<RemoteResponse, ExecError> {
        let budget = self.config.poll_budget();
        let max_polls = self.config.max_polls;
        let interval = self.config.poll_interval;

        let polled = tokio::time::timeout(budget, async {
            for attempt in 1..=max_polls {
                submission.state = PollState::Polling { attempt };
                match self.poll(&submission.token).await? {
                    PollOutcome::Done(response) => return Ok(Some(response)),
                    PollOutcome::InProgress(status) => {
                        debug!(token = %submission.token, attempt = attempt, status = %status.description, "Still running");
                        submission.status = Some(status);
                    }
                }
                if attempt < max_polls {
                    tokio::time::sleep(interval).await;
                }
            }
            Ok::<_, ExecError>(None)
        })
        .await;

        match polled {
            Ok(Ok(Some(response))) => {
                submission.state = PollState::Finished;
                submission.status = Some(response.status.clone());
                Ok(response)
            }
            Ok(Ok(None)) | Err(_) => {
                submission.state = PollState::Expired;
                warn!(token = %submission.token, "Remote result not ready in time");
                Err(ExecError::Timeout(format!(
                    "Remote judge gave no result within {:.1}s",
                    submission.elapsed().as_secs_f64()
                )))
            }
            Ok(Err(e)) => Err(e),
        }
    }

    /// Map a terminal response onto metrics or a typed error
    pub fn interpret(&self, response: RemoteResponse, elapsed: Duration) -> Result<RawMetrics, ExecError> {
        let metrics = RawMetrics {
            stdout: response.stdout.clone().unwrap_or_default(),
            stderr: response.stderr.clone().unwrap_or_default(),
            return_code: response.exit_code.unwrap_or(0),
            execution_time: response.time_seconds().unwrap_or_else(|| elapsed.as_secs_f64()),
            memory_usage: response.memory_mb(),
        };

        match response.verdict() {
            Verdict::Accepted => Ok(metrics),
            Verdict::CompileError => Err(ExecError::Compile {
                diagnostics: response.compile_output.clone().unwrap_or_else(|| response.error_text()),
            }),
            Verdict::TimeLimit => Err(ExecError::Timeout(format!(
                "Time Limit Exceeded ({})",
                response.status.description
            ))),
            Verdict::WrongOutput => Err(ExecError::WrongOutput { message: response.error_text(), metrics }),
            Verdict::RuntimeError | Verdict::Other => {
                let mut metrics = metrics;
                if metrics.return_code == 0 {
                    metrics.return_code = 1;
                }
                Err(ExecError::Runtime { message: response.error_text(), metrics })
            }
        }
    }
}

#[async_trait]
impl ExecutionBackend for RemoteJudgeClient {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Remote
    }

    async fn is_available(&self, config: &LanguageConfig) -> bool {
        config.judge0_id.is_some() && RemoteJudgeClient::is_available(self).await
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        config: &LanguageConfig,
    ) -> Result<RawMetrics, ExecError> {
        let started = Instant::now();
        let mut submission = self.submit(request, config).await?;
        let response = self.await_result(&mut submission).await?;
        let metrics = self.interpret(response, started.elapsed())?;

        let limit = effective_timeout(config, request).as_secs_f64();
        if metrics.execution_time > limit {
            return Err(ExecError::timeout(limit));
        }
        Ok(metrics)
    }
}
