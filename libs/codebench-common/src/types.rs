use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Supported languages. Closed set: adding one means one registry row
/// plus (optionally) one normalization hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[serde(alias = "py")]
    Python,
    #[serde(alias = "js", alias = "node")]
    Javascript,
    #[serde(alias = "ts")]
    Typescript,
    Java,
    #[serde(alias = "c++")]
    Cpp,
    #[serde(alias = "golang")]
    Go,
    #[serde(alias = "rs")]
    Rust,
    Php,
    #[serde(alias = "rb")]
    Ruby,
    #[serde(alias = "cs", alias = "c#")]
    Csharp,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Java,
        Language::Cpp,
        Language::Go,
        Language::Rust,
        Language::Php,
        Language::Ruby,
        Language::Csharp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Csharp => "csharp",
        }
    }

    /// Case-insensitive lookup accepting the common aliases.
    pub fn parse(name: &str) -> Option<Self> {
        let lang = match name.trim().to_lowercase().as_str() {
            "python" | "py" | "python3" => Language::Python,
            "javascript" | "js" | "node" => Language::Javascript,
            "typescript" | "ts" => Language::Typescript,
            "java" => Language::Java,
            "cpp" | "c++" => Language::Cpp,
            "go" | "golang" => Language::Go,
            "rust" | "rs" => Language::Rust,
            "php" => Language::Php,
            "ruby" | "rb" => Language::Ruby,
            "csharp" | "cs" | "c#" => Language::Csharp,
            _ => return None,
        };
        Some(lang)
    }

    /// Infer a language from a file extension (with or without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let lang = match ext.trim_start_matches('.').to_lowercase().as_str() {
            "py" => Language::Python,
            "js" | "mjs" => Language::Javascript,
            "ts" => Language::Typescript,
            "java" => Language::Java,
            "cpp" | "cc" | "cxx" => Language::Cpp,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            "cs" => Language::Csharp,
            _ => return None,
        };
        Some(lang)
    }

    /// Lowercase ids of every supported language, in table order
    pub fn valid_ids() -> Vec<String> {
        Self::ALL.iter().map(|l| l.as_str().to_string()).collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::parse(s).ok_or_else(|| {
            format!(
                "unsupported language '{}'; supported: {}",
                s,
                Language::valid_ids().join(", ")
            )
        })
    }
}

/// Caller's path preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Local process first, remote judge as the single fallback
    #[default]
    Local,
    /// Remote judge first, local process as the single fallback
    Remote,
    /// Local when the toolchain is installed, remote otherwise
    Auto,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionMode::Local => "local",
            ExecutionMode::Remote => "remote",
            ExecutionMode::Auto => "auto",
        };
        f.write_str(s)
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ExecutionMode::Local),
            "remote" => Ok(ExecutionMode::Remote),
            "auto" => Ok(ExecutionMode::Auto),
            other => Err(format!("invalid mode '{}'; expected local, remote or auto", other)),
        }
    }
}

/// Which execution path produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPath {
    Local,
    Remote,
}

impl ExecutionPath {
    pub fn other(&self) -> Self {
        match self {
            ExecutionPath::Local => ExecutionPath::Remote,
            ExecutionPath::Remote => ExecutionPath::Local,
        }
    }
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPath::Local => f.write_str("local"),
            ExecutionPath::Remote => f.write_str("remote"),
        }
    }
}

/// Failure taxonomy tag. Callers branch on this, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedLanguage,
    CompileError,
    RuntimeError,
    WrongOutput,
    Timeout,
    Submission,
    Network,
    ResultParsing,
    ToolchainUnavailable,
    Internal,
}

impl ErrorKind {
    /// Whether a failure of this kind earns one attempt on the alternate path.
    /// Compile/runtime/wrong-output failures are verdicts on the submitted code.
    pub fn triggers_failover(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Submission
                | ErrorKind::Network
                | ErrorKind::ResultParsing
                | ErrorKind::ToolchainUnavailable
                | ErrorKind::Internal
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::CompileError => "compile_error",
            ErrorKind::RuntimeError => "runtime_error",
            ErrorKind::WrongOutput => "wrong_output",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Submission => "submission",
            ErrorKind::Network => "network",
            ErrorKind::ResultParsing => "result_parsing",
            ErrorKind::ToolchainUnavailable => "toolchain_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single execution request. Created per call, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub stdin: Option<String>,
    /// Can only tighten the language's configured timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(source: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: language.into(),
            mode: ExecutionMode::default(),
            stdin: None,
            timeout_secs: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Normalized outcome of one request, whichever path produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub success: bool,
    pub language: String,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    /// Seconds
    pub execution_time: f64,
    /// Megabytes
    pub memory_usage: u64,
    pub performance_score: f64,
    pub optimization_suggestions: Vec<String>,
    pub dependencies_detected: Vec<String>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub path: Option<ExecutionPath>,
    pub attempts: Vec<ExecutionPath>,
    /// Failover notes and other non-fatal remarks
    #[serde(default)]
    pub notes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// Failed result with no output. `error` must be non-empty.
    pub fn failure(language: impl Into<String>, kind: ErrorKind, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = format!("execution failed ({})", kind);
        }
        Self {
            execution_id: Uuid::new_v4(),
            success: false,
            language: language.into(),
            stdout: String::new(),
            stderr: String::new(),
            return_code: -1,
            execution_time: 0.0,
            memory_usage: 0,
            performance_score: 0.0,
            optimization_suggestions: Vec::new(),
            dependencies_detected: Vec::new(),
            error: Some(error),
            error_kind: Some(kind),
            path: None,
            attempts: Vec::new(),
            notes: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Heuristic Big-O label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComplexityClass {
    #[serde(rename = "O(1)")]
    Constant,
    #[serde(rename = "O(log n)")]
    Logarithmic,
    #[serde(rename = "O(n)")]
    Linear,
    #[serde(rename = "O(n log n)")]
    Linearithmic,
    #[serde(rename = "O(n^2)")]
    Quadratic,
    #[serde(rename = "O(n^3)")]
    Cubic,
    #[serde(rename = "O(2^n)")]
    Exponential,
}

impl ComplexityClass {
    pub const ALL: [ComplexityClass; 7] = [
        ComplexityClass::Constant,
        ComplexityClass::Logarithmic,
        ComplexityClass::Linear,
        ComplexityClass::Linearithmic,
        ComplexityClass::Quadratic,
        ComplexityClass::Cubic,
        ComplexityClass::Exponential,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ComplexityClass::Constant => "O(1)",
            ComplexityClass::Logarithmic => "O(log n)",
            ComplexityClass::Linear => "O(n)",
            ComplexityClass::Linearithmic => "O(n log n)",
            ComplexityClass::Quadratic => "O(n^2)",
            ComplexityClass::Cubic => "O(n^3)",
            ComplexityClass::Exponential => "O(2^n)",
        }
    }

    pub fn is_superlinear_polynomial_or_worse(&self) -> bool {
        matches!(
            self,
            ComplexityClass::Quadratic | ComplexityClass::Cubic | ComplexityClass::Exponential
        )
    }
}

impl fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    Optimal,
    Good,
    NeedsImprovement,
    Poor,
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptimizationLevel::Optimal => "optimal",
            OptimizationLevel::Good => "good",
            OptimizationLevel::NeedsImprovement => "needs_improvement",
            OptimizationLevel::Poor => "poor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkCategory {
    Basic,
    Algorithm,
    DataStructure,
    IoIntensive,
}

impl FromStr for BenchmarkCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(BenchmarkCategory::Basic),
            "algorithm" => Ok(BenchmarkCategory::Algorithm),
            "data_structure" => Ok(BenchmarkCategory::DataStructure),
            "io_intensive" => Ok(BenchmarkCategory::IoIntensive),
            other => Err(format!("unknown benchmark category '{}'", other)),
        }
    }
}

impl fmt::Display for BenchmarkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BenchmarkCategory::Basic => "basic",
            BenchmarkCategory::Algorithm => "algorithm",
            BenchmarkCategory::DataStructure => "data_structure",
            BenchmarkCategory::IoIntensive => "io_intensive",
        };
        f.write_str(s)
    }
}

/// Append-only benchmark log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub execution_id: String,
    pub language: Language,
    /// SHA-1 of the source text
    pub code_hash: String,
    pub execution_time: f64,
    pub memory_usage: u64,
    pub cpu_usage: f64,
    pub performance_score: f64,
    pub complexity_score: u32,
    pub algorithm_complexity: ComplexityClass,
    pub optimization_level: OptimizationLevel,
    pub benchmark_category: BenchmarkCategory,
    pub comparative_ranking: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionCategory {
    Performance,
    Algorithm,
    Syntax,
    Memory,
    Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub suggestion_id: String,
    pub category: SuggestionCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub code_example: Option<String>,
    pub estimated_improvement: String,
    pub difficulty: Difficulty,
}

impl OptimizationSuggestion {
    /// One-line rendering used in `ExecutionResult::optimization_suggestions`
    pub fn summary(&self) -> String {
        format!("{}: {} ({})", self.title, self.description, self.estimated_improvement)
    }
}

/// History entry appended after every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub language: String,
    pub path: Option<ExecutionPath>,
    pub success: bool,
    pub execution_time: f64,
    pub memory_usage: u64,
    pub performance_score: f64,
    pub error_kind: Option<ErrorKind>,
    pub code_hash: Option<String>,
    pub algorithm_complexity: Option<ComplexityClass>,
    pub optimization_level: Option<OptimizationLevel>,
}

impl ExecutionRecord {
    pub fn from_result(result: &ExecutionResult) -> Self {
        Self {
            execution_id: result.execution_id,
            timestamp: result.timestamp,
            language: result.language.clone(),
            path: result.path,
            success: result.success,
            execution_time: result.execution_time,
            memory_usage: result.memory_usage,
            performance_score: result.performance_score,
            error_kind: result.error_kind,
            code_hash: None,
            algorithm_complexity: None,
            optimization_level: None,
        }
    }

    pub fn with_benchmark(mut self, benchmark: &BenchmarkResult) -> Self {
        self.code_hash = Some(benchmark.code_hash.clone());
        self.algorithm_complexity = Some(benchmark.algorithm_complexity);
        self.optimization_level = Some(benchmark.optimization_level);
        self
    }
}

/// Request queued for the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionJob {
    pub id: Uuid,
    pub request: ExecutionRequest,
    #[serde(default)]
    pub analyze: bool,
    pub enqueued_at: DateTime<Utc>,
}

impl ExecutionJob {
    pub fn new(request: ExecutionRequest, analyze: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            analyze,
            enqueued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    /// The worker could not produce or persist a normal result
    Failed,
}
