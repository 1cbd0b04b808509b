pub mod backend;
pub mod baselines;
pub mod deps;
pub mod engine;
pub mod failover;
pub mod judge;
pub mod languages;
pub mod performance;
pub mod process;
pub mod service;
pub mod suggestions;
pub mod suite;
pub mod workspace;

pub use backend::{ExecError, ExecutionBackend, RawMetrics};
pub use baselines::Baselines;
pub use engine::LocalEngine;
pub use judge::{JudgeConfig, RemoteJudgeClient};
pub use languages::{LanguageConfig, LanguageRegistry};
pub use performance::{LanguageComparison, PerformanceModel};
pub use service::{AnalysisReport, CodeBench, CodeBenchBuilder, CodeReview, CodeReviewer};
pub use suggestions::SuggestionGenerator;
pub use suite::{BenchmarkCase, SuiteRequest, SuiteSummary};
