//! Benchmark suites: several programs in one language, run one after
//! another through the analysis path and summarized together.

use crate::service::{AnalysisReport, CodeBench};
use codebench_common::types::{ExecutionMode, ExecutionRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkCase {
    #[serde(default)]
    pub name: Option<String>,
    pub source: String,
    #[serde(default)]
    pub stdin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteRequest {
    pub language: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub cases: Vec<BenchmarkCase>,
}

impl SuiteRequest {
    fn request_for(&self, case: &BenchmarkCase) -> ExecutionRequest {
        let mut request = ExecutionRequest::new(case.source.clone(), self.language.clone()).with_mode(self.mode);
        if let Some(secs) = self.timeout_secs {
            request = request.with_timeout_secs(secs);
        }
        if let Some(stdin) = &case.stdin {
            request = request.with_stdin(stdin.clone());
        }
        request
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub report: AnalysisReport,
}

impl CaseResult {
    /// Score of a recorded benchmark; `None` when the case failed
    pub fn score(&self) -> Option<f64> {
        self.report.benchmark.as_ref().map(|b| b.performance_score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseHighlight {
    pub name: String,
    pub performance_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub language: String,
    pub total_tests: usize,
    pub successful_tests: usize,
    pub failed_tests: usize,
    pub total_execution_time: f64,
    /// Over successful cases only; 0 when none succeeded
    pub average_performance_score: f64,
    pub best_performance: Option<CaseHighlight>,
    pub worst_performance: Option<CaseHighlight>,
    pub results: Vec<CaseResult>,
}

impl SuiteSummary {
    pub fn from_results(language: impl Into<String>, results: Vec<CaseResult>) -> Self {
        let total_execution_time = results.iter().map(|r| r.report.execution.execution_time).sum();
        let scored: Vec<CaseHighlight> = results
            .iter()
            .filter_map(|r| {
                r.score().map(|performance_score| CaseHighlight { name: r.name.clone(), performance_score })
            })
            .collect();

        let average_performance_score = if scored.is_empty() {
            0.0
        } else {
            scored.iter().map(|h| h.performance_score).sum::<f64>() / scored.len() as f64
        };
        // First case wins ties
        let best = scored.iter().fold(None::<&CaseHighlight>, |acc, h| match acc {
            Some(a) if a.performance_score >= h.performance_score => Some(a),
            _ => Some(h),
        });
        let worst = scored.iter().fold(None::<&CaseHighlight>, |acc, h| match acc {
            Some(a) if a.performance_score <= h.performance_score => Some(a),
            _ => Some(h),
        });

        Self {
            language: language.into(),
            total_tests: results.len(),
            successful_tests: scored.len(),
            failed_tests: results.len() - scored.len(),
            total_execution_time,
            average_performance_score,
            best_performance: best.cloned(),
            worst_performance: worst.cloned(),
            results,
        }
    }
}

impl CodeBench {
    /// Run every case in order through [`CodeBench::execute_with_analysis`].
    /// A failing case is counted, never fatal to the rest of the suite.
    #[instrument(skip(self, suite), fields(language = %suite.language, cases = suite.cases.len()))]
    pub async fn run_suite(&self, suite: &SuiteRequest) -> SuiteSummary {
        let mut results = Vec::with_capacity(suite.cases.len());
        for (i, case) in suite.cases.iter().enumerate() {
            let name = case.name.clone().unwrap_or_else(|| format!("Test_{}", i + 1));
            let report = self.execute_with_analysis(&suite.request_for(case)).await;
            info!(case = %name, success = report.execution.success, "Suite case finished");
            results.push(CaseResult { name, report });
        }

        let summary = SuiteSummary::from_results(suite.language.clone(), results);
        info!(
            successful = summary.successful_tests,
            total = summary.total_tests,
            average = summary.average_performance_score,
            "Suite finished"
        );
        summary
    }
}
