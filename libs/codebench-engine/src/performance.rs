//! Performance model: heuristic complexity classification, scoring against
//! per-language baselines, and an append-only benchmark log.
//!
//! The log is the only shared mutable state. It lives behind a mutex and
//! can be mirrored to `benchmarks.jsonl` under a data directory, which is
//! reloaded on construction.

use crate::baselines::Baselines;
use chrono::Utc;
use codebench_common::types::{
    BenchmarkCategory, BenchmarkResult, ComplexityClass, Language, OptimizationLevel,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const BENCHMARK_LOG_FILE: &str = "benchmarks.jsonl";

/// Percentile reported until there are enough comparable samples
pub const DEFAULT_PERCENTILE: f64 = 50.0;

lazy_static! {
    static ref LOOP_KEYWORD: Regex = Regex::new(r"\b(?:for|while|loop|foreach)\b|\.each\b").unwrap();
    static ref SORT_CALL: Regex =
        Regex::new(r"\bsort(?:ed|_by|_by_key|_unstable|_unstable_by)?\s*\(").unwrap();
    static ref RECURSION_KEYWORD: Regex = Regex::new(r"recursive|recursion").unwrap();
    static ref BINARY_SEARCH: Regex =
        Regex::new(r"binary.*search|bisect|lower_bound|upper_bound").unwrap();
    static ref FUNCTION_DEFS: Vec<Regex> = vec![
        Regex::new(r"\bdef\s+(?:self\.)?([a-z_]\w*)").unwrap(),
        Regex::new(r"\bfunction\s+([a-z_$][\w$]*)").unwrap(),
        Regex::new(r"\bfn\s+([a-z_]\w*)").unwrap(),
        Regex::new(r"\bfunc\s+(?:\([^)]*\)\s*)?([a-z_]\w*)").unwrap(),
        Regex::new(r"^\s*(?:[\w<>\[\],*&:]+\s+)+\**([a-z_]\w*)\s*\([^;{]*\)\s*(?:const\s*)?(?:throws\s+[\w.,\s]+)?\{?\s*$").unwrap(),
    ];
    static ref CONTROL: Regex = Regex::new(r"\b(?:if|for|while|switch|case)\b").unwrap();
    static ref DEFINITION: Regex = Regex::new(r"\b(?:def|function|class|struct)\b").unwrap();
    static ref NESTED: Regex = Regex::new(r"for.*for|if.*if").unwrap();
}

/// Words the C-style definition pattern can mistake for function names
const NOT_FUNCTION_NAMES: [&str; 9] = ["if", "while", "for", "switch", "return", "else", "catch", "new", "sizeof"];

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn brace_delta(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// Deepest chain of loops nested inside one another.
///
/// A loop opened with `{` stays open until its braces close; any other
/// loop stays open while following lines are indented deeper than its
/// header.
pub fn loop_nesting_depth(code: &str) -> usize {
    struct OpenLoop {
        indent: usize,
        depth: i64,
        braced: bool,
    }

    let mut open: Vec<OpenLoop> = Vec::new();
    let mut depth: i64 = 0;
    let mut deepest = 0;

    for line in code.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_width(line);
        open.retain(|l| if l.braced { depth > l.depth } else { indent > l.indent });

        if LOOP_KEYWORD.is_match(line) {
            open.push(OpenLoop {
                indent,
                depth,
                braced: line.contains('{'),
            });
            deepest = deepest.max(open.len());
        }
        depth += brace_delta(line);
    }
    deepest
}

/// (name, body) for each function-like definition
fn function_bodies(code: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = code.lines().collect();
    let mut found = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("return") {
            continue;
        }
        let matched = FUNCTION_DEFS.iter().find_map(|re| {
            re.captures(line)
                .and_then(|c| c.get(1).map(|m| (m.as_str().to_string(), m.end())))
        });
        let Some((name, end)) = matched else { continue };
        if NOT_FUNCTION_NAMES.contains(&name.as_str()) {
            continue;
        }

        let def_indent = indent_width(line);
        let mut body = line[end..].to_string();
        for (offset, next) in lines[i + 1..].iter().enumerate() {
            let trimmed = next.trim();
            let opens_block = offset == 0 && trimmed == "{";
            if trimmed.is_empty() || opens_block || indent_width(next) > def_indent {
                body.push('\n');
                body.push_str(next);
            } else {
                break;
            }
        }
        found.push((name, body));
    }
    found
}

fn calls_itself(code: &str) -> bool {
    function_bodies(code).into_iter().any(|(name, body)| {
        Regex::new(&format!(r"\b{}\s*\(", regex::escape(&name)))
            .map(|re| re.is_match(&body))
            .unwrap_or(false)
    })
}

/// Heuristic Big-O label from surface patterns; first match wins.
pub fn classify_complexity(code: &str) -> ComplexityClass {
    let code = code.to_lowercase();
    match loop_nesting_depth(&code) {
        d if d >= 3 => return ComplexityClass::Cubic,
        2 => return ComplexityClass::Quadratic,
        1 => return ComplexityClass::Linear,
        _ => {}
    }
    if SORT_CALL.is_match(&code) {
        ComplexityClass::Linearithmic
    } else if RECURSION_KEYWORD.is_match(&code) || calls_itself(&code) {
        ComplexityClass::Exponential
    } else if BINARY_SEARCH.is_match(&code) {
        ComplexityClass::Logarithmic
    } else {
        ComplexityClass::Constant
    }
}

/// Structural complexity score, 0-100
pub fn structural_complexity(code: &str) -> u32 {
    let lower = code.to_lowercase();
    let lines = lower.lines().filter(|l| !l.trim().is_empty()).count() as u32;
    let control = CONTROL.find_iter(&lower).count() as u32;
    let definitions = DEFINITION.find_iter(&lower).count() as u32;
    let nested = NESTED.find_iter(&lower).count() as u32;

    let score = (lines * 2).min(30) + control * 5 + definitions * 3 + nested * 10;
    score.min(100)
}

/// Weighted score against a baseline, clamped to [0, 100], 2 decimals
pub fn performance_score(
    execution_time: f64,
    memory_mb: f64,
    complexity: u32,
    baseline_time: f64,
    baseline_memory: f64,
) -> f64 {
    let time_score = (100.0 - (execution_time / baseline_time - 1.0) * 50.0).max(0.0);
    let memory_score = (100.0 - (memory_mb / baseline_memory - 1.0) * 40.0).max(0.0);
    let penalty = (complexity as f64 / 100.0 * 20.0).min(20.0);
    let total = time_score * 0.7 + memory_score * 0.2 + (100.0 - penalty) * 0.1;
    round_to(total.clamp(0.0, 100.0), 2)
}

pub fn optimization_level(score: f64, complexity: u32) -> OptimizationLevel {
    if score >= 90.0 && complexity <= 30 {
        OptimizationLevel::Optimal
    } else if score >= 70.0 && complexity <= 50 {
        OptimizationLevel::Good
    } else if score >= 50.0 {
        OptimizationLevel::NeedsImprovement
    } else {
        OptimizationLevel::Poor
    }
}

pub fn categorize(code: &str) -> BenchmarkCategory {
    let lower = code.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has_any(&["sort", "search", "tree", "graph"]) {
        BenchmarkCategory::Algorithm
    } else if has_any(&["list", "array", "dict", "map"]) {
        BenchmarkCategory::DataStructure
    } else if has_any(&["file", "read", "write", "input", "output"]) {
        BenchmarkCategory::IoIntensive
    } else {
        BenchmarkCategory::Basic
    }
}

pub fn cpu_estimate(execution_time: f64) -> f64 {
    (execution_time * 10.0).min(100.0)
}

/// SHA-1 hex of the source text
pub fn fingerprint(code: &str) -> String {
    let mut hasher = sha1_smol::Sha1::new();
    hasher.update(code.as_bytes());
    hasher.digest().to_string()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeStatus {
    Faster,
    Normal,
    Slower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    Efficient,
    Normal,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallAssessment {
    Excellent,
    Good,
    Acceptable,
    NeedsImprovement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison<S> {
    pub result: f64,
    pub baseline: f64,
    pub ratio: f64,
    pub status: S,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub execution_time: MetricComparison<TimeStatus>,
    pub memory_usage: MetricComparison<MemoryStatus>,
    pub overall_assessment: OverallAssessment,
    pub ranking_percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    pub average: f64,
    pub median: f64,
    pub best: f64,
    pub worst: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStatistics {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub total_benchmarks: usize,
    pub performance: ScoreStatistics,
    pub execution_time: RangeStatistics,
    pub memory_usage: RangeStatistics,
    pub by_language: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_optimization_level: BTreeMap<String, usize>,
    pub insights: Vec<String>,
}

/// One language's averages in a cross-language comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguagePerformance {
    pub total_benchmarks: usize,
    pub average_performance: f64,
    pub average_execution_time: f64,
    pub average_memory_usage: f64,
    pub optimization_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageComparison {
    /// Only languages with at least one benchmark
    pub languages: BTreeMap<Language, LanguagePerformance>,
    pub insights: Vec<String>,
    pub total_languages_analyzed: usize,
    pub best_performance_language: Option<Language>,
    pub fastest_language: Option<Language>,
    pub most_memory_efficient: Option<Language>,
}

fn ranking(ranked: &[&(Language, LanguagePerformance)], label: impl Fn(&LanguagePerformance) -> String) -> String {
    ranked
        .iter()
        .map(|(language, perf)| format!("{} ({})", language, label(perf)))
        .collect::<Vec<_>>()
        .join(" > ")
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation; 0 for fewer than two values
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn range_stats(values: &[f64], decimals: i32) -> RangeStatistics {
    RangeStatistics {
        average: round_to(mean(values), decimals),
        median: round_to(median(values), decimals),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

pub struct PerformanceModel {
    baselines: Baselines,
    log: Mutex<Vec<BenchmarkResult>>,
    log_path: Option<PathBuf>,
}

impl PerformanceModel {
    /// In-memory log only
    pub fn new(baselines: Baselines) -> Self {
        Self {
            baselines,
            log: Mutex::new(Vec::new()),
            log_path: None,
        }
    }

    /// Log mirrored to `<dir>/benchmarks.jsonl`, reloading what is there
    pub fn with_data_dir(baselines: Baselines, dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(BENCHMARK_LOG_FILE);
        let mut entries = Vec::new();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            for (n, line) in content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
                match serde_json::from_str::<BenchmarkResult>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!(line = n + 1, "Skipping malformed benchmark entry: {}", e),
                }
            }
        }
        info!(path = %path.display(), entries = entries.len(), "Benchmark log loaded");
        Ok(Self {
            baselines,
            log: Mutex::new(entries),
            log_path: Some(path),
        })
    }

    pub fn baselines(&self) -> &Baselines {
        &self.baselines
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BenchmarkResult>> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Score a run and append it to the benchmark log
    pub fn analyze(
        &self,
        code: &str,
        language: Language,
        execution_time: f64,
        memory_usage: u64,
        cpu_usage: Option<f64>,
    ) -> BenchmarkResult {
        let id = format!("bench_{}", Uuid::new_v4().simple());
        self.analyze_execution(&id, code, language, execution_time, memory_usage, cpu_usage)
    }

    /// `analyze` with a caller-supplied execution id
    pub fn analyze_execution(
        &self,
        execution_id: &str,
        code: &str,
        language: Language,
        execution_time: f64,
        memory_usage: u64,
        cpu_usage: Option<f64>,
    ) -> BenchmarkResult {
        let mut log = self.lock();
        let result = self.build(&log, execution_id, code, language, execution_time, memory_usage, cpu_usage);
        log.push(result.clone());
        self.persist(&result);
        debug!(
            language = %language,
            score = result.performance_score,
            complexity = %result.algorithm_complexity,
            "Benchmark recorded"
        );
        result
    }

    /// Same computation as `analyze`, nothing recorded
    pub fn assess(
        &self,
        code: &str,
        language: Language,
        execution_time: f64,
        memory_usage: u64,
        cpu_usage: Option<f64>,
    ) -> BenchmarkResult {
        let log = self.lock();
        let id = format!("assess_{}", Uuid::new_v4().simple());
        self.build(&log, &id, code, language, execution_time, memory_usage, cpu_usage)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        log: &[BenchmarkResult],
        execution_id: &str,
        code: &str,
        language: Language,
        execution_time: f64,
        memory_usage: u64,
        cpu_usage: Option<f64>,
    ) -> BenchmarkResult {
        let execution_time = execution_time.max(0.0);
        let class = classify_complexity(code);
        let complexity = structural_complexity(code);
        let (baseline_time, baseline_memory) = self.baselines.lookup(language, class);
        let score = performance_score(execution_time, memory_usage as f64, complexity, baseline_time, baseline_memory);

        BenchmarkResult {
            execution_id: execution_id.to_string(),
            language,
            code_hash: fingerprint(code),
            execution_time,
            memory_usage,
            cpu_usage: cpu_usage.unwrap_or_else(|| cpu_estimate(execution_time)),
            performance_score: score,
            complexity_score: complexity,
            algorithm_complexity: class,
            optimization_level: optimization_level(score, complexity),
            benchmark_category: categorize(code),
            comparative_ranking: percentile(log, language, class, score),
            timestamp: Utc::now(),
        }
    }

    fn persist(&self, result: &BenchmarkResult) {
        let Some(path) = &self.log_path else { return };
        let line = match serde_json::to_string(result) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode benchmark: {}", e);
                return;
            }
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| writeln!(f, "{}", line));
        if let Err(e) = written {
            warn!(path = %path.display(), "Failed to persist benchmark: {}", e);
        }
    }

    /// Snapshot of the log, oldest first
    pub fn history(&self) -> Vec<BenchmarkResult> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregates over the log; `None` when nothing matches the filters
    pub fn statistics(
        &self,
        language: Option<Language>,
        category: Option<BenchmarkCategory>,
    ) -> Option<BenchmarkStatistics> {
        let log = self.lock();
        let filtered: Vec<&BenchmarkResult> = log
            .iter()
            .filter(|r| language.map_or(true, |l| r.language == l))
            .filter(|r| category.map_or(true, |c| r.benchmark_category == c))
            .collect();
        if filtered.is_empty() {
            return None;
        }

        let scores: Vec<f64> = filtered.iter().map(|r| r.performance_score).collect();
        let times: Vec<f64> = filtered.iter().map(|r| r.execution_time).collect();
        let memory: Vec<f64> = filtered.iter().map(|r| r.memory_usage as f64).collect();

        let mut by_language = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        let mut by_level = BTreeMap::new();
        for r in &filtered {
            *by_language.entry(r.language.to_string()).or_insert(0) += 1;
            *by_category.entry(r.benchmark_category.to_string()).or_insert(0) += 1;
            *by_level.entry(r.optimization_level.to_string()).or_insert(0) += 1;
        }

        Some(BenchmarkStatistics {
            total_benchmarks: filtered.len(),
            performance: ScoreStatistics {
                average: round_to(mean(&scores), 2),
                median: round_to(median(&scores), 2),
                best: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                worst: scores.iter().copied().fold(f64::INFINITY, f64::min),
                std_dev: round_to(std_dev(&scores), 2),
            },
            execution_time: range_stats(&times, 4),
            memory_usage: range_stats(&memory, 1),
            by_language,
            by_category,
            by_optimization_level: by_level,
            insights: insights(&filtered),
        })
    }

    /// Rank languages by average score, run time and memory over the log.
    /// An empty `languages` compares every supported language.
    pub fn compare_languages(&self, languages: &[Language]) -> LanguageComparison {
        let requested: BTreeSet<Language> = if languages.is_empty() {
            Language::ALL.into_iter().collect()
        } else {
            languages.iter().copied().collect()
        };

        let mut entries: Vec<(Language, LanguagePerformance)> = Vec::new();
        for language in requested {
            if let Some(stats) = self.statistics(Some(language), None) {
                entries.push((
                    language,
                    LanguagePerformance {
                        total_benchmarks: stats.total_benchmarks,
                        average_performance: stats.performance.average,
                        average_execution_time: stats.execution_time.average,
                        average_memory_usage: stats.memory_usage.average,
                        optimization_distribution: stats.by_optimization_level,
                    },
                ));
            }
        }

        let mut by_score: Vec<&(Language, LanguagePerformance)> = entries.iter().collect();
        by_score.sort_by(|a, b| b.1.average_performance.total_cmp(&a.1.average_performance));
        let mut by_time: Vec<&(Language, LanguagePerformance)> = entries.iter().collect();
        by_time.sort_by(|a, b| a.1.average_execution_time.total_cmp(&b.1.average_execution_time));
        let mut by_memory: Vec<&(Language, LanguagePerformance)> = entries.iter().collect();
        by_memory.sort_by(|a, b| a.1.average_memory_usage.total_cmp(&b.1.average_memory_usage));

        let mut insights = Vec::new();
        if entries.len() > 1 {
            insights.push(format!(
                "Performance ranking: {}",
                ranking(&by_score, |p| format!("{:.1}", p.average_performance))
            ));
            insights.push(format!(
                "Speed ranking: {}",
                ranking(&by_time, |p| format!("{:.3}s", p.average_execution_time))
            ));
            insights.push(format!(
                "Memory efficiency: {}",
                ranking(&by_memory, |p| format!("{:.1}MB", p.average_memory_usage))
            ));
        }

        LanguageComparison {
            total_languages_analyzed: entries.len(),
            best_performance_language: by_score.first().map(|(l, _)| *l),
            fastest_language: by_time.first().map(|(l, _)| *l),
            most_memory_efficient: by_memory.first().map(|(l, _)| *l),
            insights,
            languages: entries.into_iter().collect(),
        }
    }

    pub fn compare_with_baseline(&self, result: &BenchmarkResult) -> BaselineComparison {
        let (baseline_time, baseline_memory) = self.baselines.lookup(result.language, result.algorithm_complexity);
        let time_ratio = result.execution_time / baseline_time;
        let memory_ratio = result.memory_usage as f64 / baseline_memory;

        let time_status = if time_ratio < 1.0 {
            TimeStatus::Faster
        } else if time_ratio > 1.5 {
            TimeStatus::Slower
        } else {
            TimeStatus::Normal
        };
        let memory_status = if memory_ratio < 1.0 {
            MemoryStatus::Efficient
        } else if memory_ratio > 2.0 {
            MemoryStatus::Heavy
        } else {
            MemoryStatus::Normal
        };
        let overall = if time_ratio < 0.8 && memory_ratio < 0.8 {
            OverallAssessment::Excellent
        } else if time_ratio < 1.2 && memory_ratio < 1.5 {
            OverallAssessment::Good
        } else if time_ratio < 2.0 && memory_ratio < 3.0 {
            OverallAssessment::Acceptable
        } else {
            OverallAssessment::NeedsImprovement
        };

        BaselineComparison {
            execution_time: MetricComparison {
                result: result.execution_time,
                baseline: baseline_time,
                ratio: round_to(time_ratio, 2),
                status: time_status,
            },
            memory_usage: MetricComparison {
                result: result.memory_usage as f64,
                baseline: baseline_memory,
                ratio: round_to(memory_ratio, 2),
                status: memory_status,
            },
            overall_assessment: overall,
            ranking_percentile: result.comparative_ranking,
        }
    }

    /// Improvement advice by score band, complexity class and memory
    pub fn recommendations(result: &BenchmarkResult) -> Vec<String> {
        let mut out = Vec::new();
        let score = result.performance_score;
        if score < 50.0 {
            out.push("Consider redesigning the overall algorithm".to_string());
            out.push("Look into data structures and algorithms suited to this problem".to_string());
        } else if score < 70.0 {
            out.push("Optimizing a few bottlenecks could improve performance noticeably".to_string());
            out.push("Profile the code to find where most of the time goes".to_string());
        } else if score < 90.0 {
            out.push("Performance is already good; small refinements can push it further".to_string());
        } else {
            out.push("Excellent performance; the current implementation is very efficient".to_string());
        }

        match result.algorithm_complexity {
            ComplexityClass::Quadratic => {
                out.push("Consider an O(n log n) or O(n) algorithm".to_string())
            }
            ComplexityClass::Cubic => {
                out.push("Cubic time complexity will struggle with large inputs".to_string())
            }
            ComplexityClass::Exponential => out.push(
                "Exponential time complexity; consider dynamic programming or memoization".to_string(),
            ),
            _ => {}
        }

        if result.memory_usage > 1000 {
            out.push("Memory usage is very high; consider streaming or compression".to_string());
        } else if result.memory_usage > 500 {
            out.push("Consider more memory-efficient data structures".to_string());
        }
        out
    }
}

/// Share of prior same-language, same-class scores at or below `score`
fn percentile(log: &[BenchmarkResult], language: Language, class: ComplexityClass, score: f64) -> f64 {
    let peers: Vec<f64> = log
        .iter()
        .filter(|r| r.language == language && r.algorithm_complexity == class)
        .map(|r| r.performance_score)
        .collect();
    if peers.len() < 2 {
        return DEFAULT_PERCENTILE;
    }
    let at_or_below = peers.iter().filter(|s| **s <= score).count();
    round_to(at_or_below as f64 / peers.len() as f64 * 100.0, 1)
}

fn insights(results: &[&BenchmarkResult]) -> Vec<String> {
    let mut out = Vec::new();
    let total = results.len() as f64;

    let mut per_language: BTreeMap<Language, Vec<f64>> = BTreeMap::new();
    for r in results {
        per_language.entry(r.language).or_default().push(r.performance_score);
    }
    if per_language.len() > 1 {
        let averages: Vec<(Language, f64)> = per_language.iter().map(|(l, s)| (*l, mean(s))).collect();
        let best = averages.iter().max_by(|a, b| a.1.total_cmp(&b.1));
        let worst = averages.iter().min_by(|a, b| a.1.total_cmp(&b.1));
        if let (Some(best), Some(worst)) = (best, worst) {
            out.push(format!("{} performs best with an average score of {:.1}", best.0, best.1));
            out.push(format!("{} needs the most improvement with an average score of {:.1}", worst.0, worst.1));
        }
    }

    let optimal = results
        .iter()
        .filter(|r| r.optimization_level == OptimizationLevel::Optimal)
        .count() as f64;
    let optimal_ratio = optimal / total * 100.0;
    if optimal_ratio > 50.0 {
        out.push(format!("{:.1}% of the code is already optimal", optimal_ratio));
    } else if optimal_ratio < 20.0 {
        out.push(format!("Only {:.1}% of the code is optimal; performance work is needed", optimal_ratio));
    }

    let heavy = results
        .iter()
        .filter(|r| matches!(r.algorithm_complexity, ComplexityClass::Quadratic | ComplexityClass::Cubic))
        .count() as f64;
    if heavy > total * 0.3 {
        out.push("Many solutions use high-complexity algorithms; consider more efficient approaches".to_string());
    }
    out
}
