// CLI commands for running and scoring code
use anyhow::{bail, Context, Result};
use codebench_common::config::Settings;
use codebench_common::types::{BenchmarkCategory, ExecutionRequest, ExecutionResult, Language};
use codebench_engine::{AnalysisReport, BenchmarkCase, CodeBench, CodeBenchBuilder, SuiteRequest, SuiteSummary};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::{RunArgs, SuiteArgs};

fn build_bench(settings: &Settings) -> Result<CodeBench> {
    let bench = CodeBenchBuilder::from_settings(settings)
        .context("Failed to set up the engine")?
        .build()
        .context("Failed to set up the engine")?;
    Ok(bench)
}

/// Language from `--language`, else from the file extension
pub fn resolve_language(file: &Path, explicit: Option<&str>) -> Result<Language> {
    if let Some(id) = explicit {
        return id.parse::<Language>().map_err(anyhow::Error::msg);
    }
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match Language::from_extension(ext) {
        Some(language) => Ok(language),
        None => bail!(
            "Cannot infer the language of {}; pass --language (one of: {})",
            file.display(),
            Language::valid_ids().join(", ")
        ),
    }
}

pub fn build_request(args: &RunArgs) -> Result<ExecutionRequest> {
    let language = resolve_language(&args.file, args.language.as_deref())?;
    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut request = ExecutionRequest::new(source, language.as_str()).with_mode(args.mode);
    if let Some(timeout) = args.timeout {
        request = request.with_timeout_secs(timeout);
    }
    if let Some(path) = &args.stdin {
        let input = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        request = request.with_stdin(input);
    }
    Ok(request)
}

pub fn build_suite(args: &SuiteArgs) -> Result<SuiteRequest> {
    let Some(first) = args.files.first() else {
        bail!("A suite needs at least one file");
    };
    let language = resolve_language(first, args.language.as_deref())?;
    let cases = args
        .files
        .iter()
        .map(|file| {
            let source =
                fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
            let name = file.file_stem().map(|stem| stem.to_string_lossy().into_owned());
            Ok(BenchmarkCase { name, source, stdin: None })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SuiteRequest { language: language.as_str().to_string(), mode: args.mode, timeout_secs: args.timeout, cases })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_result(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
        if !result.stdout.ends_with('\n') {
            println!();
        }
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }

    println!("----------------------------------------");
    if result.success {
        println!("✓ {} run succeeded", result.language);
    } else {
        println!("✗ {} run failed", result.language);
        if let Some(error) = &result.error {
            println!("  {}", error.replace('\n', "\n  "));
        }
    }
    if let Some(path) = result.path {
        let attempts: Vec<String> = result.attempts.iter().map(|p| p.to_string()).collect();
        println!("  path:        {} (tried: {})", path, attempts.join(" -> "));
    }
    println!("  exit code:   {}", result.return_code);
    println!("  time:        {:.4}s", result.execution_time);
    println!("  memory:      {} MB", result.memory_usage);
    if result.success {
        println!("  score:       {:.2}/100", result.performance_score);
    }
    if !result.dependencies_detected.is_empty() {
        println!("  imports:     {}", result.dependencies_detected.join(", "));
    }
    for note in &result.notes {
        println!("  note:        {}", note);
    }
    if !result.optimization_suggestions.is_empty() {
        println!();
        println!("Suggestions:");
        for suggestion in &result.optimization_suggestions {
            println!("  • {}", suggestion);
        }
    }
}

fn print_report(report: &AnalysisReport) {
    print_result(&report.execution);
    println!();
    println!("Complexity:    {}", report.complexity);
    if let Some(benchmark) = &report.benchmark {
        println!("Level:         {}", benchmark.optimization_level);
        println!("Category:      {}", benchmark.benchmark_category);
        println!("Structure:     {}/100", benchmark.complexity_score);
        println!("Percentile:    {:.1}", benchmark.comparative_ranking);
        println!("Fingerprint:   {}", benchmark.code_hash);
    }
    if let Some(cmp) = &report.baseline_comparison {
        println!(
            "Baseline:      time x{:.2} ({:?}), memory x{:.2} ({:?}), overall {:?}",
            cmp.execution_time.ratio,
            cmp.execution_time.status,
            cmp.memory_usage.ratio,
            cmp.memory_usage.status,
            cmp.overall_assessment
        );
    }
    if !report.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for recommendation in &report.recommendations {
            println!("  • {}", recommendation);
        }
    }
}

/// Execute a file
pub async fn run(args: &RunArgs, json: bool) -> Result<bool> {
    let request = build_request(args)?;
    let bench = build_bench(&Settings::from_env())?;
    let result = bench.execute(&request).await;

    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }
    Ok(result.success)
}

/// Execute a file and record its benchmark
pub async fn analyze(args: &RunArgs, json: bool) -> Result<bool> {
    let request = build_request(args)?;
    let bench = build_bench(&Settings::from_env())?;
    let report = bench.execute_with_analysis(&request).await;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(report.execution.success)
}

fn print_suite(summary: &SuiteSummary) {
    println!("{:<20} {:<8} {:>10} {:>8}", "CASE", "RESULT", "TIME", "SCORE");
    for case in &summary.results {
        let execution = &case.report.execution;
        let score = case.score().map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<8} {:>9.4}s {:>8}",
            case.name,
            if case.score().is_some() { "ok" } else { "failed" },
            execution.execution_time,
            score
        );
    }
    println!("----------------------------------------");
    println!(
        "Passed:        {}/{} ({} failed)",
        summary.successful_tests, summary.total_tests, summary.failed_tests
    );
    println!("Total time:    {:.4}s", summary.total_execution_time);
    if let (Some(best), Some(worst)) = (&summary.best_performance, &summary.worst_performance) {
        println!("Average score: {:.2}/100", summary.average_performance_score);
        println!("Best:          {} ({:.2})", best.name, best.performance_score);
        println!("Worst:         {} ({:.2})", worst.name, worst.performance_score);
    }
}

/// Run a set of files as one benchmark suite
pub async fn suite(args: &SuiteArgs, json: bool) -> Result<bool> {
    let request = build_suite(args)?;
    let bench = build_bench(&Settings::from_env())?;
    let summary = bench.run_suite(&request).await;

    if json {
        print_json(&summary)?;
    } else {
        print_suite(&summary);
    }
    Ok(summary.failed_tests == 0)
}

#[derive(Debug, Serialize)]
struct LanguageRow {
    id: Language,
    name: String,
    extension: String,
    compiled: bool,
    installed: bool,
    timeout_secs: u64,
    memory_limit_mb: u64,
}

/// List configured languages
pub fn list_languages(json: bool) -> Result<bool> {
    let settings = Settings::from_env();
    let bench = build_bench(&Settings { judge0_api_key: None, ..settings })?;
    let rows: Vec<LanguageRow> = bench
        .registry()
        .configs()
        .map(|c| LanguageRow {
            id: c.language,
            name: c.display_name.clone(),
            extension: c.file_extension.clone(),
            compiled: c.compile_command.is_some(),
            installed: c.is_installed(),
            timeout_secs: c.timeout_secs,
            memory_limit_mb: c.memory_limit_mb,
        })
        .collect();

    if json {
        print_json(&rows)?;
        return Ok(true);
    }

    println!("{:<12} {:<12} {:<6} {:<9} {:<10} {}", "ID", "NAME", "EXT", "COMPILED", "INSTALLED", "LIMITS");
    for row in &rows {
        println!(
            "{:<12} {:<12} {:<6} {:<9} {:<10} {}s / {} MB",
            row.id.as_str(),
            row.name,
            row.extension,
            if row.compiled { "yes" } else { "no" },
            if row.installed { "✓" } else { "✗" },
            row.timeout_secs,
            row.memory_limit_mb
        );
    }
    Ok(true)
}

/// Benchmark statistics from the persisted log
pub fn show_stats(language: Option<&str>, category: Option<&str>, json: bool) -> Result<bool> {
    let settings = Settings::from_env();
    if settings.data_dir.is_none() {
        bail!("CODEBENCH_DATA_DIR is not set; benchmarks are only kept in memory");
    }
    let language = language.map(str::parse::<Language>).transpose().map_err(anyhow::Error::msg)?;
    let category = category
        .map(str::parse::<BenchmarkCategory>)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let bench = build_bench(&Settings { judge0_api_key: None, ..settings })?;
    let Some(stats) = bench.performance().statistics(language, category) else {
        println!("No benchmarks recorded yet");
        return Ok(true);
    };

    if json {
        print_json(&stats)?;
        return Ok(true);
    }

    println!("Benchmarks:    {}", stats.total_benchmarks);
    println!(
        "Score:         avg {:.2}, median {:.2}, best {:.2}, worst {:.2}, std-dev {:.2}",
        stats.performance.average,
        stats.performance.median,
        stats.performance.best,
        stats.performance.worst,
        stats.performance.std_dev
    );
    println!(
        "Time:          avg {:.4}s, median {:.4}s, range {:.4}s..{:.4}s",
        stats.execution_time.average, stats.execution_time.median, stats.execution_time.min, stats.execution_time.max
    );
    println!(
        "Memory:        avg {:.1} MB, median {:.1} MB, range {}..{} MB",
        stats.memory_usage.average, stats.memory_usage.median, stats.memory_usage.min, stats.memory_usage.max
    );
    for (title, dist) in [
        ("Languages", &stats.by_language),
        ("Categories", &stats.by_category),
        ("Levels", &stats.by_optimization_level),
    ] {
        let parts: Vec<String> = dist.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        println!("{:<14} {}", format!("{}:", title), parts.join(", "));
    }
    if !stats.insights.is_empty() {
        println!();
        println!("Insights:");
        for insight in &stats.insights {
            println!("  • {}", insight);
        }
    }
    Ok(true)
}

/// Cross-language ranking from the persisted log
pub fn compare(languages: &[String], json: bool) -> Result<bool> {
    let settings = Settings::from_env();
    if settings.data_dir.is_none() {
        bail!("CODEBENCH_DATA_DIR is not set; benchmarks are only kept in memory");
    }
    let languages = languages
        .iter()
        .map(|id| id.parse::<Language>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::msg)?;

    let bench = build_bench(&Settings { judge0_api_key: None, ..settings })?;
    let comparison = bench.performance().compare_languages(&languages);

    if json {
        print_json(&comparison)?;
        return Ok(true);
    }
    if comparison.total_languages_analyzed == 0 {
        println!("No benchmarks recorded yet");
        return Ok(true);
    }

    println!("{:<12} {:>6} {:>8} {:>10} {:>10}", "LANGUAGE", "RUNS", "SCORE", "TIME", "MEMORY");
    for (language, perf) in &comparison.languages {
        println!(
            "{:<12} {:>6} {:>8.2} {:>9.4}s {:>7.1} MB",
            language.as_str(),
            perf.total_benchmarks,
            perf.average_performance,
            perf.average_execution_time,
            perf.average_memory_usage
        );
    }
    if !comparison.insights.is_empty() {
        println!();
        for insight in &comparison.insights {
            println!("  • {}", insight);
        }
    }
    Ok(true)
}
