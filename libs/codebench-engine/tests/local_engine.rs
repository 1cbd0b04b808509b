//! Local execution against real toolchains.
//!
//! Python tests run when `python3` is on PATH and are skipped otherwise.
//! The other toolchains are `#[ignore]`d; run them with `--ignored` on a
//! machine that has them installed.

use codebench_common::types::{ComplexityClass, ErrorKind, ExecutionMode, ExecutionPath, ExecutionRequest};
use codebench_engine::{CodeBench, LocalEngine};
use std::time::{Duration, Instant};

fn have(program: &str) -> bool {
    which::which(program).is_ok()
}

macro_rules! require {
    ($program:expr) => {
        if !have($program) {
            eprintln!("skipping: {} not installed", $program);
            return;
        }
    };
}

fn bench() -> CodeBench {
    CodeBench::builder().build().unwrap()
}

#[tokio::test]
async fn test_python_hello_world() {
    require!("python3");
    let report = bench()
        .execute_with_analysis(&ExecutionRequest::new("print('Hello World!')", "python"))
        .await;

    let result = report.execution;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.stdout, "Hello World!\n");
    assert_eq!(result.return_code, 0);
    assert_eq!(result.path, Some(ExecutionPath::Local));
    assert!(result.execution_time >= 0.0);
    assert_eq!(report.complexity, ComplexityClass::Constant);
    assert!((0.0..=100.0).contains(&result.performance_score));
}

#[tokio::test]
async fn test_python_stdin() {
    require!("python3");
    let request = ExecutionRequest::new("n = int(input())\nprint(n * 2)", "python").with_stdin("21\n");
    let result = bench().execute(&request).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.stdout.trim(), "42");
}

#[tokio::test]
async fn test_python_exception_is_runtime_error() {
    require!("python3");
    let result = bench()
        .execute(&ExecutionRequest::new("print('start')\nraise ValueError('bad input')", "python"))
        .await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::RuntimeError));
    assert_ne!(result.return_code, 0);
    assert!(result.error.unwrap().contains("ValueError"));
    assert_eq!(result.stdout, "start\n");
    // Verdict on the code, never retried elsewhere
    assert_eq!(result.attempts, vec![ExecutionPath::Local]);
}

#[tokio::test]
async fn test_python_syntax_error() {
    require!("python3");
    let result = bench().execute(&ExecutionRequest::new("def broken(:\n    pass", "python")).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("SyntaxError"));
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    require!("python3");
    let request = ExecutionRequest::new("while True:\n    pass", "python").with_timeout_secs(1);
    let started = Instant::now();
    let result = bench().execute(&request).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    assert!(result.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_naive_fibonacci_times_out_and_is_exponential() {
    require!("python3");
    let code = "def fib(n):\n    if n <= 1:\n        return n\n    return fib(n - 1) + fib(n - 2)\n\nprint(fib(35))\n";
    let request = ExecutionRequest::new(code, "python").with_timeout_secs(1);
    let report = bench().execute_with_analysis(&request).await;

    assert!(!report.execution.success);
    assert_eq!(report.execution.error_kind, Some(ErrorKind::Timeout));
    assert_eq!(report.complexity, ComplexityClass::Exponential);
}

#[tokio::test]
async fn test_child_processes_killed_on_timeout() {
    require!("python3");
    let code = "import subprocess\nsubprocess.Popen(['sleep', '30'])\nwhile True:\n    pass\n";
    let request = ExecutionRequest::new(code, "python").with_timeout_secs(1);
    let started = Instant::now();
    let result = bench().execute(&request).await;
    assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    // Pipes held by the orphan would otherwise keep the read open
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_identical_submissions_share_fingerprint() {
    require!("python3");
    let bench = bench();
    let request = ExecutionRequest::new("print(sum(range(10)))", "python");
    let first = bench.execute_with_analysis(&request).await.benchmark.unwrap();
    let second = bench.execute_with_analysis(&request).await.benchmark.unwrap();
    let third = bench.execute_with_analysis(&request).await.benchmark.unwrap();

    assert_eq!(first.code_hash, second.code_hash);
    assert_eq!(first.comparative_ranking, 50.0);
    assert_eq!(second.comparative_ranking, 50.0);
    assert!((0.0..=100.0).contains(&third.comparative_ranking));
    assert_eq!(bench.performance().len(), 3);
}

#[tokio::test]
async fn test_forced_remote_without_judge_falls_back() {
    require!("python3");
    let request = ExecutionRequest::new("print('ok')", "python").with_mode(ExecutionMode::Remote);
    let result = bench().execute(&request).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.attempts, vec![ExecutionPath::Local]);
}

#[tokio::test]
async fn test_memory_ceiling_reported() {
    require!("python3");
    let mut registry = codebench_engine::LanguageRegistry::builtin();
    registry
        .apply_overrides(r#"{"languages":[{"name":"python","memory_limit_mb":1}]}"#)
        .unwrap();
    let bench = CodeBench::builder()
        .registry(registry)
        .local_backend(std::sync::Arc::new(LocalEngine::new()))
        .build()
        .unwrap();
    let code = "import time\ndata = b\"x\" * (64 * 1024 * 1024)\ntime.sleep(0.3)\nprint(len(data))";
    let result = bench.execute(&ExecutionRequest::new(code, "python")).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Memory limit exceeded"));
}

async fn hello_in(language: &str, source: &str) {
    let result = bench().execute(&ExecutionRequest::new(source, language)).await;
    assert!(result.success, "{}: {:?}", language, result.error);
    assert!(result.stdout.contains("Hello World!"), "{}: {:?}", language, result.stdout);
    assert_eq!(result.return_code, 0);
}

#[tokio::test]
#[ignore] // Requires node
async fn test_javascript_hello() {
    hello_in("javascript", "console.log('Hello World!');").await;
}

#[tokio::test]
#[ignore] // Requires ts-node
async fn test_typescript_hello() {
    hello_in("typescript", "const msg: string = 'Hello World!';\nconsole.log(msg);").await;
}

#[tokio::test]
#[ignore] // Requires a JDK
async fn test_java_hello_with_renamed_class() {
    hello_in(
        "java",
        "public class Solution {\n    public static void main(String[] args) {\n        System.out.println(\"Hello World!\");\n    }\n}",
    )
    .await;
}

#[tokio::test]
#[ignore] // Requires a JDK
async fn test_java_bare_statements_wrapped() {
    hello_in("java", "System.out.println(\"Hello World!\");").await;
}

#[tokio::test]
#[ignore] // Requires g++
async fn test_cpp_hello() {
    hello_in(
        "cpp",
        "#include <iostream>\nint main() {\n    std::cout << \"Hello World!\" << std::endl;\n    return 0;\n}",
    )
    .await;
}

#[tokio::test]
#[ignore] // Requires g++
async fn test_cpp_compile_error() {
    let result = bench().execute(&ExecutionRequest::new("int main() { return 0 }", "cpp")).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::CompileError));
    assert!(result.error.unwrap().starts_with("Compile Error:"));
}

#[tokio::test]
#[ignore] // Requires go
async fn test_go_hello() {
    hello_in("go", "package main\n\nimport \"fmt\"\n\nfunc main() {\n    fmt.Println(\"Hello World!\")\n}").await;
}

#[tokio::test]
#[ignore] // Requires rustc
async fn test_rust_hello() {
    hello_in("rust", "fn main() {\n    println!(\"Hello World!\");\n}").await;
}

#[tokio::test]
#[ignore] // Requires php
async fn test_php_hello() {
    hello_in("php", "<?php\necho \"Hello World!\\n\";").await;
}

#[tokio::test]
#[ignore] // Requires ruby
async fn test_ruby_hello() {
    hello_in("ruby", "puts 'Hello World!'").await;
}

#[tokio::test]
#[ignore] // Requires mono
async fn test_csharp_hello() {
    hello_in(
        "csharp",
        "using System;\nclass Program {\n    static void Main() {\n        Console.WriteLine(\"Hello World!\");\n    }\n}",
    )
    .await;
}
