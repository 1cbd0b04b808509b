//! Rule-based optimization suggestions.

use codebench_common::types::{
    BenchmarkResult, ComplexityClass, Difficulty, ErrorKind, ExecutionResult, Language,
    OptimizationSuggestion, Severity, SuggestionCategory,
};
use lazy_static::lazy_static;
use regex::Regex;

/// At most this many suggestions are returned per analysis
pub const MAX_SUGGESTIONS: usize = 5;

lazy_static! {
    static ref PY_RANGE_LEN: Regex = Regex::new(r"for\s+\w+\s+in\s+range\s*\(\s*len\s*\(").unwrap();
    static ref PY_STR_CONCAT: Regex = Regex::new(r"\+\s*str\s*\(").unwrap();
    static ref JS_VAR: Regex = Regex::new(r"\bvar\s+\w").unwrap();
    static ref JS_LOOSE_EQ: Regex = Regex::new(r"[^=!<>]==[^=]").unwrap();
    static ref JAVA_STRING_CONCAT: Regex = Regex::new(r#"String\s+\w+\s*=\s*[^;]*"\s*\+|\w+\s*\+=\s*""#).unwrap();
    static ref CPP_MALLOC: Regex = Regex::new(r"\bmalloc\s*\(").unwrap();
    static ref RUST_UNWRAP: Regex = Regex::new(r"\.unwrap\(\)").unwrap();
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Any loop line followed, within the loop's body, by a line containing `needle`.
/// Looks at the next few lines only.
fn inside_loop(code: &str, needle: &str) -> bool {
    let lines: Vec<&str> = code.lines().collect();
    lines.iter().enumerate().any(|(i, line)| {
        let lower = line.trim_start();
        let is_loop = lower.starts_with("for ") || lower.starts_with("for(") || lower.starts_with("while");
        is_loop
            && (line.contains(needle)
                || lines[i + 1..].iter().take(5).any(|next| next.contains(needle)))
    })
}

struct Rule {
    prefix: &'static str,
    category: SuggestionCategory,
    severity: Severity,
    title: &'static str,
    description: &'static str,
    code_example: Option<&'static str>,
    estimated_improvement: &'static str,
    difficulty: Difficulty,
}

/// Stateless; identical inputs give identical suggestions, ids included
#[derive(Debug, Default, Clone, Copy)]
pub struct SuggestionGenerator;

fn build(n: usize, rule: Rule) -> OptimizationSuggestion {
    OptimizationSuggestion {
        suggestion_id: format!("{}_{}", rule.prefix, n),
        category: rule.category,
        severity: rule.severity,
        title: rule.title.to_string(),
        description: rule.description.to_string(),
        code_example: rule.code_example.map(str::to_string),
        estimated_improvement: rule.estimated_improvement.to_string(),
        difficulty: rule.difficulty,
    }
}

impl SuggestionGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Ordered suggestions for a benchmarked run
    pub fn generate(&self, code: &str, language: Language, benchmark: &BenchmarkResult) -> Vec<OptimizationSuggestion> {
        let mut rules = Vec::new();
        rules.extend(performance_rules(benchmark));
        rules.extend(complexity_rules(benchmark.algorithm_complexity, language));
        rules.extend(language_rules(code, language));
        if benchmark.memory_usage > 500 {
            rules.push(Rule {
                prefix: "mem",
                category: SuggestionCategory::Memory,
                severity: Severity::Major,
                title: "High memory usage",
                description: "The program holds a lot of memory; release or stream large structures",
                code_example: None,
                estimated_improvement: "30-50% less memory",
                difficulty: Difficulty::Medium,
            });
        }
        if benchmark.complexity_score > 70 {
            rules.push(Rule {
                prefix: "complex",
                category: SuggestionCategory::Style,
                severity: Severity::Minor,
                title: "High structural complexity",
                description: "Split large functions into smaller ones and flatten deep nesting",
                code_example: None,
                estimated_improvement: "easier maintenance",
                difficulty: Difficulty::Medium,
            });
        }

        rules.into_iter().take(MAX_SUGGESTIONS).enumerate().map(|(n, r)| build(n, r)).collect()
    }

    /// Plain-text hints for a failed run, keyed on what went wrong
    pub fn for_failure(result: &ExecutionResult) -> Vec<String> {
        let error = result.error.as_deref().unwrap_or_default().to_lowercase();
        let mut out = Vec::new();
        match result.error_kind {
            Some(ErrorKind::Timeout) => {
                out.push("Check for infinite loops or inefficient algorithms".to_string());
                out.push("Consider a faster algorithm or smaller input".to_string());
            }
            Some(ErrorKind::CompileError) => {
                out.push("Check the syntax and declarations reported by the compiler".to_string());
            }
            Some(ErrorKind::UnsupportedLanguage) => {
                out.push("Pick one of the supported languages".to_string());
            }
            Some(ErrorKind::ToolchainUnavailable) => {
                out.push("Install the language toolchain or configure the remote judge".to_string());
            }
            _ => {}
        }
        if error.contains("memory") {
            out.push("Reduce the size of large data structures".to_string());
        }
        if error.contains("syntax") && result.error_kind != Some(ErrorKind::CompileError) {
            out.push("Check for syntax errors".to_string());
        }
        out
    }
}

fn performance_rules(benchmark: &BenchmarkResult) -> Option<Rule> {
    let score = benchmark.performance_score;
    (score < 70.0).then(|| Rule {
        prefix: "perf",
        category: SuggestionCategory::Performance,
        severity: if score < 50.0 { Severity::Major } else { Severity::Minor },
        title: "Low performance score",
        description: "Execution is slower than expected for this complexity; profile the hot path",
        code_example: None,
        estimated_improvement: "20-40% faster",
        difficulty: Difficulty::Medium,
    })
}

/// Before/after rewrite for a language and complexity class, if we have one
fn algorithm_example(language: Language, class: ComplexityClass) -> Option<&'static str> {
    let example = match (language, class) {
        (Language::Python, ComplexityClass::Quadratic) => {
            "# Before: O(n^2)\n\
             for i in range(len(arr)):\n\
             \x20   for j in range(len(arr)):\n\
             \x20       if arr[i] + arr[j] == target:\n\
             \x20           return True\n\
             \n\
             # After: O(n)\n\
             seen = set()\n\
             for x in arr:\n\
             \x20   if target - x in seen:\n\
             \x20       return True\n\
             \x20   seen.add(x)"
        }
        (Language::Python, ComplexityClass::Cubic) => {
            "# Before: O(n^3) triple loop over the input\n\
             # After: index one dimension in a dict so only two loops remain"
        }
        (Language::Python, ComplexityClass::Exponential) => {
            "# Before: O(2^n)\n\
             def fibonacci(n):\n\
             \x20   if n <= 1: return n\n\
             \x20   return fibonacci(n - 1) + fibonacci(n - 2)\n\
             \n\
             # After: O(n)\n\
             def fibonacci(n):\n\
             \x20   if n <= 1: return n\n\
             \x20   a, b = 0, 1\n\
             \x20   for _ in range(2, n + 1):\n\
             \x20       a, b = b, a + b\n\
             \x20   return b"
        }
        (Language::Javascript | Language::Typescript, ComplexityClass::Quadratic) => {
            "// Before: O(n^2)\n\
             for (let i = 0; i < arr.length; i++)\n\
             \x20 for (let j = 0; j < arr.length; j++)\n\
             \x20   if (arr[i] + arr[j] === target) return true;\n\
             \n\
             // After: O(n)\n\
             const seen = new Set();\n\
             for (const x of arr) {\n\
             \x20 if (seen.has(target - x)) return true;\n\
             \x20 seen.add(x);\n\
             }"
        }
        (Language::Javascript | Language::Typescript, ComplexityClass::Exponential) => {
            "// Before: O(2^n)\n\
             const fib = (n) => (n <= 1 ? n : fib(n - 1) + fib(n - 2));\n\
             \n\
             // After: O(n)\n\
             const fib = (n) => {\n\
             \x20 let [a, b] = [0, 1];\n\
             \x20 for (let i = 0; i < n; i++) [a, b] = [b, a + b];\n\
             \x20 return a;\n\
             };"
        }
        _ => return None,
    };
    Some(example)
}

fn complexity_rules(class: ComplexityClass, language: Language) -> Option<Rule> {
    match class {
        ComplexityClass::Quadratic => Some(Rule {
            prefix: "algo",
            category: SuggestionCategory::Algorithm,
            severity: Severity::Major,
            title: "Quadratic time complexity",
            description: "Nested loops over the input; a hash lookup or sorting can often remove one level",
            code_example: algorithm_example(language, class),
            estimated_improvement: "O(n^2) to O(n)",
            difficulty: Difficulty::Medium,
        }),
        ComplexityClass::Cubic => Some(Rule {
            prefix: "algo",
            category: SuggestionCategory::Algorithm,
            severity: Severity::Critical,
            title: "Cubic time complexity",
            description: "Three nested loops scale poorly; restructure the algorithm",
            code_example: algorithm_example(language, class),
            estimated_improvement: "orders of magnitude on large inputs",
            difficulty: Difficulty::Hard,
        }),
        ComplexityClass::Exponential => Some(Rule {
            prefix: "algo",
            category: SuggestionCategory::Algorithm,
            severity: Severity::Critical,
            title: "Exponential time complexity",
            description: "Repeated recursive calls recompute the same values; add memoization",
            code_example: algorithm_example(language, class),
            estimated_improvement: "O(2^n) to O(n)",
            difficulty: Difficulty::Easy,
        }),
        _ => None,
    }
}

fn language_rules(code: &str, language: Language) -> Vec<Rule> {
    let mut rules = Vec::new();
    let mut idiom = |title, description, code_example, improvement| {
        rules.push(Rule {
            prefix: "lang",
            category: SuggestionCategory::Syntax,
            severity: Severity::Minor,
            title,
            description,
            code_example,
            estimated_improvement: improvement,
            difficulty: Difficulty::Easy,
        })
    };

    match language {
        Language::Python => {
            if PY_RANGE_LEN.is_match(code) {
                idiom(
                    "Use enumerate()",
                    "Iterate directly or use enumerate() instead of range(len())",
                    Some("for i, item in enumerate(items):\n    print(i, item)"),
                    "cleaner code",
                );
            }
            if PY_STR_CONCAT.is_match(code) {
                idiom(
                    "Use f-strings",
                    "f-strings are faster and clearer than concatenating str() calls",
                    Some("message = f\"total: {total}\""),
                    "slightly faster string building",
                );
            }
            if count(code, "print(") > 5 {
                idiom(
                    "Batch output",
                    "Many print() calls; join the output and print once",
                    Some("print(\"\\n\".join(lines))"),
                    "faster output",
                );
            }
        }
        Language::Javascript | Language::Typescript => {
            if JS_VAR.is_match(code) {
                idiom("Use let or const", "Prefer block-scoped let/const over var", Some("const total = 0;"), "fewer scoping bugs");
            }
            if JS_LOOSE_EQ.is_match(code) {
                idiom("Use strict equality", "Use === instead of == to avoid implicit coercion", Some("if (a === b) {}"), "fewer coercion bugs");
            }
        }
        Language::Java => {
            if JAVA_STRING_CONCAT.is_match(code) {
                idiom(
                    "Use StringBuilder",
                    "Repeated String concatenation allocates a new string each time",
                    Some("StringBuilder sb = new StringBuilder();\nsb.append(x);"),
                    "faster string building",
                );
            }
            if count(code, "System.out.println") > 3 {
                idiom(
                    "Buffer output",
                    "Many println calls; collect output in a StringBuilder or PrintWriter",
                    None,
                    "faster output",
                );
            }
        }
        Language::Cpp => {
            if CPP_MALLOC.is_match(code) {
                idiom("Prefer RAII containers", "Use std::vector or smart pointers instead of malloc", Some("std::vector<int> v(n);"), "no manual frees");
            }
            if inside_loop(code, "endl") {
                idiom("Avoid std::endl in loops", "std::endl flushes on every line; use '\\n'", Some("std::cout << x << '\\n';"), "faster output");
            }
        }
        Language::Go => {
            if count(code, "fmt.Println") > 5 {
                idiom("Buffer output", "Use bufio.Writer for many lines of output", Some("w := bufio.NewWriter(os.Stdout)\ndefer w.Flush()"), "faster output");
            }
        }
        Language::Rust => {
            if inside_loop(code, ".clone()") {
                idiom("Avoid cloning in loops", "Borrow instead of cloning inside hot loops", Some("for item in &items {\n    process(item);\n}"), "fewer allocations");
            }
            if RUST_UNWRAP.is_match(code) {
                idiom("Handle errors explicitly", "Propagate errors with ? instead of unwrap()", None, "no panics on bad input");
            }
        }
        _ => {}
    }
    rules
}
