//! Language registry: one configuration row per supported language.
//!
//! Built once at startup and shared read-only behind an `Arc`. An optional
//! JSON file can overlay the built-in rows (timeouts, memory ceilings,
//! command templates) without adding new languages.

use crate::backend::ExecError;
use codebench_common::types::Language;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Workspace class name used for Java sources
pub const JAVA_CLASS_NAME: &str = "Main";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub language: Language,
    pub display_name: String,
    /// Primary toolchain binary, looked up on PATH
    pub executable: String,
    pub file_extension: String,
    pub compile_command: Option<String>,
    pub run_command: String,
    pub timeout_secs: u64,
    pub memory_limit_mb: u64,
    pub known_libraries: Vec<String>,
    /// Judge0 language id; `None` means no remote mapping
    pub judge0_id: Option<u32>,
}

impl LanguageConfig {
    /// File name the source is written to inside a workspace
    pub fn source_file_name(&self) -> String {
        match self.language {
            Language::Java => format!("{}{}", JAVA_CLASS_NAME, self.file_extension),
            _ => format!("main{}", self.file_extension),
        }
    }

    /// Name of the compiled artifact inside a workspace
    pub fn output_file_name(&self) -> &'static str {
        match self.language {
            Language::Csharp => "main.exe",
            _ => "main",
        }
    }

    /// Every program the templates invoke, skipping placeholder-only tokens
    pub fn required_programs(&self) -> Vec<String> {
        let mut programs = vec![self.executable.clone()];
        let templates = self.compile_command.iter().chain(std::iter::once(&self.run_command));
        for template in templates {
            if let Some(first) = shlex::split(template).and_then(|t| t.into_iter().next()) {
                if !first.contains('{') && !programs.contains(&first) {
                    programs.push(first);
                }
            }
        }
        programs
    }

    /// Whether every program the language needs is on PATH
    pub fn is_installed(&self) -> bool {
        self.required_programs()
            .iter()
            .all(|program| which::which(program).is_ok())
    }
}

/// Values substituted into command templates
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub file: String,
    pub dir: String,
    pub output: String,
    pub class_name: String,
}

/// Tokenize a command template (shell-style quoting) and fill placeholders.
pub fn render_command(template: &str, ctx: &TemplateContext) -> Result<Vec<String>, ExecError> {
    let tokens = shlex::split(template)
        .ok_or_else(|| ExecError::Internal(format!("malformed command template: {}", template)))?;
    if tokens.is_empty() {
        return Err(ExecError::Internal("empty command template".to_string()));
    }
    Ok(tokens
        .into_iter()
        .map(|t| {
            t.replace("{file}", &ctx.file)
                .replace("{dir}", &ctx.dir)
                .replace("{output}", &ctx.output)
                .replace("{class_name}", &ctx.class_name)
        })
        .collect())
}

lazy_static! {
    static ref JAVA_PUBLIC_CLASS: Regex = Regex::new(r"public\s+(?:final\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref JAVA_ANY_CLASS: Regex = Regex::new(r"\bclass\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref JAVA_IMPORT_LINE: Regex = Regex::new(r"^\s*(import|package)\s").unwrap();
}

/// Per-language source normalization applied before the source hits disk.
///
/// Java needs the public class to match the file name: the first public
/// class (or the first class, if none is public) is renamed to `Main`, and
/// a snippet without any class is wrapped in one. Other languages pass
/// through unchanged.
pub fn normalize_source(language: Language, source: &str) -> String {
    match language {
        Language::Java => normalize_java(source),
        _ => source.to_string(),
    }
}

fn normalize_java(source: &str) -> String {
    let declared = JAVA_PUBLIC_CLASS
        .captures(source)
        .or_else(|| JAVA_ANY_CLASS.captures(source));
    if let Some(caps) = declared {
        let old = &caps[1];
        if old == JAVA_CLASS_NAME {
            return source.to_string();
        }
        // Rename declaration and self references (constructors, static calls)
        let pattern = format!(r"\b{}\b", regex::escape(old));
        return match Regex::new(&pattern) {
            Ok(re) => re.replace_all(source, JAVA_CLASS_NAME).into_owned(),
            Err(_) => source.replacen(old, JAVA_CLASS_NAME, 1),
        };
    }

    // Class-less snippet: keep imports at the top, wrap the rest in main()
    let (imports, body): (Vec<&str>, Vec<&str>) =
        source.lines().partition(|line| JAVA_IMPORT_LINE.is_match(line));
    let mut wrapped = String::new();
    for line in imports {
        wrapped.push_str(line);
        wrapped.push('\n');
    }
    wrapped.push_str(&format!("public class {} {{\n", JAVA_CLASS_NAME));
    wrapped.push_str("    public static void main(String[] args) throws Exception {\n");
    for line in body {
        wrapped.push_str("        ");
        wrapped.push_str(line);
        wrapped.push('\n');
    }
    wrapped.push_str("    }\n}\n");
    wrapped
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read language overrides {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse language overrides: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("language override '{0}' does not name a supported language")]
    UnknownLanguage(String),
    #[error("language override '{name}' has invalid {field}")]
    InvalidField { name: String, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct OverridesFile {
    languages: Vec<LanguageOverride>,
}

#[derive(Debug, Deserialize)]
struct LanguageOverride {
    name: String,
    timeout_secs: Option<u64>,
    memory_limit_mb: Option<u64>,
    compile_command: Option<String>,
    run_command: Option<String>,
    executable: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    configs: BTreeMap<Language, LanguageConfig>,
}

impl LanguageRegistry {
    pub fn builtin() -> Self {
        let configs = Language::ALL
            .iter()
            .map(|lang| (*lang, builtin_config(*lang)))
            .collect();
        Self { configs }
    }

    /// Built-in table overlaid with the JSON file at `path`
    pub fn with_overrides(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut registry = Self::builtin();
        registry.apply_overrides(&content)?;
        info!(path = %path.display(), "Loaded language overrides");
        Ok(registry)
    }

    pub fn apply_overrides(&mut self, json: &str) -> Result<(), RegistryError> {
        let file: OverridesFile = serde_json::from_str(json)?;
        for entry in file.languages {
            let language = Language::parse(&entry.name)
                .ok_or_else(|| RegistryError::UnknownLanguage(entry.name.clone()))?;
            let config = self
                .configs
                .get_mut(&language)
                .ok_or_else(|| RegistryError::UnknownLanguage(entry.name.clone()))?;

            if let Some(timeout) = entry.timeout_secs {
                if timeout == 0 {
                    return Err(RegistryError::InvalidField { name: entry.name, field: "timeout_secs" });
                }
                config.timeout_secs = timeout;
            }
            if let Some(memory) = entry.memory_limit_mb {
                config.memory_limit_mb = memory;
            }
            if let Some(compile) = entry.compile_command {
                // Empty string removes the compile step
                config.compile_command = if compile.trim().is_empty() { None } else { Some(compile) };
            }
            if let Some(run) = entry.run_command {
                if shlex::split(&run).map_or(true, |t| t.is_empty()) {
                    return Err(RegistryError::InvalidField { name: entry.name, field: "run_command" });
                }
                config.run_command = run;
            }
            if let Some(executable) = entry.executable {
                config.executable = executable;
            }
            debug!(language = %language, "Applied language override");
        }
        Ok(())
    }

    /// Look up a language by id or alias
    pub fn get(&self, id: &str) -> Result<&LanguageConfig, ExecError> {
        Language::parse(id)
            .and_then(|lang| self.configs.get(&lang))
            .ok_or_else(|| ExecError::UnsupportedLanguage {
                language: id.to_string(),
                supported: Language::valid_ids().join(", "),
            })
    }

    pub fn config(&self, language: Language) -> Option<&LanguageConfig> {
        self.configs.get(&language)
    }

    /// Languages in stable table order
    pub fn list(&self) -> Vec<Language> {
        self.configs.keys().copied().collect()
    }

    pub fn configs(&self) -> impl Iterator<Item = &LanguageConfig> {
        self.configs.values()
    }

    pub fn is_installed(&self, language: Language) -> bool {
        self.configs.get(&language).map_or(false, |c| c.is_installed())
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn libs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn builtin_config(language: Language) -> LanguageConfig {
    let (display, executable, ext, compile, run, timeout, memory, known, judge0): (
        &str,
        &str,
        &str,
        Option<&str>,
        &str,
        u64,
        u64,
        Vec<String>,
        u32,
    ) = match language {
        Language::Python => (
            "Python", "python3", ".py", None, "python3 {file}", 15, 256,
            libs(&["numpy", "pandas", "matplotlib", "requests"]), 71,
        ),
        Language::Javascript => (
            "JavaScript", "node", ".js", None, "node {file}", 10, 128,
            libs(&["express", "lodash", "axios", "moment"]), 63,
        ),
        Language::Typescript => (
            "TypeScript", "ts-node", ".ts", None, "ts-node {file}", 15, 256,
            libs(&["@types/node", "typescript"]), 74,
        ),
        Language::Java => (
            "Java", "javac", ".java", Some("javac {file}"), "java -cp {dir} {class_name}", 20, 512,
            libs(&["spring", "junit", "maven"]), 62,
        ),
        Language::Cpp => (
            "C++", "g++", ".cpp", Some("g++ -O2 -o {output} {file}"), "{output}", 15, 256,
            libs(&["std", "boost", "opencv"]), 54,
        ),
        Language::Go => (
            "Go", "go", ".go", None, "go run {file}", 15, 256,
            libs(&["gin", "gorm", "testify"]), 60,
        ),
        Language::Rust => (
            "Rust", "rustc", ".rs", Some("rustc -O {file} -o {output}"), "{output}", 20, 256,
            libs(&["serde", "tokio", "reqwest"]), 73,
        ),
        Language::Php => (
            "PHP", "php", ".php", None, "php {file}", 10, 128,
            libs(&["composer", "laravel", "symfony"]), 68,
        ),
        Language::Ruby => (
            "Ruby", "ruby", ".rb", None, "ruby {file}", 15, 256,
            libs(&["rails", "sinatra", "rspec"]), 72,
        ),
        Language::Csharp => (
            "C#", "mcs", ".cs", Some("mcs -out:{output} {file}"), "mono {output}", 20, 512,
            libs(&["asp.net", "entity-framework", "xunit"]), 51,
        ),
    };

    LanguageConfig {
        language,
        display_name: display.to_string(),
        executable: executable.to_string(),
        file_extension: ext.to_string(),
        compile_command: compile.map(str::to_string),
        run_command: run.to_string(),
        timeout_secs: timeout,
        memory_limit_mb: memory,
        known_libraries: known,
        judge0_id: Some(judge0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebench_common::types::ErrorKind;

    #[test]
    fn test_builtin_has_every_language() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.list().len(), 10);
        assert_eq!(registry.list(), Language::ALL.to_vec());
    }

    #[test]
    fn test_builtin_limits() {
        let registry = LanguageRegistry::builtin();
        let python = registry.get("python").unwrap();
        assert_eq!(python.timeout_secs, 15);
        assert_eq!(python.memory_limit_mb, 256);
        assert_eq!(python.judge0_id, Some(71));

        let java = registry.get("JAVA").unwrap();
        assert_eq!(java.timeout_secs, 20);
        assert_eq!(java.memory_limit_mb, 512);
        assert_eq!(java.run_command, "java -cp {dir} {class_name}");

        assert_eq!(registry.get("js").unwrap().timeout_secs, 10);
        assert_eq!(registry.get("c#").unwrap().judge0_id, Some(51));
    }

    #[test]
    fn test_unknown_language_lists_valid_ids() {
        let registry = LanguageRegistry::builtin();
        let err = registry.get("cobol").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
        let msg = err.to_string();
        assert!(msg.contains("cobol"));
        assert!(msg.contains("python, javascript"));
    }

    #[test]
    fn test_render_command_placeholders() {
        let ctx = TemplateContext {
            file: "/tmp/ws/Main.java".into(),
            dir: "/tmp/ws".into(),
            output: "/tmp/ws/main".into(),
            class_name: "Main".into(),
        };
        let argv = render_command("java -cp {dir} {class_name}", &ctx).unwrap();
        assert_eq!(argv, vec!["java", "-cp", "/tmp/ws", "Main"]);

        let argv = render_command("mcs -out:{output} {file}", &ctx).unwrap();
        assert_eq!(argv, vec!["mcs", "-out:/tmp/ws/main", "/tmp/ws/Main.java"]);
    }

    #[test]
    fn test_render_command_rejects_unbalanced_quotes() {
        let ctx = TemplateContext {
            file: "a".into(),
            dir: "b".into(),
            output: "c".into(),
            class_name: "d".into(),
        };
        assert!(render_command("python3 '{file}", &ctx).is_err());
    }

    #[test]
    fn test_required_programs_skip_placeholders() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.get("cpp").unwrap().required_programs(), vec!["g++"]);
        assert_eq!(registry.get("java").unwrap().required_programs(), vec!["javac", "java"]);
        assert_eq!(registry.get("csharp").unwrap().required_programs(), vec!["mcs", "mono"]);
    }

    #[test]
    fn test_overrides_apply_to_known_languages() {
        let mut registry = LanguageRegistry::builtin();
        registry
            .apply_overrides(r#"{"languages":[{"name":"python","timeout_secs":3,"executable":"python3.12","run_command":"python3.12 {file}"}]}"#)
            .unwrap();
        let python = registry.get("python").unwrap();
        assert_eq!(python.timeout_secs, 3);
        assert_eq!(python.executable, "python3.12");
        assert_eq!(python.memory_limit_mb, 256);
    }

    #[test]
    fn test_overrides_reject_unknown_language() {
        let mut registry = LanguageRegistry::builtin();
        let err = registry
            .apply_overrides(r#"{"languages":[{"name":"fortran","timeout_secs":3}]}"#)
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownLanguage(ref n) if n == "fortran"));
    }

    #[test]
    fn test_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("languages.json");
        std::fs::write(&path, r#"{"languages":[{"name":"go","memory_limit_mb":64}]}"#).unwrap();
        let registry = LanguageRegistry::with_overrides(&path).unwrap();
        assert_eq!(registry.get("go").unwrap().memory_limit_mb, 64);

        let missing = LanguageRegistry::with_overrides(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(RegistryError::Io { .. })));
    }

    #[test]
    fn test_java_public_class_renamed() {
        let src = "public class Solution {\n  public static void main(String[] a) { new Solution(); }\n}";
        let out = normalize_source(Language::Java, src);
        assert!(out.contains("public class Main"));
        assert!(out.contains("new Main()"));
        assert!(!out.contains("Solution"));
    }

    #[test]
    fn test_java_snippet_wrapped() {
        let src = "import java.util.*;\nSystem.out.println(\"hi\");";
        let out = normalize_source(Language::Java, src);
        assert!(out.starts_with("import java.util.*;\npublic class Main {"));
        assert!(out.contains("public static void main(String[] args)"));
        assert!(out.contains("System.out.println(\"hi\");"));
    }

    #[test]
    fn test_other_languages_untouched() {
        let src = "print('hi')";
        assert_eq!(normalize_source(Language::Python, src), src);
    }
}
