// Dependency detection from import/require/use/include statements

use crate::languages::LanguageConfig;
use codebench_common::types::Language;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

/// Names never reported as dependencies
pub const STANDARD_EXCLUSIONS: [&str; 7] = ["std", "system", "os", "sys", "iostream", "vector", "string"];

lazy_static! {
    static ref PYTHON: Vec<Regex> = vec![
        Regex::new(r"(?m)^\s*import\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
        Regex::new(r"(?m)^\s*from\s+([A-Za-z_][A-Za-z0-9_]*)[A-Za-z0-9_.]*\s+import\b").unwrap(),
    ];
    static ref JAVASCRIPT: Vec<Regex> = vec![
        Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
        Regex::new(r#"import\s+(?:[^'";]+?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap(),
    ];
    static ref JAVA: Vec<Regex> = vec![
        Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([A-Za-z_][A-Za-z0-9_.]*(?:\.\*)?)\s*;").unwrap(),
    ];
    static ref GO_SINGLE: Regex = Regex::new(r#"import\s+(?:[A-Za-z_.]+\s+)?"([^"]+)""#).unwrap();
    static ref GO_BLOCK: Regex = Regex::new(r"import\s*\(([^)]*)\)").unwrap();
    static ref GO_BLOCK_ENTRY: Regex = Regex::new(r#""([^"]+)""#).unwrap();
    static ref RUST: Vec<Regex> = vec![
        Regex::new(r"(?m)^\s*(?:pub\s+)?use\s+(?:::)?([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
        Regex::new(r"(?m)^\s*extern\s+crate\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
    ];
    static ref CPP: Vec<Regex> = vec![Regex::new(r#"#include\s*[<"]([^>"]+)[>"]"#).unwrap()];
    static ref PHP: Vec<Regex> = vec![
        Regex::new(r#"\b(?:require|include)(?:_once)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap(),
        Regex::new(r"(?m)^\s*use\s+([A-Za-z_][A-Za-z0-9_\\]*)\s*;").unwrap(),
    ];
    static ref RUBY: Vec<Regex> = vec![
        Regex::new(r#"\brequire(?:_relative)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap(),
    ];
    static ref CSHARP: Vec<Regex> = vec![
        Regex::new(r"(?m)^\s*using\s+(?:static\s+)?([A-Za-z_][A-Za-z0-9_.]*)\s*;").unwrap(),
    ];
}

/// Rust path roots that name the current crate, not a dependency
const RUST_LOCAL_ROOTS: [&str; 3] = ["crate", "self", "super"];

/// Stateless scanner; every call is pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyScanner;

impl DependencyScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, source: &str, language: Language) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        match language {
            Language::Python => collect(&PYTHON, source, &mut found),
            Language::Javascript | Language::Typescript => collect(&JAVASCRIPT, source, &mut found),
            Language::Java => collect(&JAVA, source, &mut found),
            Language::Go => {
                collect(std::slice::from_ref(&*GO_SINGLE), source, &mut found);
                for block in GO_BLOCK.captures_iter(source) {
                    for entry in GO_BLOCK_ENTRY.captures_iter(&block[1]) {
                        found.insert(entry[1].to_string());
                    }
                }
            }
            Language::Rust => {
                collect(&RUST, source, &mut found);
                found.retain(|name| !RUST_LOCAL_ROOTS.contains(&name.as_str()));
            }
            Language::Cpp => collect(&CPP, source, &mut found),
            Language::Php => collect(&PHP, source, &mut found),
            Language::Ruby => collect(&RUBY, source, &mut found),
            Language::Csharp => collect(&CSHARP, source, &mut found),
        }
        found.retain(|name| !STANDARD_EXCLUSIONS.contains(&name.as_str()));
        found
    }

    /// Detected dependencies that appear in the language's known-library list
    pub fn known_libraries(&self, source: &str, config: &LanguageConfig) -> Vec<String> {
        let detected = self.scan(source, config.language);
        config
            .known_libraries
            .iter()
            .filter(|lib| {
                detected
                    .iter()
                    .any(|dep| dep == *lib || dep.starts_with(&format!("{}/", lib)) || dep.starts_with(&format!("{}.", lib)))
            })
            .cloned()
            .collect()
    }
}

fn collect(patterns: &[Regex], source: &str, found: &mut BTreeSet<String>) {
    for pattern in patterns {
        for caps in pattern.captures_iter(source) {
            let name = caps[1].trim();
            if !name.is_empty() {
                found.insert(name.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;

    fn scan(source: &str, language: Language) -> Vec<String> {
        DependencyScanner::new().scan(source, language).into_iter().collect()
    }

    #[test]
    fn test_python_imports() {
        let src = "import numpy as np\nfrom collections import deque\nimport os\nfrom os.path import join\n";
        assert_eq!(scan(src, Language::Python), vec!["collections", "numpy"]);
    }

    #[test]
    fn test_javascript_require_and_import() {
        let src = "const _ = require('lodash');\nimport express from \"express\";\nimport './side-effect';\n";
        assert_eq!(scan(src, Language::Javascript), vec!["./side-effect", "express", "lodash"]);
    }

    #[test]
    fn test_java_imports() {
        let src = "import java.util.List;\nimport static org.junit.Assert.*;\npublic class Main {}";
        assert_eq!(scan(src, Language::Java), vec!["java.util.List", "org.junit.Assert.*"]);
    }

    #[test]
    fn test_go_single_and_grouped() {
        let src = "package main\nimport \"fmt\"\nimport (\n    \"os\"\n    gin \"github.com/gin-gonic/gin\"\n)\n";
        assert_eq!(scan(src, Language::Go), vec!["fmt", "github.com/gin-gonic/gin"]);
    }

    #[test]
    fn test_rust_root_segments() {
        let src = "use std::collections::HashMap;\nuse serde::Deserialize;\nuse crate::foo;\nextern crate rand;\n";
        assert_eq!(scan(src, Language::Rust), vec!["rand", "serde"]);
    }

    #[test]
    fn test_cpp_includes_minus_standard() {
        let src = "#include <iostream>\n#include <vector>\n#include \"boost/any.hpp\"\n#include <map>\n";
        assert_eq!(scan(src, Language::Cpp), vec!["boost/any.hpp", "map"]);
    }

    #[test]
    fn test_csharp_ruby_php() {
        assert_eq!(scan("using System;\nusing System.Linq;\n", Language::Csharp), vec!["System", "System.Linq"]);
        assert_eq!(scan("require 'json'\nrequire_relative 'lib/x'\n", Language::Ruby), vec!["json", "lib/x"]);
        assert_eq!(
            scan("<?php\nrequire_once 'vendor/autoload.php';\nuse Monolog\\Logger;\n", Language::Php),
            vec!["Monolog\\Logger", "vendor/autoload.php"]
        );
    }

    #[test]
    fn test_scan_is_idempotent() {
        let src = "import requests\nimport requests\n";
        let first = scan(src, Language::Python);
        assert_eq!(first, scan(src, Language::Python));
        assert_eq!(first, vec!["requests"]);
    }

    #[test]
    fn test_known_libraries() {
        let registry = LanguageRegistry::builtin();
        let python = registry.get("python").unwrap();
        let libs = DependencyScanner::new().known_libraries("import numpy\nimport pandas as pd\nimport json", python);
        assert_eq!(libs, vec!["numpy", "pandas"]);
    }
}
