use codebench_common::types::{ComplexityClass, Language};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Used when a language/class pair has no entry
pub const FALLBACK_TIME_SECS: f64 = 0.01;
pub const FALLBACK_MEMORY_MB: f64 = 50.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageBaseline {
    /// Seconds per complexity class
    #[serde(default)]
    pub time: BTreeMap<ComplexityClass, f64>,
    /// Megabytes per complexity class
    #[serde(default)]
    pub memory: BTreeMap<ComplexityClass, f64>,
}

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("failed to read baselines {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse baselines: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reference time/memory per language and complexity class.
///
/// The built-in figures are a replaceable table; `from_json` overlays
/// entries from `{"python": {"time": {"O(n)": 0.02}, "memory": {...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    table: BTreeMap<Language, LanguageBaseline>,
}

impl Baselines {
    pub fn builtin() -> Self {
        use ComplexityClass::*;
        // (time for O(1), O(n), O(n^2), O(n^3), O(2^n)), (memory for O(1), O(n), O(n^2), O(n^3))
        let rows: [(Language, [f64; 5], [f64; 4]); 10] = [
            (Language::Python, [0.001, 0.01, 0.1, 1.0, 5.0], [10.0, 50.0, 200.0, 1000.0]),
            (Language::Javascript, [0.0005, 0.005, 0.05, 0.5, 3.0], [5.0, 30.0, 150.0, 800.0]),
            (Language::Java, [0.0002, 0.002, 0.02, 0.2, 2.0], [20.0, 80.0, 300.0, 1500.0]),
            (Language::Cpp, [0.0001, 0.001, 0.01, 0.1, 1.0], [8.0, 40.0, 160.0, 800.0]),
            (Language::Go, [0.0003, 0.003, 0.03, 0.3, 2.5], [12.0, 60.0, 240.0, 1200.0]),
            (Language::Rust, [0.0001, 0.001, 0.01, 0.1, 1.0], [6.0, 30.0, 120.0, 600.0]),
            (Language::Php, [0.002, 0.02, 0.2, 2.0, 10.0], [15.0, 75.0, 300.0, 1500.0]),
            (Language::Ruby, [0.003, 0.03, 0.3, 3.0, 15.0], [20.0, 100.0, 400.0, 2000.0]),
            (Language::Typescript, [0.0006, 0.006, 0.06, 0.6, 3.5], [8.0, 40.0, 160.0, 800.0]),
            (Language::Csharp, [0.0002, 0.002, 0.02, 0.2, 2.0], [16.0, 64.0, 256.0, 1280.0]),
        ];

        let time_classes = [Constant, Linear, Quadratic, Cubic, Exponential];
        let memory_classes = [Constant, Linear, Quadratic, Cubic];
        let table = rows
            .iter()
            .map(|(lang, times, mems)| {
                let baseline = LanguageBaseline {
                    time: time_classes.iter().copied().zip(times.iter().copied()).collect(),
                    memory: memory_classes.iter().copied().zip(mems.iter().copied()).collect(),
                };
                (*lang, baseline)
            })
            .collect();
        Self { table }
    }

    pub fn from_json(json: &str) -> Result<Self, BaselineError> {
        let overrides: BTreeMap<Language, LanguageBaseline> = serde_json::from_str(json)?;
        let mut baselines = Self::builtin();
        for (lang, entry) in overrides {
            let slot = baselines.table.entry(lang).or_default();
            slot.time.extend(entry.time);
            slot.memory.extend(entry.memory);
        }
        Ok(baselines)
    }

    pub fn from_file(path: &Path) -> Result<Self, BaselineError> {
        let json = std::fs::read_to_string(path).map_err(|source| BaselineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// (seconds, megabytes) for a language/class pair, falling back to
    /// 0.01 s / 50 MB when either is missing
    pub fn lookup(&self, language: Language, class: ComplexityClass) -> (f64, f64) {
        let entry = self.table.get(&language);
        let time = entry
            .and_then(|b| b.time.get(&class))
            .copied()
            .filter(|t| *t > 0.0)
            .unwrap_or(FALLBACK_TIME_SECS);
        let memory = entry
            .and_then(|b| b.memory.get(&class))
            .copied()
            .filter(|m| *m > 0.0)
            .unwrap_or(FALLBACK_MEMORY_MB);
        (time, memory)
    }
}

impl Default for Baselines {
    fn default() -> Self {
        Self::builtin()
    }
}
