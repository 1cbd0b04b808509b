use crate::types::{ExecutionPath, ExecutionRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Sink for per-request history entries.
///
/// `append` must not block and must not fail from the caller's view:
/// implementations log their own persistence errors.
pub trait ExecutionHistoryStore: Send + Sync {
    fn append(&self, record: ExecutionRecord);

    /// Most recent records, newest last. Write-only stores return nothing.
    fn recent(&self, _limit: usize) -> Vec<ExecutionRecord> {
        Vec::new()
    }
}

/// Bounded in-process history, oldest entries evicted first
pub struct InMemoryHistory {
    capacity: usize,
    records: Mutex<VecDeque<ExecutionRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionHistoryStore for InMemoryHistory {
    fn append(&self, record: ExecutionRecord) {
        // A poisoned lock only means another append panicked mid-push
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    fn recent(&self, limit: usize) -> Vec<ExecutionRecord> {
        let records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = records.len().saturating_sub(limit);
        records.iter().skip(skip).cloned().collect()
    }
}

/// Writes to every store; reads come from the first one
pub struct HistoryFanout {
    stores: Vec<Arc<dyn ExecutionHistoryStore>>,
}

impl HistoryFanout {
    pub fn new(stores: Vec<Arc<dyn ExecutionHistoryStore>>) -> Self {
        Self { stores }
    }
}

impl ExecutionHistoryStore for HistoryFanout {
    fn append(&self, record: ExecutionRecord) {
        for store in &self.stores {
            store.append(record.clone());
        }
    }

    fn recent(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.stores
            .first()
            .map(|s| s.recent(limit))
            .unwrap_or_default()
    }
}

/// Aggregate view over recorded executions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    pub total_executions: usize,
    pub successful_executions: usize,
    /// Percentage, one decimal
    pub success_rate: f64,
    pub average_performance_score: f64,
    pub average_execution_time: f64,
    pub language_usage: BTreeMap<String, usize>,
    pub by_path: BTreeMap<String, usize>,
    pub most_used_language: Option<String>,
}

impl ExecutionStatistics {
    pub fn from_records(records: &[ExecutionRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let total = records.len();
        let successful = records.iter().filter(|r| r.success).count();

        let mut language_usage = BTreeMap::new();
        let mut by_path = BTreeMap::new();
        for record in records {
            *language_usage.entry(record.language.clone()).or_insert(0) += 1;
            let path = match record.path {
                Some(ExecutionPath::Local) => "local",
                Some(ExecutionPath::Remote) => "remote",
                None => "none",
            };
            *by_path.entry(path.to_string()).or_insert(0) += 1;
        }

        // Ties resolve to the alphabetically first language
        let most_used_language = language_usage
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(lang, _)| lang.clone());

        let scored: Vec<f64> = records
            .iter()
            .filter(|r| r.success)
            .map(|r| r.performance_score)
            .collect();
        let average_performance_score = if scored.is_empty() {
            0.0
        } else {
            round2(scored.iter().sum::<f64>() / scored.len() as f64)
        };

        let average_execution_time =
            round2(records.iter().map(|r| r.execution_time).sum::<f64>() / total as f64);

        Self {
            total_executions: total,
            successful_executions: successful,
            success_rate: (successful as f64 / total as f64 * 1000.0).round() / 10.0,
            average_performance_score,
            average_execution_time,
            language_usage,
            by_path,
            most_used_language,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(language: &str, success: bool, score: f64, path: Option<ExecutionPath>) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            language: language.to_string(),
            path,
            success,
            execution_time: 0.5,
            memory_usage: 10,
            performance_score: score,
            error_kind: None,
            code_hash: None,
            algorithm_complexity: None,
            optimization_level: None,
        }
    }

    #[test]
    fn test_in_memory_history_evicts_oldest() {
        let history = InMemoryHistory::with_capacity(2);
        history.append(record("python", true, 10.0, None));
        history.append(record("java", true, 20.0, None));
        history.append(record("go", true, 30.0, None));

        let recent = history.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].language, "java");
        assert_eq!(recent[1].language, "go");
        assert_eq!(history.recent(1)[0].language, "go");
    }

    #[test]
    fn test_fanout_writes_everywhere() {
        let a = Arc::new(InMemoryHistory::new());
        let b = Arc::new(InMemoryHistory::new());
        let fanout = HistoryFanout::new(vec![a.clone(), b.clone()]);
        fanout.append(record("python", true, 80.0, Some(ExecutionPath::Local)));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(fanout.recent(5).len(), 1);
    }

    #[test]
    fn test_statistics_from_records() {
        let records = vec![
            record("python", true, 80.0, Some(ExecutionPath::Local)),
            record("python", false, 0.0, None),
            record("rust", true, 90.0, Some(ExecutionPath::Remote)),
        ];
        let stats = ExecutionStatistics::from_records(&records);
        assert_eq!(stats.total_executions, 3);
        assert_eq!(stats.successful_executions, 2);
        assert_eq!(stats.success_rate, 66.7);
        assert_eq!(stats.average_performance_score, 85.0);
        assert_eq!(stats.language_usage.get("python"), Some(&2));
        assert_eq!(stats.by_path.get("none"), Some(&1));
        assert_eq!(stats.most_used_language.as_deref(), Some("python"));
    }

    #[test]
    fn test_statistics_empty() {
        let stats = ExecutionStatistics::from_records(&[]);
        assert_eq!(stats.total_executions, 0);
        assert!(stats.most_used_language.is_none());
    }
}
