use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::metrics::{MetricMap, MetricValue};

/// Normalized output of one benchmark invocation. Replaced wholesale on re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub key: String,
    pub name: String,
    pub metrics: MetricMap,
    pub timestamp: DateTime<Utc>,
    pub output_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl ModelResult {
    /// True when the tool produced its tabular export for this run.
    pub fn has_tabular_output(&self) -> bool {
        self.csv_file.is_some()
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }
}

/// Results of one coordinated run keyed by model key, in run order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunSummary(IndexMap<String, ModelResult>);

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: ModelResult) {
        self.0.insert(result.key.clone(), result);
    }

    pub fn get(&self, key: &str) -> Option<&ModelResult> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelResult)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn results(&self) -> impl Iterator<Item = &ModelResult> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display name to metrics, the shape handed to the narrative model.
    pub fn metrics_by_name(&self) -> IndexMap<String, MetricMap> {
        self.0
            .values()
            .map(|r| (r.name.clone(), r.metrics.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// Free-text analysis of a [`RunSummary`] and how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSummary {
    pub text: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub models_analyzed: Vec<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(key: &str, name: &str) -> ModelResult {
        ModelResult {
            key: key.to_string(),
            name: name.to_string(),
            metrics: MetricMap::new(),
            timestamp: Utc::now(),
            output_dir: PathBuf::from("results").join(key),
            csv_file: None,
            sidecar_file: None,
            log: None,
        }
    }

    #[test]
    fn test_run_summary_keeps_insertion_order() {
        let mut summary = RunSummary::new();
        summary.insert(result("zeta", "Zeta"));
        summary.insert(result("alpha", "Alpha"));

        let keys: Vec<_> = summary.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let names: Vec<_> = summary.metrics_by_name().into_keys().collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_empty_run_summary_serializes_to_empty_object() {
        let summary = RunSummary::new();
        assert!(summary.is_empty());
        assert_eq!(serde_json::to_string(&summary).unwrap(), "{}");
    }

    #[test]
    fn test_rerun_replaces_result() {
        let mut summary = RunSummary::new();
        summary.insert(result("a", "First"));
        summary.insert(result("a", "Second"));
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.get("a").map(|r| r.name.as_str()), Some("Second"));
    }
}
