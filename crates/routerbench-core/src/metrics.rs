use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Marker used wherever the benchmark tool left a value out.
pub const NOT_AVAILABLE: &str = "N/A";

pub const REQUEST_LATENCY: &str = "Request Latency (ms)";
pub const OUTPUT_TOKEN_THROUGHPUT: &str = "Output Token Throughput (per sec)";
pub const TIME_TO_FIRST_TOKEN: &str = "Time to First Token (ms)";

/// Statistic labels carried by the time-to-first-token sidecar record.
pub const TTFT_LABELS: [&str; 9] = ["avg", "min", "max", "p99", "p95", "p90", "p75", "p50", "p25"];

/// Strips quote characters and surrounding whitespace from a raw cell.
/// Empty cells become [`NOT_AVAILABLE`].
pub fn clean_cell(raw: &str) -> String {
    let value = raw.trim().trim_matches('"').trim();
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

/// Parses a tool-formatted number, tolerating thousands separators.
pub fn parse_number(value: &str) -> Option<f64> {
    value.replace(',', "").trim().parse().ok()
}

/// A metric reported as a set of statistics. Every label the record was
/// built with is always present; missing values hold [`NOT_AVAILABLE`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PercentileStats(IndexMap<String, String>);

impl PercentileStats {
    /// Builds a record from header labels and the matching row cells.
    /// Cells beyond the label count are ignored, labels beyond the cell
    /// count get the sentinel.
    pub fn from_cells<L: AsRef<str>, V: AsRef<str>>(labels: &[L], cells: &[V]) -> Self {
        let stats = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let value = cells
                    .get(i)
                    .map(|c| clean_cell(c.as_ref()))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                (clean_cell(label.as_ref()), value)
            })
            .collect();
        Self(stats)
    }

    /// Builds a record by asking `value_for` for each label.
    pub fn from_fn<L, F>(labels: &[L], mut value_for: F) -> Self
    where
        L: AsRef<str>,
        F: FnMut(&str) -> Option<String>,
    {
        let stats = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                let value = value_for(label).unwrap_or_else(|| NOT_AVAILABLE.to_string());
                (label.to_string(), value)
            })
            .collect();
        Self(stats)
    }

    pub fn get(&self, label: &str) -> &str {
        self.0.get(label).map(String::as_str).unwrap_or(NOT_AVAILABLE)
    }

    /// Numeric value for `label`, `None` when absent or not a number.
    pub fn number(&self, label: &str) -> Option<f64> {
        parse_number(self.get(label))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row of tool output: a single value or a statistics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Percentiles(PercentileStats),
    Scalar(String),
}

impl MetricValue {
    pub fn scalar(raw: &str) -> Self {
        MetricValue::Scalar(clean_cell(raw))
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            MetricValue::Scalar(v) => Some(v),
            MetricValue::Percentiles(_) => None,
        }
    }

    pub fn as_percentiles(&self) -> Option<&PercentileStats> {
        match self {
            MetricValue::Percentiles(p) => Some(p),
            MetricValue::Scalar(_) => None,
        }
    }
}

/// Metric name to value, in the order the tool reported them.
pub type MetricMap = IndexMap<String, MetricValue>;
