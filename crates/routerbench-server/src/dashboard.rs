use indexmap::IndexMap;
use routerbench_benchmark::normalize;
use routerbench_core::metrics::{OUTPUT_TOKEN_THROUGHPUT, REQUEST_LATENCY};
use routerbench_core::{parse_number, MetricMap, ModelSpec, PathsConfig};
use serde::Serialize;

/// Fixed point order of the latency chart, with the stat label each reads.
const LATENCY_POINTS: [(&str, &str); 6] = [
    ("Min", "min"),
    ("p75", "p75"),
    ("Avg", "avg"),
    ("p90", "p90"),
    ("p99", "p99"),
    ("Max", "max"),
];

#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub metrics: MetricMap,
    /// True when the model's directory held a genai-perf CSV.
    pub exists: bool,
    pub key: String,
}

/// Display name to entry, in configured model order.
pub type DashboardResults = IndexMap<String, ModelEntry>;

/// Re-reads every configured model's artifacts from disk.
pub fn collect(models: &[ModelSpec], paths: &PathsConfig) -> DashboardResults {
    models
        .iter()
        .map(|model| {
            let entry = match normalize(model, &paths.model_dir(&model.key)) {
                Some(result) if result.has_tabular_output() => ModelEntry {
                    metrics: result.metrics,
                    exists: true,
                    key: model.key.clone(),
                },
                _ => ModelEntry {
                    metrics: MetricMap::new(),
                    exists: false,
                    key: model.key.clone(),
                },
            };
            (model.name.clone(), entry)
        })
        .collect()
}

pub fn find_by_key<'a>(results: &'a DashboardResults, key: &str) -> Option<(&'a str, &'a ModelEntry)> {
    results
        .iter()
        .find(|(_, entry)| entry.key == key)
        .map(|(name, entry)| (name.as_str(), entry))
}

#[derive(Debug, Serialize)]
pub struct ChartData {
    pub throughput: ThroughputSeries,
    pub latency: LatencySeries,
}

#[derive(Debug, Serialize)]
pub struct ThroughputSeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct LatencySeries {
    pub labels: Vec<&'static str>,
    pub datasets: Vec<LatencyDataset>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub border_width: u32,
    pub fill: bool,
    pub tension: f64,
}

pub fn chart_data(results: &DashboardResults) -> ChartData {
    let mut throughput = ThroughputSeries {
        labels: Vec::new(),
        data: Vec::new(),
    };
    let mut datasets = Vec::new();

    for (name, entry) in results.iter().filter(|(_, e)| e.exists) {
        throughput.labels.push(name.clone());
        throughput.data.push(
            entry
                .metrics
                .get(OUTPUT_TOKEN_THROUGHPUT)
                .and_then(|v| v.as_scalar())
                .and_then(parse_number)
                .unwrap_or(0.0),
        );

        let Some(latency) = entry
            .metrics
            .get(REQUEST_LATENCY)
            .and_then(|v| v.as_percentiles())
        else {
            continue;
        };
        datasets.push(LatencyDataset {
            label: name.clone(),
            data: LATENCY_POINTS
                .iter()
                .map(|(_, stat)| latency.number(stat).unwrap_or(0.0))
                .collect(),
            border_width: 3,
            fill: false,
            tension: 0.4,
        });
    }

    ChartData {
        throughput,
        latency: LatencySeries {
            labels: LATENCY_POINTS.iter().map(|(label, _)| *label).collect(),
            datasets,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routerbench_benchmark::normalizer::PROFILE_CSV;
    use std::fs;
    use tempfile::TempDir;

    const CSV: &str = "Metric,avg,min,max,p99,p90,p75\n\
Request Latency (ms),\"1,234.50\",900.00,\"2,000.00\",1999.00,1800.00,1500.00\n\
\n\
Metric,Value\n\
Output Token Throughput (per sec),\"1,042.30\"\n\
Request Throughput (per sec),0.80\n";

    fn models() -> Vec<ModelSpec> {
        vec![
            ModelSpec::new("Model A", "vendor/a", "a"),
            ModelSpec::new("Model B", "vendor/b", "b"),
            ModelSpec::new("Model C", "vendor/c", "c"),
        ]
    }

    fn fixture() -> (TempDir, PathsConfig) {
        let tmp = TempDir::new().unwrap();
        let paths = PathsConfig::under(tmp.path());
        fs::create_dir_all(paths.model_dir("a")).unwrap();
        fs::write(paths.model_dir("a").join(PROFILE_CSV), CSV).unwrap();
        // directory without a CSV
        fs::create_dir_all(paths.model_dir("b")).unwrap();
        (tmp, paths)
    }

    #[test]
    fn test_collect_marks_missing_models() {
        let (_tmp, paths) = fixture();
        let results = collect(&models(), &paths);

        let names: Vec<_> = results.keys().cloned().collect();
        assert_eq!(names, vec!["Model A", "Model B", "Model C"]);
        assert!(results["Model A"].exists);
        assert!(!results["Model B"].exists);
        assert!(results["Model B"].metrics.is_empty());
        assert!(!results["Model C"].exists);
        assert_eq!(results["Model C"].key, "c");

        let (name, entry) = find_by_key(&results, "a").unwrap();
        assert_eq!(name, "Model A");
        assert_eq!(entry.metrics.len(), 3);
        assert!(find_by_key(&results, "zzz").is_none());
    }

    #[test]
    fn test_chart_data_series() {
        let (_tmp, paths) = fixture();
        let chart = chart_data(&collect(&models(), &paths));

        assert_eq!(chart.throughput.labels, vec!["Model A"]);
        assert_eq!(chart.throughput.data, vec![1042.3]);
        assert_eq!(
            chart.latency.labels,
            vec!["Min", "p75", "Avg", "p90", "p99", "Max"]
        );
        assert_eq!(chart.latency.datasets.len(), 1);
        assert_eq!(
            chart.latency.datasets[0].data,
            vec![900.0, 1500.0, 1234.5, 1800.0, 1999.0, 2000.0]
        );
    }

    #[test]
    fn test_chart_data_defaults_to_zero() {
        let tmp = TempDir::new().unwrap();
        let paths = PathsConfig::under(tmp.path());
        fs::create_dir_all(paths.model_dir("a")).unwrap();
        fs::write(
            paths.model_dir("a").join(PROFILE_CSV),
            "Metric,avg,p99\nRequest Latency (ms),N/A,\n",
        )
        .unwrap();

        let chart = chart_data(&collect(&models()[..1], &paths));
        assert_eq!(chart.throughput.data, vec![0.0]);
        assert_eq!(chart.latency.datasets[0].data, vec![0.0; 6]);

        let json = serde_json::to_value(&chart).unwrap();
        let dataset = &json["latency"]["datasets"][0];
        assert_eq!(dataset["borderWidth"], 3);
        assert_eq!(dataset["fill"], false);
        assert_eq!(dataset["tension"], 0.4);
    }
}
