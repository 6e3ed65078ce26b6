//! Turns genai-perf artifacts into a [`ModelResult`].
//!
//! The tabular export holds two tables back to back: a statistics table
//! headed `Metric,avg,min,...` and a single-value table headed
//! `Metric,Value`. The format is not versioned, so parsing is row-tolerant:
//! a row that cannot be read is dropped and the rest of the file still counts.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use routerbench_core::metrics::{TIME_TO_FIRST_TOKEN, TTFT_LABELS};
use routerbench_core::{
    clean_cell, MetricMap, MetricValue, ModelResult, ModelSpec, PercentileStats, NOT_AVAILABLE,
};
use serde_json::Value;
use tracing::{debug, warn};

pub const PROFILE_CSV: &str = "profile_export_genai_perf.csv";
pub const PROFILE_JSON: &str = "profile_export_genai_perf.json";
pub const LOG_FILE: &str = "genai_perf.log";

const CSV_SUFFIX: &str = "_genai_perf.csv";
const METRIC_HEADER: &str = "Metric";
const VALUE_HEADER: &str = "Value";
const TTFT_FIELD: &str = "time_to_first_token";

/// Position of the CSV decoder within the two-table layout.
#[derive(Debug, Clone, PartialEq)]
enum Section {
    /// Before any header row
    Start,
    /// Inside the statistics table, with its column labels
    Percentiles(Vec<String>),
    /// Blank rows after the statistics table
    Separator,
    /// Inside the `Metric,Value` table
    Scalars,
    /// Past the last recognised table
    Done,
}

fn bare(cell: &str) -> &str {
    cell.trim().trim_matches('"').trim()
}

fn is_blank(cells: &[&str]) -> bool {
    cells.iter().all(|c| bare(c).is_empty())
}

fn header_section(cells: &[&str]) -> Option<Section> {
    if cells.first().map(|c| bare(c)) != Some(METRIC_HEADER) {
        return None;
    }
    if cells.get(1).map(|c| bare(c)) == Some(VALUE_HEADER) {
        return Some(Section::Scalars);
    }
    let labels = cells[1..].iter().map(|c| clean_cell(c)).collect();
    Some(Section::Percentiles(labels))
}

fn metric_name(cells: &[&str]) -> Option<String> {
    let name = clean_cell(cells.first()?);
    (name != NOT_AVAILABLE).then_some(name)
}

fn step(section: Section, cells: &[&str], metrics: &mut MetricMap) -> Section {
    if section == Section::Done {
        return Section::Done;
    }
    if let Some(next) = header_section(cells) {
        return next;
    }

    match section {
        Section::Start => Section::Start,
        Section::Percentiles(labels) => {
            if is_blank(cells) {
                return Section::Separator;
            }
            match metric_name(cells) {
                Some(name) if cells.len() >= 2 => {
                    let stats = PercentileStats::from_cells(&labels, &cells[1..]);
                    metrics.insert(name, MetricValue::Percentiles(stats));
                }
                _ => debug!("Skipping malformed statistics row: {:?}", cells),
            }
            Section::Percentiles(labels)
        }
        Section::Separator if is_blank(cells) => Section::Separator,
        Section::Separator => Section::Done,
        Section::Scalars => {
            if is_blank(cells) || cells.len() < 2 {
                return Section::Done;
            }
            match metric_name(cells) {
                Some(name) => {
                    metrics.insert(name, MetricValue::scalar(cells[1]));
                }
                None => debug!("Skipping unnamed value row: {:?}", cells),
            }
            Section::Scalars
        }
        Section::Done => Section::Done,
    }
}

/// True when the bytes at `start` begin with an empty line. The csv reader
/// skips empty lines without yielding a record, so they are detected here.
fn skipped_blank_line(bytes: &[u8], start: usize) -> bool {
    let mut rest = bytes.get(start..).unwrap_or_default();
    // the '\n' of a CRLF terminator is consumed by the following read
    if start > 0 && bytes[start - 1] == b'\r' {
        rest = rest.strip_prefix(b"\n").unwrap_or(rest);
    }
    matches!(rest.first(), Some(b'\n' | b'\r'))
}

/// Parses the two-table CSV export. Never fails: unreadable rows are skipped.
pub fn parse_profile_csv<R: Read>(mut input: R) -> MetricMap {
    let mut bytes = Vec::new();
    if let Err(e) = input.read_to_end(&mut bytes) {
        warn!("Stopped reading CSV: {}", e);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut metrics = MetricMap::new();
    let mut section = Section::Start;
    let mut record = csv::StringRecord::new();

    loop {
        let start = reader.position().byte() as usize;
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!("Skipping unreadable CSV row: {}", e);
                if reader.position().byte() as usize == start {
                    break;
                }
                continue;
            }
        }
        if skipped_blank_line(&bytes, start) {
            section = step(section, &[], &mut metrics);
        }
        let cells: Vec<&str> = record.iter().collect();
        section = step(section, &cells, &mut metrics);
    }

    metrics
}

pub fn parse_profile_csv_file(path: &Path) -> MetricMap {
    match File::open(path) {
        Ok(file) => parse_profile_csv(file),
        Err(e) => {
            warn!("Cannot open {}: {}", path.display(), e);
            MetricMap::new()
        }
    }
}

/// Overlays the sidecar's time-to-first-token statistics onto `metrics`.
/// Returns false when the sidecar has no such object.
pub fn merge_sidecar(metrics: &mut MetricMap, sidecar: &Value) -> bool {
    let Some(ttft) = sidecar.get(TTFT_FIELD).and_then(Value::as_object) else {
        return false;
    };

    let stats = PercentileStats::from_fn(&TTFT_LABELS, |label| {
        ttft.get(label)
            .and_then(Value::as_f64)
            .map(|v| format!("{:.2}", v))
    });
    metrics.insert(
        TIME_TO_FIRST_TOKEN.to_string(),
        MetricValue::Percentiles(stats),
    );
    true
}

fn read_sidecar(path: &Path) -> Option<Value> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed sidecar {}: {}", path.display(), e);
            None
        }
    }
}

/// Finds the tabular export, preferring the tool's default file name.
pub fn locate_csv(dir: &Path) -> Option<PathBuf> {
    let preferred = dir.join(PROFILE_CSV);
    if preferred.is_file() {
        return Some(preferred);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(CSV_SUFFIX))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Reads every artifact under `dir` for `model`.
///
/// Returns `None` only when `dir` does not exist, which means the tool never
/// ran. A directory without any parsable file yields a result with no metrics.
pub fn normalize(model: &ModelSpec, dir: &Path) -> Option<ModelResult> {
    if !dir.is_dir() {
        return None;
    }

    let csv_file = locate_csv(dir);
    let mut metrics = csv_file
        .as_deref()
        .map(parse_profile_csv_file)
        .unwrap_or_default();

    let sidecar_path = dir.join(PROFILE_JSON);
    let sidecar_file = if sidecar_path.is_file() {
        if let Some(sidecar) = read_sidecar(&sidecar_path) {
            merge_sidecar(&mut metrics, &sidecar);
        }
        Some(sidecar_path)
    } else {
        None
    };

    let log = std::fs::read(dir.join(LOG_FILE))
        .ok()
        .map(|raw| String::from_utf8_lossy(&raw).into_owned());

    let timestamp = csv_file
        .as_deref()
        .and_then(modified_at)
        .unwrap_or_else(Utc::now);

    debug!(
        model = %model.key,
        metrics = metrics.len(),
        "Normalized results from {}",
        dir.display()
    );

    Some(ModelResult {
        key: model.key.clone(),
        name: model.name.clone(),
        metrics,
        timestamp,
        output_dir: dir.to_path_buf(),
        csv_file,
        sidecar_file,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use routerbench_core::metrics::{OUTPUT_TOKEN_THROUGHPUT, REQUEST_LATENCY};
    use tempfile::TempDir;

    const EXPORT: &str = "\
Metric,avg,min,max,p99,p90,p75
Time To First Token (ms),\"1,234.56\",\"1,001.00\",\"1,500.10\",\"1,499.00\",\"1,400.00\",\"1,300.00\"
\"Request Latency (ms)\",\"120.5\",\"80.0\",\"200.0\",\"190.0\",\"150.0\",\"130.0\"
Output Sequence Length (tokens),88.2,12.0,,240.0,190.0,

Metric,Value
Output Token Throughput (per sec),42.3
Request Throughput (per sec),0.82
Request Count (count),
";

    fn model() -> ModelSpec {
        ModelSpec::new("GPT-4o Mini", "openai/gpt-4o-mini", "gpt-4o-mini")
    }

    fn stats(metrics: &MetricMap, name: &str) -> PercentileStats {
        metrics
            .get(name)
            .and_then(MetricValue::as_percentiles)
            .cloned()
            .unwrap_or_else(|| panic!("{} is not a percentile record", name))
    }

    #[test]
    fn test_statistics_row() {
        let input = "Metric,avg,min,max,p99,p90\n\"Request Latency (ms)\",\"120.5\",\"80.0\",\"200.0\",\"190.0\",\"150.0\"\n";
        let metrics = parse_profile_csv(input.as_bytes());

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Request Latency (ms)": {
                    "avg": "120.5", "min": "80.0", "max": "200.0", "p99": "190.0", "p90": "150.0"
                }
            })
        );
    }

    #[test]
    fn test_value_table() {
        let input = "Metric,Value\n\"Output Token Throughput (per sec)\",\"42.3\"\n";
        let metrics = parse_profile_csv(input.as_bytes());
        assert_eq!(
            metrics.get(OUTPUT_TOKEN_THROUGHPUT),
            Some(&MetricValue::Scalar("42.3".to_string()))
        );
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn test_full_export() {
        let metrics = parse_profile_csv(EXPORT.as_bytes());
        let names: Vec<_> = metrics.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "Time To First Token (ms)",
                REQUEST_LATENCY,
                "Output Sequence Length (tokens)",
                OUTPUT_TOKEN_THROUGHPUT,
                "Request Throughput (per sec)",
                "Request Count (count)",
            ]
        );

        let ttft = stats(&metrics, "Time To First Token (ms)");
        assert_eq!(ttft.get("avg"), "1,234.56");
        assert_eq!(ttft.number("avg"), Some(1234.56));

        let latency = stats(&metrics, REQUEST_LATENCY);
        assert_eq!(latency.get("p75"), "130.0");
    }

    #[test]
    fn test_empty_cells_become_sentinel() {
        let metrics = parse_profile_csv(EXPORT.as_bytes());
        let osl = stats(&metrics, "Output Sequence Length (tokens)");
        assert_eq!(osl.get("max"), NOT_AVAILABLE);
        assert_eq!(osl.get("p75"), NOT_AVAILABLE);
        assert_eq!(osl.len(), 6);
        assert_eq!(
            metrics.get("Request Count (count)"),
            Some(&MetricValue::Scalar(NOT_AVAILABLE.to_string()))
        );

        let json = serde_json::to_string(&metrics).unwrap();
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_short_row_fills_missing_labels() {
        let input = "Metric,avg,min,max\nLatency,5\n";
        let metrics = parse_profile_csv(input.as_bytes());
        let latency = stats(&metrics, "Latency");
        assert_eq!(latency.get("avg"), "5");
        assert_eq!(latency.get("min"), NOT_AVAILABLE);
        assert_eq!(latency.get("max"), NOT_AVAILABLE);
    }

    #[test]
    fn test_malformed_row_is_omitted() {
        let input = "Metric,avg,min\nLonely\nGood,1,2\n,3,4\n";
        let metrics = parse_profile_csv(input.as_bytes());
        assert_eq!(metrics.len(), 1);
        assert_eq!(stats(&metrics, "Good").get("min"), "2");
    }

    #[test]
    fn test_invalid_utf8_row_is_omitted() {
        let mut input = b"Metric,avg\nBad,\xff\xfe\nGood,7\n".to_vec();
        input.extend_from_slice(b"\nMetric,Value\nCount,3\n");
        let metrics = parse_profile_csv(input.as_slice());
        assert!(metrics.get("Bad").is_none());
        assert_eq!(stats(&metrics, "Good").get("avg"), "7");
        assert_eq!(metrics.get("Count").and_then(MetricValue::as_scalar), Some("3"));
    }

    #[test]
    fn test_missing_sections() {
        assert!(parse_profile_csv("".as_bytes()).is_empty());
        assert!(parse_profile_csv("garbage,row\nmore,garbage\n".as_bytes()).is_empty());

        let only_stats = parse_profile_csv("Metric,avg\nA,1\n".as_bytes());
        assert_eq!(only_stats.len(), 1);
    }

    #[test]
    fn test_comma_only_row_separates_tables() {
        let input = "Metric,avg,min\nA,1,2\n,,\nMetric,Value\nB,3\n";
        let metrics = parse_profile_csv(input.as_bytes());
        assert_eq!(stats(&metrics, "A").get("avg"), "1");
        assert_eq!(metrics.get("B").and_then(MetricValue::as_scalar), Some("3"));
    }

    #[test]
    fn test_empty_line_ends_statistics_table() {
        let input = "Metric,avg,min\nA,1,2\n\nStray Row,9,9\n";
        let metrics = parse_profile_csv(input.as_bytes());
        let keys: Vec<_> = metrics.keys().cloned().collect();
        assert_eq!(keys, vec!["A"]);
    }

    #[test]
    fn test_empty_line_then_value_table() {
        let input = "Metric,avg\nA,1\n\n\nMetric,Value\nB,2\n";
        let metrics = parse_profile_csv(input.as_bytes());
        assert_eq!(metrics.len(), 2);
        assert_eq!(stats(&metrics, "A").get("avg"), "1");
        assert_eq!(metrics.get("B").and_then(MetricValue::as_scalar), Some("2"));
    }

    #[test]
    fn test_crlf_empty_line_ends_statistics_table() {
        let input = "Metric,avg\r\nA,1\r\nB,2\r\n\r\nStray,9\r\n";
        let metrics = parse_profile_csv(input.as_bytes());
        let keys: Vec<_> = metrics.keys().cloned().collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_trailing_content_after_tables_is_ignored() {
        let input = "Metric,avg\nA,1\n\nnot a table\nMetric,Value\nB,2\n";
        let metrics = parse_profile_csv(input.as_bytes());
        assert_eq!(metrics.len(), 1);
        assert!(metrics.get("B").is_none());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROFILE_CSV);
        std::fs::write(&path, EXPORT).unwrap();

        let first = parse_profile_csv_file(&path);
        let second = parse_profile_csv_file(&path);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_sidecar_merge_rounds_to_two_decimals() {
        let mut metrics = parse_profile_csv(EXPORT.as_bytes());
        let before = metrics.len();
        let sidecar = serde_json::json!({
            "time_to_first_token": {"unit": "ms", "avg": 12.345, "min": 10, "max": "fast", "p99": null}
        });

        assert!(merge_sidecar(&mut metrics, &sidecar));
        assert_eq!(metrics.len(), before + 1);

        let ttft = stats(&metrics, TIME_TO_FIRST_TOKEN);
        assert_eq!(ttft.get("avg"), "12.35");
        assert_eq!(ttft.get("min"), "10.00");
        assert_eq!(ttft.get("max"), NOT_AVAILABLE);
        assert_eq!(ttft.get("p99"), NOT_AVAILABLE);
        assert_eq!(ttft.get("p25"), NOT_AVAILABLE);
        assert_eq!(ttft.len(), TTFT_LABELS.len());

        assert_eq!(stats(&metrics, REQUEST_LATENCY).get("avg"), "120.5");
    }

    #[test]
    fn test_sidecar_overwrites_only_same_name() {
        let mut metrics = MetricMap::new();
        metrics.insert(TIME_TO_FIRST_TOKEN.to_string(), MetricValue::scalar("old"));
        metrics.insert("Other".to_string(), MetricValue::scalar("1"));

        let sidecar = serde_json::json!({"time_to_first_token": {"avg": 1.0}});
        merge_sidecar(&mut metrics, &sidecar);

        assert_eq!(stats(&metrics, TIME_TO_FIRST_TOKEN).get("avg"), "1.00");
        assert_eq!(metrics.get("Other").and_then(MetricValue::as_scalar), Some("1"));
    }

    #[test]
    fn test_sidecar_without_ttft_is_ignored() {
        let mut metrics = MetricMap::new();
        assert!(!merge_sidecar(&mut metrics, &serde_json::json!({"request_latency": {}})));
        assert!(!merge_sidecar(&mut metrics, &serde_json::json!({"time_to_first_token": 5})));
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_normalize_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(normalize(&model(), &dir.path().join("nope")).is_none());
    }

    #[test]
    fn test_normalize_empty_dir_exists_but_empty() {
        let dir = TempDir::new().unwrap();
        let result = normalize(&model(), dir.path()).unwrap();
        assert!(result.metrics.is_empty());
        assert!(!result.has_tabular_output());
        assert!(result.log.is_none());
        assert_eq!(result.key, "gpt-4o-mini");
    }

    #[test]
    fn test_normalize_reads_all_artifacts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PROFILE_CSV), EXPORT).unwrap();
        std::fs::write(
            dir.path().join(PROFILE_JSON),
            r#"{"time_to_first_token": {"avg": 99.999}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join(LOG_FILE), "profiling done\n").unwrap();

        let result = normalize(&model(), dir.path()).unwrap();
        assert!(result.has_tabular_output());
        assert!(result.sidecar_file.is_some());
        assert_eq!(result.log.as_deref(), Some("profiling done\n"));
        assert_eq!(
            stats(&result.metrics, TIME_TO_FIRST_TOKEN).get("avg"),
            "100.00"
        );
        assert_eq!(
            result.metric(OUTPUT_TOKEN_THROUGHPUT).and_then(MetricValue::as_scalar),
            Some("42.3")
        );
    }

    #[test]
    fn test_normalize_malformed_sidecar_keeps_csv() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PROFILE_CSV), EXPORT).unwrap();
        std::fs::write(dir.path().join(PROFILE_JSON), "{not json").unwrap();

        let result = normalize(&model(), dir.path()).unwrap();
        assert!(result.metric(TIME_TO_FIRST_TOKEN).is_none());
        assert_eq!(result.metrics.len(), 6);
    }

    #[test]
    fn test_locate_csv_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("custom_genai_perf.csv"), "Metric,Value\nA,1\n").unwrap();
        std::fs::write(dir.path().join("notes.csv"), "x").unwrap();

        let found = locate_csv(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "custom_genai_perf.csv");

        let result = normalize(&model(), dir.path()).unwrap();
        assert_eq!(result.metric("A").and_then(MetricValue::as_scalar), Some("1"));
    }
}
