use std::fmt::Write;

use routerbench_core::MetricValue;

use crate::dashboard::{DashboardResults, ModelEntry};
use crate::state::RunStatus;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - LLM Benchmark Dashboard</title>
<script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; margin-bottom: 1.5rem; }}
th, td {{ border: 1px solid #ccc; padding: 0.3rem 0.6rem; text-align: left; }}
nav a {{ margin-right: 1rem; }}
pre {{ white-space: pre-wrap; }}
</style>
</head>
<body>
<nav><a href="/">Dashboard</a><a href="/comparison">Comparison</a><a href="/summary">AI Summary</a></nav>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

fn render_metrics(out: &mut String, entry: &ModelEntry) {
    out.push_str("<table>\n");
    for (name, value) in &entry.metrics {
        match value {
            MetricValue::Scalar(v) => {
                let _ = writeln!(
                    out,
                    "<tr><th>{}</th><td>{}</td></tr>",
                    escape(name),
                    escape(v)
                );
            }
            MetricValue::Percentiles(stats) => {
                let cells: Vec<String> = stats
                    .iter()
                    .map(|(label, v)| format!("{}: {}", escape(label), escape(v)))
                    .collect();
                let _ = writeln!(
                    out,
                    "<tr><th>{}</th><td>{}</td></tr>",
                    escape(name),
                    cells.join("<br>")
                );
            }
        }
    }
    out.push_str("</table>\n");
}

const START_SCRIPT: &str = r#"<script>
function pollStatus() {
  fetch('/api/benchmark/status').then(r => r.json()).then(s => {
    const model = s.current_model ? ': ' + s.current_model : '';
    document.getElementById('status').textContent =
      s.running ? 'Running (' + s.progress + '%)' + model : 'Idle';
    document.getElementById('logs').textContent = s.logs.slice(-20).join('\n');
    if (s.running) {
      setTimeout(pollStatus, 2000);
    } else {
      document.getElementById('start').disabled = false;
    }
  });
}
document.getElementById('start').addEventListener('click', () => {
  document.getElementById('start').disabled = true;
  fetch('/api/benchmark/start', { method: 'POST' })
    .then(r => r.json().then(body => ({ ok: r.ok, body })))
    .then(({ ok, body }) => {
      if (!ok) {
        document.getElementById('status').textContent = body.error;
      }
      pollStatus();
    });
});
pollStatus();
</script>
"#;

pub fn index_page(results: &DashboardResults, status: &RunStatus) -> String {
    let mut body = String::new();

    let state = if status.running {
        format!(
            "Running ({}%){}",
            status.progress,
            status
                .current_model
                .as_deref()
                .map(|m| format!(": {}", escape(m)))
                .unwrap_or_default()
        )
    } else {
        "Idle".to_string()
    };
    let _ = writeln!(
        body,
        r#"<p>Benchmark status: <strong id="status">{}</strong></p>
<button id="start">Run benchmarks</button>
<pre id="logs"></pre>
{}"#,
        state, START_SCRIPT
    );

    if !results.values().any(|e| e.exists) {
        body.push_str("<p>No benchmark results yet. Run the benchmarks to get started.</p>\n");
        return layout("LLM Benchmark Dashboard", &body);
    }

    body.push_str("<table>\n<tr><th>Model</th><th>Status</th></tr>\n");
    for (name, entry) in results {
        let cell = if entry.exists {
            format!(
                r#"<a href="/model/{}">{} metrics</a>"#,
                escape(&entry.key),
                entry.metrics.len()
            )
        } else {
            "No results".to_string()
        };
        let _ = writeln!(body, "<tr><td>{}</td><td>{}</td></tr>", escape(name), cell);
    }
    body.push_str("</table>\n");

    body.push_str(
        r#"<canvas id="throughput" height="120"></canvas>
<canvas id="latency" height="120"></canvas>
<script>
fetch('/api/chart-data').then(r => r.json()).then(d => {
  new Chart(document.getElementById('throughput'), {
    type: 'bar',
    data: { labels: d.throughput.labels, datasets: [{ label: 'Output tokens/sec', data: d.throughput.data }] }
  });
  new Chart(document.getElementById('latency'), {
    type: 'line',
    data: { labels: d.latency.labels, datasets: d.latency.datasets }
  });
});
</script>
"#,
    );
    layout("LLM Benchmark Dashboard", &body)
}

pub fn summary_page(narrative: Option<&str>) -> String {
    let body = match narrative {
        Some(text) => format!("<pre>{}</pre>\n", escape(text)),
        None => "<p>No AI summary has been generated yet.</p>\n".to_string(),
    };
    layout("AI Summary", &body)
}

pub fn comparison_page(results: &DashboardResults) -> String {
    let present: Vec<(&String, &ModelEntry)> = results.iter().filter(|(_, e)| e.exists).collect();
    if present.is_empty() {
        return layout("Comparison", "<p>No results to compare.</p>\n");
    }

    // Union of metric names, in first-seen order.
    let mut names: Vec<&str> = Vec::new();
    for (_, entry) in &present {
        for name in entry.metrics.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }

    let mut body = String::from("<table>\n<tr><th>Metric</th>");
    for (model, _) in &present {
        let _ = write!(body, "<th>{}</th>", escape(model));
    }
    body.push_str("</tr>\n");

    for name in names {
        let _ = write!(body, "<tr><th>{}</th>", escape(name));
        for (_, entry) in &present {
            let cell = match entry.metrics.get(name) {
                Some(MetricValue::Scalar(v)) => escape(v),
                Some(MetricValue::Percentiles(stats)) => escape(stats.get("avg")),
                None => "-".to_string(),
            };
            let _ = write!(body, "<td>{}</td>", cell);
        }
        body.push_str("</tr>\n");
    }
    body.push_str("</table>\n<p>Percentile metrics show the average.</p>\n");
    layout("Comparison", &body)
}

pub fn model_page(name: &str, entry: &ModelEntry) -> String {
    let mut body = format!("<p>Key: <code>{}</code></p>\n", escape(&entry.key));
    if entry.exists {
        render_metrics(&mut body, entry);
    } else {
        body.push_str("<p>This model has no results yet.</p>\n");
    }
    layout(name, &body)
}
