//! Narrative analysis of a [`RunSummary`] by a hosted chat model.

use std::fs;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use routerbench_core::{
    BenchmarkToolConfig, Credentials, MetricValue, NarrativeSummary, PathsConfig, Result,
    RouterBenchError, RunSummary, SummaryConfig, TokenUsage,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Narrative text plus the token counters reported with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

fn http_err(e: reqwest::Error) -> RouterBenchError {
    RouterBenchError::Http(e.to_string())
}

/// Formats results as the markdown block embedded in the prompt. Models keep
/// the run's order.
pub fn render_benchmark_data(
    summary: &RunSummary,
    tool: &BenchmarkToolConfig,
    date: DateTime<Local>,
) -> String {
    let mut text = String::from("# LLM Benchmark Results\n\n");
    text.push_str(&format!("**Benchmark Date:** {}\n", date.format("%Y-%m-%d")));
    text.push_str("**Tool:** NVIDIA GenAI-Perf via OpenRouter\n");
    text.push_str(&format!(
        "**Test Configuration:** {}-second measurement window, ~{} token inputs\n\n",
        tool.measurement_interval_ms / 1000,
        tool.synthetic_input_tokens_mean
    ));

    for result in summary.results() {
        text.push_str(&format!("## {}\n\n", result.name));
        for (name, value) in &result.metrics {
            match value {
                MetricValue::Percentiles(stats) => {
                    text.push_str(&format!("**{}:**\n", name));
                    for (label, v) in stats.iter() {
                        text.push_str(&format!("  - {}: {}\n", label, v));
                    }
                }
                MetricValue::Scalar(v) => text.push_str(&format!("**{}:** {}\n", name, v)),
            }
        }
        text.push('\n');
    }
    text
}

pub fn build_prompt(benchmark_data: &str, model_count: usize) -> String {
    format!(
        "You are an expert in LLM performance analysis. I've benchmarked {} different LLM models \
using NVIDIA GenAI-Perf through OpenRouter. Please analyze the following performance data and \
provide a comprehensive, human-readable summary.

{}

Please provide:
1. An executive summary highlighting the key findings
2. A performance comparison ranking the models
3. Specific use-case recommendations for each model
4. Notable insights about latency, throughput, and output characteristics
5. A conclusion with actionable recommendations

Make the summary accessible to both technical and non-technical stakeholders. Use clear language \
and highlight the most important metrics.",
        model_count, benchmark_data
    )
}

/// Markdown document persisted for the narrative.
pub fn render_narrative_file(narrative: &NarrativeSummary, model_label: &str) -> String {
    let date = narrative.generated_at.with_timezone(&Local);
    format!(
        "# LLM-Generated Benchmark Summary\n\n\
**Generated by:** {label} via OpenRouter\n\
**Date:** {date}\n\
**Models Analyzed:** {models}\n\n\
---\n\n\
{text}\n\n\
---\n\n\
*This summary was automatically generated using {label} analyzing GenAI-Perf benchmark results.*\n",
        label = model_label,
        date = date.format("%Y-%m-%d %H:%M:%S"),
        models = narrative.models_analyzed.join(", "),
        text = narrative.text,
    )
}

/// Writes the narrative and the data it was generated from.
pub fn save_narrative(
    paths: &PathsConfig,
    narrative: &NarrativeSummary,
    summary: &RunSummary,
    model_label: &str,
) -> Result<()> {
    fs::write(
        &paths.narrative_file,
        render_narrative_file(narrative, model_label),
    )?;
    fs::write(
        &paths.raw_data_file,
        serde_json::to_string_pretty(&summary.metrics_by_name())?,
    )?;
    info!("Summary saved to: {}", paths.narrative_file.display());
    info!("Raw data saved to: {}", paths.raw_data_file.display());
    Ok(())
}

/// Client for the chat-completions endpoint used for narratives.
pub struct SummaryClient {
    client: reqwest::Client,
    config: SummaryConfig,
    api_key: String,
}

impl SummaryClient {
    pub fn new(config: SummaryConfig, credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(http_err)?;
        Ok(Self {
            client,
            config,
            api_key: credentials.api_key.clone(),
        })
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// One chat-completion call with `prompt` as the only user message.
    pub async fn complete(&self, prompt: &str) -> Result<Completion> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        info!("Calling {} to generate summary...", self.config.model);
        info!("Input size: {} characters", prompt.len());

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&request)
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        let body = resp.text().await.map_err(http_err)?;
        if !status.is_success() {
            return Err(RouterBenchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            RouterBenchError::Http(format!(
                "Failed to parse response: {} - Body: {}",
                e,
                body.chars().take(500).collect::<String>()
            ))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RouterBenchError::Http("No response content".into()))?;

        if let Some(usage) = &parsed.usage {
            info!(
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                total_tokens = ?usage.total_tokens,
                "Summary generated successfully"
            );
        }

        Ok(Completion {
            text,
            usage: parsed.usage,
        })
    }

    /// Requests a narrative for `summary` and persists it. On any failure
    /// nothing is written, so an older narrative stays as it was.
    #[instrument(skip_all, fields(models = summary.len()))]
    pub async fn summarize(
        &self,
        summary: &RunSummary,
        tool: &BenchmarkToolConfig,
        paths: &PathsConfig,
    ) -> Result<NarrativeSummary> {
        if summary.is_empty() {
            return Err(RouterBenchError::EmptyRun);
        }

        let data = render_benchmark_data(summary, tool, Local::now());
        let prompt = build_prompt(&data, summary.len());
        let completion = self.complete(&prompt).await?;

        let narrative = NarrativeSummary {
            text: completion.text,
            model: self.config.model.clone(),
            generated_at: Utc::now(),
            models_analyzed: summary.results().map(|r| r.name.clone()).collect(),
            usage: completion.usage,
        };
        save_narrative(paths, &narrative, summary, &self.config.model_label)?;
        Ok(narrative)
    }
}
