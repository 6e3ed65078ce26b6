use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::{default_models, ModelSpec};
use crate::{Result, RouterBenchError};

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const HOST_WORKSPACE_ENV: &str = "ROUTERBENCH_HOST_WORKSPACE";
pub const CONFIG_ENV: &str = "ROUTERBENCH_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterBenchConfig {
    #[serde(default = "default_models")]
    pub models: Vec<ModelSpec>,
    #[serde(default)]
    pub benchmark: BenchmarkToolConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Default for RouterBenchConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            benchmark: BenchmarkToolConfig::default(),
            summary: SummaryConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl RouterBenchConfig {
    /// Reads a JSON config file, or returns the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    RouterBenchError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&raw).map_err(|e| {
                    RouterBenchError::Config(format!("invalid {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for model in &self.models {
            if model.key.is_empty() || model.key.contains(['/', '\\']) || model.key == ".." {
                return Err(RouterBenchError::Config(format!(
                    "model key {:?} cannot be used as a directory name",
                    model.key
                )));
            }
            if !seen.insert(model.key.as_str()) {
                return Err(RouterBenchError::Config(format!(
                    "duplicate model key {:?}",
                    model.key
                )));
            }
        }
        if self.benchmark.timeout_secs == 0 {
            return Err(RouterBenchError::Config(
                "benchmark.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed parameters for every genai-perf invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkToolConfig {
    pub docker_image: String,
    pub endpoint_url: String,
    pub service_kind: String,
    pub endpoint_type: String,
    pub synthetic_input_tokens_mean: u32,
    pub num_dataset_entries: u32,
    pub tokenizer: String,
    pub measurement_interval_ms: u64,
    pub timeout_secs: u64,
    /// Mount point of the host workspace inside the tool container
    pub container_workspace: String,
    /// Extra `Name:Value` headers sent along with the bearer token
    pub extra_headers: Vec<String>,
    /// Regexes for tool output lines kept out of the console (still logged to file)
    pub suppress_patterns: Vec<String>,
}

impl Default for BenchmarkToolConfig {
    fn default() -> Self {
        Self {
            docker_image: "nvcr.io/nvidia/tritonserver:25.01-py3-sdk".to_string(),
            endpoint_url: "https://openrouter.ai/api".to_string(),
            service_kind: "openai".to_string(),
            endpoint_type: "chat".to_string(),
            synthetic_input_tokens_mean: 50,
            num_dataset_entries: 10,
            tokenizer: "gpt2".to_string(),
            measurement_interval_ms: 60_000,
            timeout_secs: 300,
            container_workspace: "/workspace".to_string(),
            extra_headers: vec![
                "HTTP-Referer:http://localhost:8000".to_string(),
                "X-Title:GenAI-Perf-Benchmark".to_string(),
            ],
            suppress_patterns: vec![
                r"(?i)nvidia driver was not detected".to_string(),
                r"(?i)gpu functionality will not be available".to_string(),
                r"(?i)use the nvidia container toolkit".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub base_url: String,
    pub model: String,
    /// Human-readable name of `model` for the narrative header
    pub model_label: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub referer: String,
    pub title: String,
    /// Request a narrative automatically after each coordinated run
    pub auto_generate: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            model_label: "Claude 3.5 Sonnet".to_string(),
            max_tokens: 4000,
            temperature: 0.3,
            timeout_secs: 60,
            referer: "http://localhost:8000".to_string(),
            title: "LLM Benchmark Summary Generator".to_string(),
            auto_generate: true,
        }
    }
}

/// On-disk locations of every persisted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub results_dir: PathBuf,
    /// Combined RunSummary, inside `results_dir`
    pub results_file: String,
    /// Human-readable run summary, inside `results_dir`
    pub text_summary_file: String,
    pub narrative_file: PathBuf,
    pub raw_data_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            results_file: "benchmark_results.json".to_string(),
            text_summary_file: "benchmark_summary.txt".to_string(),
            narrative_file: PathBuf::from("LLM_GENERATED_SUMMARY.md"),
            raw_data_file: PathBuf::from("benchmark_data_summary.json"),
        }
    }
}

impl PathsConfig {
    /// Default layout rooted at `root` instead of the working directory.
    pub fn under(root: &Path) -> Self {
        let defaults = Self::default();
        Self {
            results_dir: root.join(&defaults.results_dir),
            narrative_file: root.join(&defaults.narrative_file),
            raw_data_file: root.join(&defaults.raw_data_file),
            ..defaults
        }
    }

    pub fn model_dir(&self, key: &str) -> PathBuf {
        self.results_dir.join(key)
    }

    pub fn results_path(&self) -> PathBuf {
        self.results_dir.join(&self.results_file)
    }

    pub fn text_summary_path(&self) -> PathBuf {
        self.results_dir.join(&self.text_summary_file)
    }
}

/// Secrets taken from the environment, never from the config file.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self {
                api_key: key.trim().to_string(),
            }),
            _ => Err(RouterBenchError::MissingApiKey(API_KEY_ENV)),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Host path mounted into the tool container. Overridable when this process
/// itself runs inside a container and the cwd is not a host path.
pub fn host_workspace() -> Result<PathBuf> {
    match std::env::var(HOST_WORKSPACE_ENV) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path.trim())),
        _ => Ok(std::env::current_dir()?),
    }
}
