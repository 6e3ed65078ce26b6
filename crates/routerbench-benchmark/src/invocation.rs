use std::path::{Component, Path};

use routerbench_core::{BenchmarkToolConfig, ModelSpec};

const AUTH_PREFIX: &str = "Authorization:Bearer ";

/// A fully built external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `docker run ... genai-perf profile ...` for one model.
    ///
    /// `artifact_dir` is the local per-model directory; it is translated into
    /// the container's view of `host_workspace`.
    pub fn genai_perf(
        tool: &BenchmarkToolConfig,
        model: &ModelSpec,
        api_key: &str,
        host_workspace: &Path,
        artifact_dir: &Path,
    ) -> Self {
        let workspace = tool.container_workspace.trim_end_matches('/');
        let artifact_dir = container_path(workspace, host_workspace, artifact_dir);

        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "-v".into(),
            format!("{}:{}", host_workspace.display(), workspace),
            "-w".into(),
            workspace.into(),
            tool.docker_image.clone(),
            "genai-perf".into(),
            "profile".into(),
            "-m".into(),
            model.id.clone(),
            "--service-kind".into(),
            tool.service_kind.clone(),
            "--endpoint-type".into(),
            tool.endpoint_type.clone(),
            "-u".into(),
            tool.endpoint_url.clone(),
            "-H".into(),
            format!("{}{}", AUTH_PREFIX, api_key),
        ];
        for header in &tool.extra_headers {
            args.push("-H".into());
            args.push(header.clone());
        }
        args.extend([
            "--synthetic-input-tokens-mean".into(),
            tool.synthetic_input_tokens_mean.to_string(),
            "--num-dataset-entries".into(),
            tool.num_dataset_entries.to_string(),
            "--tokenizer".into(),
            tool.tokenizer.clone(),
            "--measurement-interval".into(),
            tool.measurement_interval_ms.to_string(),
            "--artifact-dir".into(),
            artifact_dir,
        ]);

        Self::new("docker", args)
    }

    /// Command line for logs, with the bearer token masked.
    pub fn redacted(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.starts_with(AUTH_PREFIX) {
                    format!("{}***", AUTH_PREFIX)
                } else if arg.contains(' ') {
                    format!("\"{}\"", arg)
                } else {
                    arg.clone()
                }
            })
            .collect();
        format!("{} {}", self.program, args.join(" "))
    }
}

fn container_path(workspace: &str, host_workspace: &Path, local: &Path) -> String {
    let relative = if local.is_absolute() {
        match local.strip_prefix(host_workspace) {
            Ok(rel) => rel,
            Err(_) => {
                tracing::warn!(
                    "{} is outside the mounted workspace {}",
                    local.display(),
                    host_workspace.display()
                );
                return local.display().to_string();
            }
        }
    } else {
        local
    };

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        workspace.to_string()
    } else {
        format!("{}/{}", workspace, parts.join("/"))
    }
}
