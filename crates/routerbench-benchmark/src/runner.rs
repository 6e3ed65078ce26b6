use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use routerbench_core::{BenchmarkToolConfig, Credentials, ModelSpec, Result, RouterBenchError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::events::{EventSink, RunEvent};
use crate::invocation::Invocation;
use crate::normalizer::LOG_FILE;

/// How one benchmark invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Completed(PathBuf),
    Failed { exit_code: Option<i32> },
    TimedOut,
}

impl InvocationOutcome {
    /// The artifact directory, only for a successful run.
    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            InvocationOutcome::Completed(dir) => Some(dir),
            _ => None,
        }
    }
}

/// Runs the benchmark tool for one model, writing artifacts into `output_dir`.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        model: &ModelSpec,
        output_dir: &Path,
        events: &EventSink,
    ) -> Result<InvocationOutcome>;
}

/// Tool output lines that are logged to file but kept off the console.
#[derive(Debug, Clone, Default)]
pub struct OutputFilter {
    patterns: Vec<Regex>,
}

impl OutputFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    RouterBenchError::Config(format!("bad suppress pattern {:?}: {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_suppressed(&self, line: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(line))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Success,
    Failed(Option<i32>),
    TimedOut,
}

fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Runs `invocation`, streaming stdout and stderr line by line into
/// `log_path`. Lines not matched by `filter` are also echoed and emitted as
/// [`RunEvent::Output`] for `key`. The child is killed once `timeout` elapses;
/// the partial log stays on disk.
pub async fn run_logged(
    invocation: &Invocation,
    key: &str,
    log_path: &Path,
    timeout: Duration,
    filter: &OutputFilter,
    events: &EventSink,
) -> Result<ProcessExit> {
    if let Some(parent) = log_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut log = tokio::fs::File::create(log_path).await?;

    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            RouterBenchError::Invocation(format!("cannot start {}: {}", invocation.program, e))
        })?;

    let (tx, mut rx) = mpsc::channel::<String>(256);
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, tx.clone());
    }
    drop(tx);

    let drive = async {
        while let Some(line) = rx.recv().await {
            log.write_all(line.as_bytes()).await?;
            log.write_all(b"\n").await?;
            if !filter.is_suppressed(&line) {
                info!(target: "genai_perf", model = %key, "{}", line);
                events
                    .emit(RunEvent::Output {
                        key: key.to_string(),
                        line,
                    })
                    .await;
            }
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>(status)
    };

    let waited = tokio::time::timeout(timeout, drive).await;
    let exit = match waited {
        Ok(status) => {
            let status = status?;
            if status.success() {
                ProcessExit::Success
            } else {
                ProcessExit::Failed(status.code())
            }
        }
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill timed out process: {}", e);
            }
            let note = format!("\n[routerbench] timed out after {}s\n", timeout.as_secs());
            log.write_all(note.as_bytes()).await?;
            ProcessExit::TimedOut
        }
    };

    log.flush().await?;
    Ok(exit)
}

/// [`Invoker`] that runs genai-perf inside the tool container.
pub struct GenAiPerfRunner {
    tool: BenchmarkToolConfig,
    api_key: String,
    host_workspace: PathBuf,
    filter: OutputFilter,
}

impl GenAiPerfRunner {
    pub fn new(
        tool: BenchmarkToolConfig,
        credentials: &Credentials,
        host_workspace: PathBuf,
    ) -> Result<Self> {
        let filter = OutputFilter::new(&tool.suppress_patterns)?;
        Ok(Self {
            tool,
            api_key: credentials.api_key.clone(),
            host_workspace,
            filter,
        })
    }
}

#[async_trait]
impl Invoker for GenAiPerfRunner {
    async fn invoke(
        &self,
        model: &ModelSpec,
        output_dir: &Path,
        events: &EventSink,
    ) -> Result<InvocationOutcome> {
        info!("Benchmarking: {} ({})", model.name, model.id);
        tokio::fs::create_dir_all(output_dir).await?;

        let invocation = Invocation::genai_perf(
            &self.tool,
            model,
            &self.api_key,
            &self.host_workspace,
            output_dir,
        );
        info!("Running: {}", invocation.redacted());

        let timeout = Duration::from_secs(self.tool.timeout_secs);
        let log_path = output_dir.join(LOG_FILE);
        let exit = run_logged(
            &invocation,
            &model.key,
            &log_path,
            timeout,
            &self.filter,
            events,
        )
        .await?;

        let outcome = match exit {
            ProcessExit::Success => {
                info!("Benchmark completed for {}", model.name);
                InvocationOutcome::Completed(output_dir.to_path_buf())
            }
            ProcessExit::Failed(exit_code) => {
                error!(
                    "GenAI-Perf failed for {} (exit code {:?}), see {}",
                    model.name,
                    exit_code,
                    log_path.display()
                );
                InvocationOutcome::Failed { exit_code }
            }
            ProcessExit::TimedOut => {
                error!(
                    "Benchmark timed out for {} after {}s",
                    model.name, self.tool.timeout_secs
                );
                InvocationOutcome::TimedOut
            }
        };
        Ok(outcome)
    }
}
