use std::sync::Arc;

use routerbench_benchmark::{EventSink, RunCoordinator};
use routerbench_core::{RouterBenchError, RunSummary};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Claims the run slot and starts a coordinated run in the background.
pub async fn start(state: &Arc<AppState>) -> Result<(Uuid, JoinHandle<()>), AppError> {
    let run_id = state
        .status
        .lock()
        .await
        .try_begin()
        .ok_or_else(|| AppError::Conflict("Benchmark already running".to_string()))?;

    info!(%run_id, "Starting background benchmark");
    let handle = tokio::spawn(supervise(Arc::clone(state), run_id));
    Ok((run_id, handle))
}

/// Runs the benchmark on its own task so the run slot is released even when
/// that task panics.
async fn supervise(state: Arc<AppState>, run_id: Uuid) {
    let message = match tokio::spawn(run(Arc::clone(&state), run_id)).await {
        Ok(message) => message,
        Err(e) => {
            error!(%run_id, "Benchmark task aborted: {}", e);
            format!("Benchmark failed: {}", e)
        }
    };

    state.status.lock().await.finish(message);
    info!(%run_id, "Background benchmark finished");
}

async fn run(state: Arc<AppState>, run_id: Uuid) -> String {
    let coordinator = RunCoordinator::new(
        state.config.models.clone(),
        state.config.paths.clone(),
        Arc::clone(&state.invoker),
    );

    let (tx, mut rx) = mpsc::channel(256);
    let status = Arc::clone(&state.status);
    let recorder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            status.lock().await.apply(&event);
        }
    });

    let outcome = coordinator.run(&EventSink::new(tx)).await;
    if recorder.await.is_err() {
        warn!(%run_id, "Status recorder task ended abnormally");
    }

    match outcome {
        Ok(summary) => {
            if let Some(note) = narrate(&state, &summary).await {
                state.status.lock().await.push_log(note);
            }
            "Benchmarks completed successfully!".to_string()
        }
        Err(e) => {
            error!(%run_id, "Benchmark failed: {}", e);
            format!("Benchmark failed: {}", e)
        }
    }
}

/// Requests the narrative for a finished run. Failures are reported, never
/// propagated.
async fn narrate(state: &AppState, summary: &RunSummary) -> Option<String> {
    let client = state.summarizer.as_ref()?;
    if !client.config().auto_generate {
        return None;
    }

    match client
        .summarize(summary, &state.config.benchmark, &state.config.paths)
        .await
    {
        Ok(narrative) => Some(format!(
            "Summary generated for {} models",
            narrative.models_analyzed.len()
        )),
        Err(RouterBenchError::EmptyRun) => {
            warn!("No benchmark data, skipping summary");
            Some("No benchmark data, summary skipped".to_string())
        }
        Err(e) => {
            warn!("LLM summary generation had issues: {}", e);
            Some(format!("Summary generation failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use async_trait::async_trait;
    use routerbench_benchmark::{InvocationOutcome, Invoker};
    use routerbench_core::{ModelSpec, PathsConfig, Result, RouterBenchConfig};
    use tempfile::TempDir;

    struct PanickingInvoker;

    #[async_trait]
    impl Invoker for PanickingInvoker {
        async fn invoke(
            &self,
            _model: &ModelSpec,
            _output_dir: &Path,
            _events: &EventSink,
        ) -> Result<InvocationOutcome> {
            panic!("invoker blew up");
        }
    }

    #[tokio::test]
    async fn test_panicking_run_releases_slot() {
        let tmp = TempDir::new().unwrap();
        let config = RouterBenchConfig {
            models: vec![ModelSpec::new("Model A", "vendor/a", "a")],
            paths: PathsConfig::under(tmp.path()),
            ..RouterBenchConfig::default()
        };
        let state = Arc::new(AppState::new(config, Arc::new(PanickingInvoker), None));

        let (run_id, handle) = start(&state).await.unwrap();
        handle.await.unwrap();

        {
            let status = state.status.lock().await;
            assert!(!status.running);
            assert_eq!(status.run_id, Some(run_id));
            assert!(status
                .logs
                .back()
                .is_some_and(|line| line.starts_with("Benchmark failed")));
        }

        assert!(state.status.lock().await.try_begin().is_some());
    }
}
