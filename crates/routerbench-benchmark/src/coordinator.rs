use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use routerbench_core::{ModelSpec, PathsConfig, Result, RunSummary};
use tracing::{error, info, instrument, warn};

use crate::events::{EventSink, RunEvent};
use crate::normalizer;
use crate::runner::Invoker;

/// Drives one coordinated run: clean, benchmark each model in order, persist.
pub struct RunCoordinator {
    models: Vec<ModelSpec>,
    paths: PathsConfig,
    invoker: Arc<dyn Invoker>,
}

impl RunCoordinator {
    pub fn new(models: Vec<ModelSpec>, paths: PathsConfig, invoker: Arc<dyn Invoker>) -> Self {
        Self {
            models,
            paths,
            invoker,
        }
    }

    /// Runs every configured model one after another. Individual failures are
    /// logged and skipped; the combined results are always written.
    #[instrument(skip_all, fields(models = self.models.len()))]
    pub async fn run(&self, events: &EventSink) -> Result<RunSummary> {
        events.emit(RunEvent::Cleaning).await;
        clean_old_results(&self.paths);

        let total = self.models.len();
        let mut summary = RunSummary::new();

        for (index, model) in self.models.iter().enumerate() {
            events
                .emit(RunEvent::ModelStarted {
                    key: model.key.clone(),
                    name: model.name.clone(),
                    index,
                    total,
                })
                .await;

            let output_dir = self.paths.model_dir(&model.key);
            let outcome = match self.invoker.invoke(model, &output_dir, events).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!("Error running benchmark for {}: {}", model.name, e);
                    None
                }
            };

            let result = outcome
                .as_ref()
                .and_then(|o| o.output_dir())
                .and_then(|dir| normalizer::normalize(model, dir));
            let success = result.is_some();
            if let Some(result) = result {
                summary.insert(result);
            }

            events
                .emit(RunEvent::ModelFinished {
                    key: model.key.clone(),
                    success,
                    index,
                    total,
                })
                .await;
        }

        write_run_summary(&self.paths, &summary)?;
        info!(
            "Benchmarking complete: {}/{} models, results in {}",
            summary.len(),
            total,
            self.paths.results_dir.display()
        );

        events
            .emit(RunEvent::Finished {
                completed: summary.len(),
                total,
            })
            .await;
        Ok(summary)
    }
}

type Remover = fn(&Path) -> io::Result<()>;

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Removes a file, or empties it when it cannot be unlinked (e.g. a
/// bind-mounted file). Returns false when the file was emptied instead.
fn remove_or_truncate(path: &Path, remove: Remover) -> io::Result<bool> {
    match remove(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(remove_err) => fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map(|_| false)
            .map_err(|_| remove_err),
    }
}

fn clean_path(path: &Path, notes: &mut Vec<String>, remove: Remover) {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path).map(|_| true)
    } else {
        remove_or_truncate(path, remove)
    };
    match removed {
        Ok(true) => {}
        Ok(false) => {
            let note = format!("{} could not be removed, emptied it instead", path.display());
            warn!("{}", note);
            notes.push(note);
        }
        Err(e) => {
            let note = format!("skipped {}: {}", path.display(), e);
            warn!("{}", note);
            notes.push(note);
        }
    }
}

/// Deletes every previous artifact. Never fails; anything that could not be
/// removed is returned as a note.
pub fn clean_old_results(paths: &PathsConfig) -> Vec<String> {
    clean_old_results_with(paths, remove_file)
}

fn clean_old_results_with(paths: &PathsConfig, remove: Remover) -> Vec<String> {
    info!("Cleaning old benchmark results...");
    let mut notes = Vec::new();

    match fs::read_dir(&paths.results_dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                clean_path(&entry.path(), &mut notes, remove);
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            let note = format!("cannot list {}: {}", paths.results_dir.display(), e);
            warn!("{}", note);
            notes.push(note);
        }
    }

    for file in [&paths.narrative_file, &paths.raw_data_file] {
        if file.exists() {
            clean_path(file, &mut notes, remove);
        }
    }

    if let Err(e) = fs::create_dir_all(&paths.results_dir) {
        let note = format!("cannot create {}: {}", paths.results_dir.display(), e);
        warn!("{}", note);
        notes.push(note);
    }
    notes
}

/// Normalizes whatever the configured models left on disk. Only models whose
/// tabular export exists are included.
pub fn collect_results(models: &[ModelSpec], paths: &PathsConfig) -> RunSummary {
    let mut summary = RunSummary::new();
    for model in models {
        match normalizer::normalize(model, &paths.model_dir(&model.key)) {
            Some(result) if result.has_tabular_output() => summary.insert(result),
            _ => warn!("Results not found for {}", model.name),
        }
    }
    summary
}

/// Writes the combined JSON results and the text summary next to them.
pub fn write_run_summary(paths: &PathsConfig, summary: &RunSummary) -> Result<()> {
    fs::create_dir_all(&paths.results_dir)?;
    fs::write(paths.results_path(), serde_json::to_string_pretty(summary)?)?;
    fs::write(paths.text_summary_path(), render_text_summary(summary))?;
    Ok(())
}

pub fn render_text_summary(summary: &RunSummary) -> String {
    let rule = "=".repeat(60);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        "BENCHMARK SUMMARY".to_string(),
        rule,
        String::new(),
    ];

    if summary.is_empty() {
        lines.push("No model completed successfully.".to_string());
    }

    for (key, result) in summary.iter() {
        lines.push(format!("Model: {} ({})", result.name, key));
        lines.push("-".repeat(40));
        if result.metrics.is_empty() {
            lines.push("Status: Benchmark did not complete successfully".to_string());
        } else {
            lines.push(format!("Metrics parsed: {}", result.metrics.len()));
            lines.push(format!("Timestamp: {}", result.timestamp.to_rfc3339()));
            lines.push(format!("Artifacts: {}", result.output_dir.display()));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
