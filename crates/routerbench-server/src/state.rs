use std::collections::VecDeque;
use std::sync::Arc;

use routerbench_benchmark::{Invoker, RunEvent, SummaryClient};
use routerbench_core::RouterBenchConfig;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Most recent log lines kept for the status endpoint.
pub const MAX_LOG_LINES: usize = 500;

/// Progress of the background benchmark run, if any.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub current_model: Option<String>,
    pub progress: u8,
    pub logs: VecDeque<String>,
    pub run_id: Option<Uuid>,
}

impl RunStatus {
    /// Claims the single run slot. Returns `None` when a run is in progress.
    pub fn try_begin(&mut self) -> Option<Uuid> {
        if self.running {
            return None;
        }
        let run_id = Uuid::new_v4();
        *self = Self {
            running: true,
            run_id: Some(run_id),
            ..Self::default()
        };
        self.push_log("Starting benchmark...");
        Some(run_id)
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(line.into());
    }

    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Cleaning => self.push_log("Cleaning old benchmark results..."),
            RunEvent::ModelStarted {
                name, index, total, ..
            } => {
                self.current_model = Some(name.clone());
                self.push_log(format!("[{}/{}] Benchmarking: {}", index + 1, total, name));
            }
            RunEvent::Output { key, line } => self.push_log(format!("[{}] {}", key, line)),
            RunEvent::ModelFinished {
                key,
                success,
                index,
                total,
            } => {
                self.progress = progress_percent(index + 1, *total);
                let verdict = if *success { "completed" } else { "failed" };
                self.push_log(format!("{} {}", key, verdict));
            }
            RunEvent::Finished { completed, total } => {
                self.current_model = None;
                self.progress = 100;
                self.push_log(format!("{}/{} models produced results", completed, total));
            }
        }
    }

    /// Releases the run slot.
    pub fn finish(&mut self, message: impl Into<String>) {
        self.push_log(message);
        self.running = false;
        self.current_model = None;
    }
}

fn progress_percent(finished: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (finished.min(total) * 100 / total) as u8
}

pub type SharedStatus = Arc<Mutex<RunStatus>>;

pub struct AppState {
    pub config: RouterBenchConfig,
    pub invoker: Arc<dyn Invoker>,
    /// Absent when narratives are disabled.
    pub summarizer: Option<SummaryClient>,
    pub status: SharedStatus,
}

impl AppState {
    pub fn new(
        config: RouterBenchConfig,
        invoker: Arc<dyn Invoker>,
        summarizer: Option<SummaryClient>,
    ) -> Self {
        Self {
            config,
            invoker,
            summarizer,
            status: Arc::new(Mutex::new(RunStatus::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_begin_only_once() {
        let mut status = RunStatus::default();
        let first = status.try_begin();
        assert!(first.is_some());
        assert!(status.try_begin().is_none());
        assert_eq!(status.run_id, first);

        status.finish("done");
        assert!(!status.running);
        let second = status.try_begin();
        assert!(second.is_some());
        assert_ne!(first, second);
        assert_eq!(status.logs, vec!["Starting benchmark...".to_string()]);
    }

    #[test]
    fn test_log_buffer_is_bounded() {
        let mut status = RunStatus::default();
        for i in 0..MAX_LOG_LINES + 20 {
            status.push_log(format!("line {}", i));
        }
        assert_eq!(status.logs.len(), MAX_LOG_LINES);
        assert_eq!(status.logs.front().map(String::as_str), Some("line 20"));
        assert_eq!(
            status.logs.back().cloned(),
            Some(format!("line {}", MAX_LOG_LINES + 19))
        );
    }

    #[test]
    fn test_events_drive_progress() {
        let mut status = RunStatus::default();
        status.try_begin();
        status.apply(&RunEvent::ModelStarted {
            key: "a".into(),
            name: "Model A".into(),
            index: 0,
            total: 3,
        });
        assert_eq!(status.current_model.as_deref(), Some("Model A"));
        assert_eq!(status.progress, 0);

        status.apply(&RunEvent::ModelFinished {
            key: "a".into(),
            success: false,
            index: 0,
            total: 3,
        });
        assert_eq!(status.progress, 33);

        status.apply(&RunEvent::Finished {
            completed: 0,
            total: 3,
        });
        assert_eq!(status.progress, 100);
        assert!(status.current_model.is_none());
        assert!(status.running);
    }

    #[test]
    fn test_progress_with_no_models() {
        assert_eq!(progress_percent(0, 0), 100);
        assert_eq!(progress_percent(2, 2), 100);
        assert_eq!(progress_percent(1, 4), 25);
    }
}
