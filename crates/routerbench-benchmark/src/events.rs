use serde::Serialize;
use tokio::sync::mpsc;

/// Progress notifications from a coordinated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Cleaning,
    ModelStarted {
        key: String,
        name: String,
        index: usize,
        total: usize,
    },
    Output {
        key: String,
        line: String,
    },
    ModelFinished {
        key: String,
        success: bool,
        index: usize,
        total: usize,
    },
    Finished {
        completed: usize,
        total: usize,
    },
}

/// Optional sender for [`RunEvent`]s. Sending never fails the run.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<RunEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                tracing::debug!("Run event receiver dropped");
            }
        }
    }
}
