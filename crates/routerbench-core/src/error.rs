use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterBenchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(
        "{0} environment variable not set! Please set it with: export {0}='your-key-here'"
    )]
    MissingApiKey(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invocation failed: {0}")]
    Invocation(String),

    #[error("No benchmark data found")]
    EmptyRun,
}

pub type Result<T> = std::result::Result<T, RouterBenchError>;
