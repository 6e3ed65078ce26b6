pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod result;

pub use config::{
    host_workspace, BenchmarkToolConfig, Credentials, PathsConfig, RouterBenchConfig,
    SummaryConfig,
};
pub use error::{Result, RouterBenchError};
pub use metrics::{
    clean_cell, parse_number, MetricMap, MetricValue, PercentileStats, NOT_AVAILABLE,
};
pub use model::ModelSpec;
pub use result::{ModelResult, NarrativeSummary, RunSummary, TokenUsage};
