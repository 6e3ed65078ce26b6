mod dashboard;
mod dto;
mod error;
mod handlers;
mod routes;
mod services;
mod state;
mod views;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use routerbench_benchmark::{GenAiPerfRunner, SummaryClient};
use routerbench_core::config::CONFIG_ENV;
use routerbench_core::{host_workspace, Credentials, RouterBenchConfig};
use tracing::info;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let credentials = Credentials::from_env()?;
    let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let config = RouterBenchConfig::load(config_path.as_deref())?;

    let runner = GenAiPerfRunner::new(config.benchmark.clone(), &credentials, host_workspace()?)?;
    let summarizer = SummaryClient::new(config.summary.clone(), &credentials)?;
    let state = Arc::new(AppState::new(config, Arc::new(runner), Some(summarizer)));

    let app = routes::router(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    info!("LLM Benchmark Dashboard listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
