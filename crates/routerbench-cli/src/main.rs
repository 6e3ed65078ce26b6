use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use routerbench_benchmark::coordinator::{collect_results, render_text_summary};
use routerbench_benchmark::{
    normalize, EventSink, GenAiPerfRunner, RunCoordinator, RunEvent, SummaryClient,
};
use routerbench_core::config::CONFIG_ENV;
use routerbench_core::model::find_by_key;
use routerbench_core::{host_workspace, Credentials, ModelSpec, RouterBenchConfig, RunSummary};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "routerbench")]
#[command(about = "RouterBench - GenAI-Perf benchmarks against hosted LLM APIs", long_about = None)]
struct Cli {
    /// JSON config file (defaults to $ROUTERBENCH_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark every configured model, then generate the narrative summary
    Run {
        /// Do not request a narrative summary afterwards
        #[arg(long)]
        skip_summary: bool,

        /// Only benchmark these model keys (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,
    },

    /// Generate the narrative summary from results already on disk
    Summarize,

    /// Print the normalized results of one artifact directory as JSON
    Parse {
        /// Directory containing the genai-perf artifacts
        dir: PathBuf,

        /// Model key to report (defaults to the directory name)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// List configured models
    Models,
}

fn load_config(path: Option<PathBuf>) -> Result<RouterBenchConfig> {
    let path = path.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
    Ok(RouterBenchConfig::load(path.as_deref())?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Run {
            skip_summary,
            models,
        } => cmd_run(config, skip_summary, &models).await?,
        Commands::Summarize => cmd_summarize(&config).await?,
        Commands::Parse { dir, key } => cmd_parse(dir, key)?,
        Commands::Models => cmd_models(&config),
    }

    Ok(())
}

fn select_models(config: &RouterBenchConfig, keys: &[String]) -> Result<Vec<ModelSpec>> {
    if keys.is_empty() {
        return Ok(config.models.clone());
    }
    keys.iter()
        .map(|key| {
            find_by_key(&config.models, key)
                .cloned()
                .with_context(|| format!("Unknown model key: {}", key))
        })
        .collect()
}

async fn cmd_run(config: RouterBenchConfig, skip_summary: bool, keys: &[String]) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let models = select_models(&config, keys)?;

    println!("{:=<60}", "");
    println!("LLM Benchmarking with OpenRouter and GenAI-Perf");
    println!("{:=<60}", "");

    let runner = GenAiPerfRunner::new(config.benchmark.clone(), &credentials, host_workspace()?)?;
    let coordinator = RunCoordinator::new(models, config.paths.clone(), Arc::new(runner));

    let (tx, mut rx) = mpsc::channel(100);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let summary = coordinator.run(&EventSink::new(tx)).await?;
    printer.await.ok();

    println!("{}", render_text_summary(&summary));
    println!("Results saved to: {}", config.paths.results_dir.display());
    println!("Summary: {}", config.paths.text_summary_path().display());
    println!("Data: {}", config.paths.results_path().display());

    if skip_summary || !config.summary.auto_generate {
        return Ok(());
    }
    // A failed narrative does not fail the run.
    if let Err(e) = generate_narrative(&config, &credentials, &summary).await {
        tracing::warn!(error = %e, "LLM summary generation had issues");
    }
    Ok(())
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::Cleaning => println!("\nCleaning old benchmark results..."),
        RunEvent::ModelStarted {
            name, index, total, ..
        } => {
            println!();
            println!("{:=<60}", "");
            println!("[{}/{}] Benchmarking: {}", index + 1, total, name);
            println!("{:=<60}", "");
        }
        RunEvent::Output { .. } => {}
        RunEvent::ModelFinished { key, success, .. } => {
            if *success {
                println!("  Completed: {}", key);
            } else {
                println!("  Failed: {} (see its genai_perf.log)", key);
            }
        }
        RunEvent::Finished { completed, total } => {
            println!("\nBenchmarking complete: {}/{} models succeeded", completed, total);
        }
    }
}

async fn generate_narrative(
    config: &RouterBenchConfig,
    credentials: &Credentials,
    summary: &RunSummary,
) -> Result<()> {
    println!();
    println!("{:=<60}", "");
    println!("Generating LLM-Powered Summary...");
    println!("{:=<60}", "");

    if summary.is_empty() {
        println!("No benchmark data found. Please run benchmarks first.");
        return Ok(());
    }

    let client = SummaryClient::new(config.summary.clone(), credentials)?;
    let narrative = client
        .summarize(summary, &config.benchmark, &config.paths)
        .await?;

    println!();
    println!("{}", narrative.text);
    println!();
    println!("Summary saved to: {}", config.paths.narrative_file.display());
    Ok(())
}

async fn cmd_summarize(config: &RouterBenchConfig) -> Result<()> {
    let credentials = Credentials::from_env()?;

    println!("Collecting benchmark results...");
    let summary = collect_results(&config.models, &config.paths);
    println!("Collected data for {} models", summary.len());

    generate_narrative(config, &credentials, &summary).await
}

fn cmd_parse(dir: PathBuf, key: Option<String>) -> Result<()> {
    let key = key
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "model".to_string());
    let model = ModelSpec::new(key.clone(), key.clone(), key);

    let result = normalize(&model, &dir)
        .with_context(|| format!("{} is not a directory", dir.display()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_models(config: &RouterBenchConfig) {
    println!();
    println!("Configured Models:");
    println!("{:-<75}", "");
    println!("  {:<4} {:<20} {:<35} {}", "#", "Key", "ID", "Name");
    println!("{:-<75}", "");
    for (i, m) in config.models.iter().enumerate() {
        println!("  {:<4} {:<20} {:<35} {}", i + 1, m.key, m.id, m.name);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "routerbench",
            "run",
            "--skip-summary",
            "--models",
            "gpt-4o-mini,llama-3.1-8b",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                skip_summary,
                models,
            } => {
                assert!(skip_summary);
                assert_eq!(models, vec!["gpt-4o-mini", "llama-3.1-8b"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_select_models_keeps_requested_order() {
        let config = RouterBenchConfig::default();
        let picked = select_models(
            &config,
            &["llama-3.1-8b".to_string(), "gpt-4o-mini".to_string()],
        )
        .unwrap();
        let keys: Vec<_> = picked.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["llama-3.1-8b", "gpt-4o-mini"]);

        assert!(select_models(&config, &["nope".to_string()]).is_err());
        assert_eq!(select_models(&config, &[]).unwrap().len(), 3);
    }
}
