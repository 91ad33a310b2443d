//! Interactive investigator shell.

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vigild::config::VigilConfig;
use vigild::log_source::JsonlLogStore;
use vigild::reasoning::OllamaClient;
use vigild::session::InvestigationSession;
use vigild::telemetry::SystemTelemetry;

#[derive(Parser, Debug)]
#[command(name = "vigild", version, about = "Conversational machine-health investigator")]
struct Args {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of exported log dumps, overriding the config
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Reasoning model name, overriding the config
    #[arg(short, long)]
    model: Option<String>,

    /// Reasoning endpoint URL, overriding the config
    #[arg(long)]
    ollama_url: Option<String>,

    /// Run a single query and exit instead of starting the shell
    query: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = VigilConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.log_dir {
        config.logs.directory = dir;
    }
    if let Some(model) = args.model {
        config.reasoning.model = model;
    }
    if let Some(url) = args.ollama_url {
        config.reasoning.url = url;
    }

    let reasoning = OllamaClient::new(&config.reasoning);
    if !reasoning.is_available().await {
        warn!(
            "reasoning endpoint {} is unreachable; log search still works, analysis will degrade",
            config.reasoning.url
        );
    }

    let logs = JsonlLogStore::new(config.logs.directory.clone(), config.engine.batch_size);
    let telemetry = SystemTelemetry::new();

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(status) = progress_rx.recv().await {
            println!("{}", status.dimmed());
        }
    });

    let mut session = InvestigationSession::new(&config, logs, telemetry, reasoning)
        .with_progress(progress_tx);

    if let Some(query) = args.query {
        let reply = session.submit_turn(&query).await;
        println!("\n{}", reply);
        return Ok(());
    }

    println!(
        "{} {}",
        "vigil".bold().green(),
        format!("(model: {})", config.reasoning.model).dimmed()
    );
    println!("Ask about your machine. Type 'exit' to leave.\n");

    let stdin = io::stdin();
    loop {
        print!("{} ", "you>".bold().cyan());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = session.submit_turn(input).await;
        println!("\n{}\n", reply);
    }

    println!("{}", "bye".dimmed());
    Ok(())
}
