//! Batch-resolve a JSON file of requests.
//!
//! Reads an array of resolution requests, resolves them as one batch job
//! against in-memory stores and writes the finished job as JSON.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use entity_resolution::resolver::{CancellationToken, Collaborators, ResolutionRequest, Resolver};
use entity_resolution::{Config, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(name = "entity-resolve", version, about = "Resolve identity records into canonical entities")]
struct Cli {
    /// JSON file holding an array of resolution requests.
    #[arg(short, long)]
    input: PathBuf,

    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the job JSON; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("entity-resolve error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    let raw = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let requests: Vec<ResolutionRequest> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of requests", cli.input.display()))?;

    let resolver = Resolver::new(&config, Collaborators::in_memory())?;
    let job = resolver.run_batch(&requests, &CancellationToken::new())?;
    resolver.flush_side_effects()?;

    let rendered = serde_json::to_string_pretty(&job)?;
    match cli.output {
        Some(path) => fs::write(&path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }

    tracing::info!(
        job_id = %job.id,
        results = job.results.len(),
        errors = job.errors.len(),
        "done"
    );
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("ER_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match logging.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    result.map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}
