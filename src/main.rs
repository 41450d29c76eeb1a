use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use switchyard::{
    config::{AppConfig, SourceKind},
    domain::DynamicResource,
    init_logging,
    sources::{FileSource, MemorySource, WatchOpts},
    SnapshotAggregator, APP_NAME, VERSION,
};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Resilience and consistency layer for an Envoy gateway control plane")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured sources and log every aggregated snapshot
    Run {
        /// Configuration file (YAML, TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Namespace to watch; empty watches all namespaces
        #[arg(short, long, default_value = "")]
        namespace: String,
    },

    /// Load and validate the configuration, then exit
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists, before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::CheckConfig { config } => {
            let config = AppConfig::load(config.as_deref()).context("invalid configuration")?;
            println!(
                "Configuration OK: {} source(s), sanitizer {}",
                config.sources.len(),
                if config.sanitizer.enabled { "enabled" } else { "disabled (strict)" }
            );
            Ok(())
        }
        Commands::Run { config, namespace } => {
            let config = AppConfig::load(config.as_deref()).context("invalid configuration")?;
            run(config, namespace).await
        }
    }
}

async fn run(config: AppConfig, namespace: String) -> anyhow::Result<()> {
    init_logging(&config.observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting Switchyard");

    let mut aggregator = SnapshotAggregator::<DynamicResource>::new(&config.aggregator);
    for source in &config.sources {
        match source.kind {
            SourceKind::File => {
                let dir = source
                    .path
                    .clone()
                    .with_context(|| format!("file source '{}' has no path", source.name))?;
                info!(source = %source.name, dir = %dir.display(), "Registering file source");
                let watcher = FileSource::polling(source.name.clone(), dir, source.refresh());
                aggregator.register(source.name.clone(), Arc::new(watcher))?;
            }
            SourceKind::Memory => {
                warn!(source = %source.name, "Memory source starts empty when run standalone");
                aggregator.register(source.name.clone(), Arc::new(MemorySource::new(source.name.clone())))?;
            }
        }
    }
    if aggregator.source_names().is_empty() {
        warn!("No sources configured; only empty snapshots will be produced");
    }

    let cancel = CancellationToken::new();
    let mut watch = aggregator
        .watch(&namespace, &WatchOpts::new(cancel.clone()))
        .await
        .context("failed to start aggregator")?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    let mut errors_open = true;
    loop {
        tokio::select! {
            snapshot = watch.snapshots.recv() => match snapshot {
                Some(snapshot) => {
                    let per_source: Vec<String> = snapshot
                        .sources()
                        .iter()
                        .map(|s| format!("{}={}", s.source, s.resources.len()))
                        .collect();
                    info!(
                        hash = %switchyard::hashing::hash_hex(snapshot.hash()),
                        resources = snapshot.len(),
                        sources = %per_source.join(","),
                        "Aggregated snapshot"
                    );
                }
                None => break,
            },
            source_error = watch.errors.recv(), if errors_open => match source_error {
                Some(source_error) => warn!(
                    source = %source_error.source_name,
                    error = %source_error.error,
                    "Source reported an error"
                ),
                None => errors_open = false,
            },
        }
    }

    // Drain remaining errors so the drain tasks can exit.
    while let Some(source_error) = watch.errors.recv().await {
        warn!(source = %source_error.source_name, error = %source_error.error, "Source reported an error");
    }
    watch.done.await.context("aggregator task panicked")?;
    info!("Switchyard shutdown completed");
    Ok(())
}
