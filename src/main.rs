//! Tidemark main entry point
//!
//! This is the command-line interface for the Tidemark paginated crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tidemark::config::{load_config_with_hash, Config};
use tidemark::output::{print_statistics, sinks_from_config};
use tidemark::storage::{CheckpointRecord, JsonCheckpointStore};
use tidemark::CrawlOrchestrator;
use tracing_subscriber::EnvFilter;

/// Tidemark: a resilient paginated crawler
///
/// Tidemark walks a paginated listing one page at a time, slowing down when
/// the server pushes back, and checkpoints its progress so an interrupted
/// crawl picks up where it left off.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version)]
#[command(about = "A resilient, rate-adaptive paginated crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, ignoring the existing checkpoint
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics stored in the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Run the configured sinks over the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export: bool,
}

/// Exit code for configuration and startup errors
const EXIT_STARTUP_ERROR: u8 = 1;

/// Exit code when the crawl was interrupted
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_STARTUP_ERROR)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(ExitCode::SUCCESS);
    }
    if cli.stats {
        handle_stats(&config)?;
        return Ok(ExitCode::SUCCESS);
    }
    if cli.export {
        handle_export(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    handle_crawl(config, config_hash, cli.fresh).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidemark=info,warn"),
            1 => EnvFilter::new("tidemark=debug,info"),
            2 => EnvFilter::new("tidemark=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Sets the returned flag on Ctrl-C (and SIGTERM on Unix)
///
/// A second signal exits immediately without the final checkpoint.
fn install_shutdown_handler() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("Shutdown requested; stopping after the current request (repeat to force)");
        flag.store(true, Ordering::SeqCst);

        wait_for_signal().await;
        tracing::error!("Second shutdown request; exiting without saving");
        std::process::exit(i32::from(EXIT_INTERRUPTED));
    });

    shutdown
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Tidemark Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Base URL: {}", config.crawl.base_url);
    println!(
        "  Delay: {}s initial, {}s..{}s",
        config.crawl.initial_delay, config.crawl.min_delay, config.crawl.max_delay
    );
    println!("  Max retries: {}", config.crawl.max_retries);
    println!("  Base timeout: {}s", config.crawl.base_timeout);
    println!(
        "  Checkpoint every: {} items",
        config.crawl.checkpoint_every_n_items
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nExtraction:");
    println!("  Items: {}", config.extract.item_selector);
    println!(
        "  Key: {} [{}]",
        config.extract.key_selector, config.extract.key_attribute
    );
    match &config.extract.next_page_selector {
        Some(selector) => println!("  Next page: {}", selector),
        None => println!("  Next page: (single page)"),
    }
    for (name, selector) in &config.extract.fields {
        println!("  Field {}: {}", name, selector);
    }

    println!("\nOutput:");
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    for (name, path) in [
        ("JSON", &config.output.json_path),
        ("Summary", &config.output.summary_path),
        ("Database", &config.output.database_path),
    ] {
        if let Some(path) = path {
            println!("  {}: {}", name, path);
        }
    }

    println!("\n✓ Configuration is valid");
}

fn read_checkpoint(config: &Config) -> anyhow::Result<Option<CheckpointRecord>> {
    JsonCheckpointStore::new(&config.output.checkpoint_path)
        .read_record()
        .with_context(|| {
            format!(
                "Failed to read checkpoint {}",
                config.output.checkpoint_path
            )
        })
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Checkpoint: {}\n", config.output.checkpoint_path);

    match read_checkpoint(config)? {
        Some(record) => {
            print_statistics(&record.stats);
            println!("Items stored: {}", record.items.len());
            if let Some(frontier) = &record.frontier {
                println!("Resume point: {}", frontier);
            }
            println!("Saved at: {}", record.saved_at.to_rfc3339());
        }
        None => println!("No checkpoint found"),
    }

    Ok(())
}

/// Handles the --export mode: runs the sinks over the checkpoint
fn handle_export(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Checkpoint ===\n");

    let sinks = sinks_from_config(&config.output);
    if sinks.is_empty() {
        anyhow::bail!("No sinks configured; set json-path, summary-path or database-path");
    }

    let record = read_checkpoint(config)?.with_context(|| {
        format!("No checkpoint at {}", config.output.checkpoint_path)
    })?;

    for sink in &sinks {
        sink.write(&record.items, &record.stats)
            .with_context(|| format!("Sink '{}' failed", sink.name()))?;
        println!("✓ {} export written", sink.name());
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<ExitCode> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting crawl (will resume from checkpoint if present)");
    }

    let checkpoint = JsonCheckpointStore::new(&config.output.checkpoint_path);
    let orchestrator = CrawlOrchestrator::new_with_hash(config, config_hash, fresh)
        .context("Failed to initialize crawler")?
        .with_shutdown(install_shutdown_handler());

    let report = match orchestrator.run().await {
        Ok(report) => report,
        Err(e) => {
            // The emergency checkpoint holds the stats at the point of failure
            if let Ok(Some(record)) = checkpoint.read_record() {
                println!();
                print_statistics(&record.stats);
            }
            return Err(e).context("Crawl failed");
        }
    };

    println!();
    print_statistics(&report.stats);

    // exit codes are 0, 3 and 130
    let code = u8::try_from(report.outcome.exit_code()).unwrap_or(EXIT_STARTUP_ERROR);
    Ok(ExitCode::from(code))
}
