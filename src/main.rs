//! Company Harvester main entry point
//!
//! This is the command-line interface for the company listing harvester.

use clap::Parser;
use company_harvester::config::{load_config_with_hash, Config, ProxyBackend};
use company_harvester::crawler::{page_url, run_harvest, CancelToken};
use company_harvester::storage::open_store;
use company_harvester::{HarvestError, SkipReport, Store};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Company Harvester: a proxy-rotating listing scraper
///
/// Walks the paginated company listings of every configured category,
/// stores the companies in SQLite and writes pages that could not be
/// fetched to a JSON skip report.
#[derive(Parser, Debug)]
#[command(name = "company-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A proxy-rotating company listing harvester", long_about = None)]
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

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "replay"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "replay"])]
    stats: bool,

    /// Re-fetch only the pages listed in a skip report
    #[arg(long, value_name = "SKIP_REPORT", conflicts_with_all = ["dry_run", "stats"])]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::from(1);
        }
    };

    let result = if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(&config, &config_hash, cli.replay.as_deref()).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal_abort() => ExitCode::from(2),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(1)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("company_harvester=info,warn"),
            1 => EnvFilter::new("company_harvester=debug,info"),
            2 => EnvFilter::new("company_harvester=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved config and first page URLs
fn handle_dry_run(config: &Config) {
    println!("=== Company Harvester Dry Run ===\n");

    println!("Fetch:");
    println!("  Max attempts per page: {}", config.fetch.max_attempts);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.fetch.timeout_secs, config.fetch.connect_timeout_secs
    );
    println!("  Retry delay: {}ms", config.fetch.retry_delay_ms);
    println!("  User agent: {}", config.fetch.user_agent);

    println!("\nProxy backend: {:?}", config.proxy.backend);
    match config.proxy.backend {
        ProxyBackend::Residential => {
            if let Some(r) = &config.proxy.residential {
                println!("  Gateway: {}:{}", r.host, r.port);
                println!("  Countries: {}", r.countries.join(", "));
                println!("  Sticky sessions: {}", r.sticky_sessions);
            }
        }
        ProxyBackend::Relay => {
            if let Some(r) = &config.proxy.relay {
                println!("  Relay: socks5h://{}:{}", r.host, r.port);
            }
        }
        ProxyBackend::PublicList => {
            if let Some(p) = &config.proxy.public_list {
                println!("  Proxies: {}", p.proxies.len());
                println!("  Evict after {} failures", p.max_failures);
            }
        }
    }

    println!("\nOutput:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Write mode: {:?}", config.storage.write_mode);
    println!("  Skip report: {}", config.report.skip_report_path);

    println!("\nCategories ({}):", config.categories.len());
    for category in &config.categories {
        println!(
            "  - {}",
            page_url(&category.url, &config.pagination.page_path, 1)
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows what the database holds
fn handle_stats(config: &Config) -> Result<(), HarvestError> {
    println!("Database: {}\n", config.storage.database_path);

    let store = open_store(
        Path::new(&config.storage.database_path),
        config.storage.write_mode,
    )?;

    println!("Companies: {}", store.count()?);
    for (category, count) in store.count_by_category()? {
        println!("  {:>8}  {}", count, category);
    }

    match store.get_latest_run()? {
        Some(run) => println!(
            "\nLast run: #{} started {} ({})",
            run.id,
            run.started_at,
            run.status.to_db_string()
        ),
        None => println!("\nNo runs recorded yet"),
    }

    Ok(())
}

/// Handles the main harvest, or a replay of an earlier skip report
async fn handle_harvest(
    config: &Config,
    config_hash: &str,
    replay: Option<&Path>,
) -> Result<(), HarvestError> {
    let replay = match replay {
        Some(path) => {
            let entries = SkipReport::load(path)?;
            tracing::info!(
                "Replaying {} pages from {}",
                entries.len(),
                path.display()
            );
            Some(entries)
        }
        None => {
            tracing::info!("Harvesting {} categories", config.categories.len());
            None
        }
    };

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page");
            signal_token.cancel();
        }
    });

    let summary = run_harvest(config, config_hash, cancel, replay).await?;

    if summary.cancelled {
        tracing::info!("Harvest cancelled");
    }
    println!(
        "Pages harvested: {}, skipped: {}",
        summary.pages_harvested, summary.pages_skipped
    );
    println!(
        "Companies inserted: {}, updated: {}, already stored: {}",
        summary.records_inserted, summary.records_updated, summary.records_skipped
    );
    if summary.pages_skipped > 0 {
        println!("Skip report: {}", config.report.skip_report_path);
    }

    Ok(())
}
