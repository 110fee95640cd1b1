//! Gear-Sweep main entry point
//!
//! This is the command-line interface for the Gear-Sweep equipment search.

use anyhow::{bail, Context, Result};
use clap::Parser;
use gear_sweep::config::{load_config_with_hash, Config};
use gear_sweep::output::{
    print_history, print_json, print_ranking, print_results, print_summary,
    write_markdown_report,
};
use gear_sweep::storage::{open_storage, ListingStore};
use gear_sweep::tracker::strategy_for_level;
use gear_sweep::{CrawlMode, CrawlRequest, EvasionLevel, FallbackResolver, SourceTracker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Gear-Sweep: multi-source used equipment search
///
/// Gear-Sweep searches marketplaces, auction and surplus sites for equipment
/// listings, falling back to stored listings or synthetic data when sources
/// fail or block the crawler.
#[derive(Parser, Debug)]
#[command(name = "gear-sweep")]
#[command(version = "1.0.0")]
#[command(about = "Multi-source used equipment search", long_about = None)]
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

    /// Search for listings matching this query
    #[arg(long, conflicts_with_all = ["ranking", "summary", "reset_source", "history", "dry_run"])]
    query: Option<String>,

    /// Maximum number of listings returned (defaults to the config value)
    #[arg(long, requires = "query")]
    limit: Option<usize>,

    /// Where results may come from: auto, mock or real
    #[arg(long, requires = "query")]
    mode: Option<String>,

    /// Drop listings priced above this amount
    #[arg(long, requires = "query")]
    max_price: Option<f64>,

    /// Print the response as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Also write the results as a markdown report
    #[arg(long, value_name = "FILE", requires = "query")]
    export: Option<PathBuf>,

    /// Show sources ranked by success rate and exit
    #[arg(long)]
    ranking: bool,

    /// Show totals across all tracked sources and exit
    #[arg(long)]
    summary: bool,

    /// Reset a source's evasion level back to low and exit
    #[arg(long, value_name = "NAME")]
    reset_source: Option<String>,

    /// Show recent searches and exit
    #[arg(long)]
    history: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let tracker = Arc::new(SourceTracker::open(Path::new(&config.output.metrics_path)));

    if cli.ranking {
        let ranking = tracker.ranking();
        if cli.json {
            print_json(&ranking)?;
        } else {
            print_ranking(&ranking);
        }
    } else if cli.summary {
        let summary = tracker.performance_summary();
        if cli.json {
            print_json(&summary)?;
        } else {
            print_summary(&summary);
        }
    } else if let Some(source) = &cli.reset_source {
        if !tracker.reset_evasion(source) {
            bail!("source '{}' has no tracked metrics", source);
        }
        println!("✓ Evasion level of '{}' reset to low", source);
    } else if cli.history {
        handle_history(&config, cli.json)?;
    } else if let Some(query) = &cli.query {
        handle_search(&cli, &config, tracker, query).await?;
    } else {
        bail!("nothing to do: pass --query, --ranking, --summary, --reset-source, --history or --dry-run");
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gear_sweep=info,warn"),
            1 => EnvFilter::new("gear_sweep=debug,info"),
            2 => EnvFilter::new("gear_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: shows the sources and tiers a search would use
fn handle_dry_run(config: &Config) {
    println!("=== Gear-Sweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Pool size: {}", config.crawler.pool_size);
    println!("  Worker timeout: {}ms", config.crawler.worker_timeout_ms);
    println!("  Global deadline: {}ms", config.crawler.global_deadline_ms);
    println!(
        "  Proxy: {}",
        config.crawler.proxy_url.as_deref().unwrap_or("(none)")
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Metrics: {}", config.output.metrics_path);

    println!("\nSearch Defaults:");
    println!("  Limit: {}", config.search.default_limit);
    println!("  Mode: {}", config.search.default_mode);

    println!("\nSources ({}):", config.sources.len());
    for entry in &config.sources {
        println!(
            "  - {} ({:?}{}){}",
            entry.name,
            entry.kind,
            entry
                .base_url
                .as_deref()
                .map(|u| format!(", {}", u))
                .unwrap_or_default(),
            if entry.enabled { "" } else { " [disabled]" }
        );
    }

    println!("\nEvasion Levels:");
    for level in [EvasionLevel::Low, EvasionLevel::Medium, EvasionLevel::High] {
        let strategy = strategy_for_level(level);
        println!(
            "  {}: {:?}-{:?} think time, {} identities, proxy {}",
            level.label(),
            strategy.delay_range.0,
            strategy.delay_range.1,
            strategy.candidate_headers.len(),
            if strategy.requires_proxy { "required" } else { "not used" }
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} enabled sources",
        config.enabled_sources().count()
    );
}

/// Handles the --history mode: lists recent searches from the database
fn handle_history(config: &Config, json: bool) -> Result<()> {
    let store = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open database {}", config.output.database_path))?;
    let searches = store.recent_searches(25)?;

    if json {
        print_json(&searches)?;
    } else {
        print_history(&searches);
    }
    Ok(())
}

/// Handles a search: resolves the request and prints or exports the response
async fn handle_search(
    cli: &Cli,
    config: &Config,
    tracker: Arc<SourceTracker>,
    query: &str,
) -> Result<()> {
    let mode: CrawlMode = match cli.mode.as_deref() {
        Some(mode) => mode.parse()?,
        None => config.search.default_mode,
    };
    let limit = cli.limit.unwrap_or(config.search.default_limit);
    let request = CrawlRequest::new(query, limit, mode, cli.max_price)?;

    let resolver = FallbackResolver::from_config(config, tracker)?;
    let response = resolver.resolve(&request).await?;

    if cli.json {
        print_json(&response)?;
    } else {
        print_results(&response);
    }

    if let Some(path) = &cli.export {
        write_markdown_report(&response, path)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        if !cli.json {
            println!("\n✓ Report exported to: {}", path.display());
        }
    }

    Ok(())
}
