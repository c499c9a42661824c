//! Ripple-Fetch main entry point
//!
//! Command-line interface over the domain-aware fetch orchestrator.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ripple_fetch::config::{load_config_with_hash, Config};
use ripple_fetch::crawler::Discovery;
use ripple_fetch::orchestrator::{FetchOptions, Orchestrator};
use ripple_fetch::output;
use ripple_fetch::strategy::Strategy;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ripple-Fetch: a domain-aware fetch orchestrator
///
/// Fetches pages through a remote fetch service, a headless-browser renderer
/// or directly, while keeping every domain within its concurrency, rate and
/// failure limits.
#[derive(Parser, Debug)]
#[command(name = "ripple-fetch")]
#[command(version = "1.0.0")]
#[command(about = "A domain-aware fetch orchestrator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page with fallback and quality escalation
    Fetch {
        url: String,

        /// Start from this backend (remote, browser, local)
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Referer header to send
        #[arg(long)]
        referer: Option<String>,

        /// Do not attach configured credentials
        #[arg(long)]
        no_credentials: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a resource and print the body without extraction
    Raw {
        url: String,

        #[arg(long)]
        strategy: Option<Strategy>,
    },

    /// Fetch several pages concurrently
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Breadth-first link discovery from a seed URL
    Discover {
        seed: String,

        #[arg(long)]
        max_depth: Option<u32>,

        #[arg(long)]
        max_urls: Option<usize>,
    },

    /// Query each configured backend's health endpoint
    Health,

    /// Validate the config and show what would be used
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if let Command::Check = cli.command {
        handle_check(&config, &hash);
        return Ok(());
    }

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

    match cli.command {
        Command::Fetch {
            url,
            strategy,
            referer,
            no_credentials,
            json,
        } => {
            let options = FetchOptions {
                forced_strategy: strategy,
                referer,
                skip_credentials: no_credentials,
                ..FetchOptions::default()
            };
            let result = orchestrator.fetch(&url, &options).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                output::print_fetch_result(&result);
                println!();
                output::print_domain_stats(&orchestrator.scheduler().stats());
            }

            if !result.success {
                std::process::exit(1);
            }
        }
        Command::Raw { url, strategy } => {
            let options = FetchOptions {
                forced_strategy: strategy,
                ..FetchOptions::default()
            };
            let raw = orchestrator.fetch_raw(&url, &options).await?;
            output::print_raw_result(&raw);
        }
        Command::Batch { urls, json } => {
            let results = orchestrator.fetch_batch(&urls, &FetchOptions::default()).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                output::print_batch(&results);
                output::print_domain_stats(&orchestrator.scheduler().stats());
            }
        }
        Command::Discover {
            seed,
            max_depth,
            max_urls,
        } => {
            let mut discovery_config = config.discovery.clone();
            if let Some(depth) = max_depth {
                discovery_config.max_depth = depth;
            }
            if let Some(limit) = max_urls {
                anyhow::ensure!(limit >= 1, "--max-urls must be >= 1");
                discovery_config.max_urls = limit;
            }

            let mut discovery = Discovery::new(
                orchestrator.clone(),
                discovery_config,
                &config.user_agent.crawler_name,
            );
            let report = discovery.run(&seed).await?;

            output::print_discovery_report(&report);
            output::print_domain_stats(&orchestrator.scheduler().stats());
        }
        Command::Health => {
            let health = orchestrator.health().await;
            output::print_health(&health);

            if health.iter().any(|h| !h.available) {
                std::process::exit(1);
            }
        }
        Command::Check => {}
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_fetch=info,warn"),
            1 => EnvFilter::new("ripple_fetch=debug,info"),
            2 => EnvFilter::new("ripple_fetch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles `check`: prints the effective configuration without fetching
fn handle_check(config: &Config, hash: &str) {
    println!("=== Ripple-Fetch Configuration ===\n");

    println!("Scheduler:");
    println!(
        "  Default limits: {} concurrent, {} rps",
        config.scheduler.default_max_concurrent, config.scheduler.default_rps
    );
    let cb = &config.circuit_breaker;
    println!(
        "  Circuit breaker: open after {} failures for {}ms",
        cb.fail_threshold, cb.open_duration_ms
    );
    println!(
        "  Backoff: {}ms .. {}ms, max admission wait {}ms",
        cb.initial_backoff_ms, cb.max_backoff_ms, cb.max_admission_wait_ms
    );

    println!("\nDomain Limits ({}):", config.domain_limits.len());
    for entry in &config.domain_limits {
        println!(
            "  - {} (max-concurrent: {}, rps: {})",
            entry.domain,
            entry.max_concurrent.map_or("default".to_string(), |v| v.to_string()),
            entry.rps.map_or("default".to_string(), |v| v.to_string())
        );
    }

    println!("\nBackends:");
    match &config.backends.remote {
        Some(remote) => println!("  remote:  {}", remote.url),
        None => println!("  remote:  (not configured)"),
    }
    match &config.backends.browser {
        Some(browser) => println!(
            "  browser: {} ({}x{}, wait until {})",
            browser.url, browser.viewport_width, browser.viewport_height, browser.wait_until
        ),
        None => println!("  browser: (not configured)"),
    }
    println!("  local:   always available");

    println!("\nStrategy:");
    println!("  Default: {}", config.strategy.default);
    println!(
        "  Quality: text >= {} chars, title >= {} chars",
        config.strategy.min_text_length, config.strategy.min_title_length
    );
    println!("\nRules ({}):", config.rules.len());
    for rule in &config.rules {
        let scroll = if rule.needs_scroll { ", scroll" } else { "" };
        println!("  - {} -> {}{}", rule.domain, rule.strategy, scroll);
    }

    println!("\nCredentials ({}):", config.credentials.len());
    for entry in &config.credentials {
        let auth = if entry.requires_auth { " (required)" } else { "" };
        println!("  - {}{}", entry.domain, auth);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\n✓ Configuration is valid");
    println!("  Hash: {}", hash);
}
