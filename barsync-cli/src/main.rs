//! Barsync CLI — sync and check commands.
//!
//! Commands:
//! - `sync`: fetch every instrument's daily history from the quote
//!   gateway, encode each as Parquet, and upload to the ingestion endpoint
//! - `check`: validate configuration and probe the gateway with a
//!   login/logout round trip
//!
//! Configuration comes from the environment (a `.env` file is honored):
//! `WORKER_ENDPOINT`, `WORKER_AUTH_TOKEN`, and optionally `GATEWAY_URL`.
//! `RUST_LOG` controls diagnostic logging.

use anyhow::{bail, Context, Result};
use barsync_core::config::Config;
use barsync_core::pipeline::{self, RetryPolicy, RunOptions, StdoutProgress};
use barsync_core::source::{GatewaySession, MarketSession};
use barsync_core::upload::{DryRunUploader, HttpUploader, Uploader};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "barsync", about = "Daily full-history sync pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, encode, and upload every instrument's daily history.
    Sync {
        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2008-01-01")]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Process only the first N enumerated instruments.
        #[arg(long)]
        limit: Option<usize>,

        /// Whole-run attempts before giving up.
        #[arg(long, default_value_t = 3)]
        max_attempts: u32,

        /// Seconds to wait between attempts.
        #[arg(long, default_value_t = 5)]
        backoff_secs: u64,

        /// Quote gateway base URL (overrides GATEWAY_URL).
        #[arg(long)]
        gateway: Option<String>,

        /// Ingestion endpoint URL (overrides WORKER_ENDPOINT).
        #[arg(long)]
        endpoint: Option<String>,

        /// Fetch and encode normally but log uploads instead of POSTing.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Validate configuration and probe the gateway with login/logout.
    Check {
        /// Quote gateway base URL (overrides GATEWAY_URL).
        #[arg(long)]
        gateway: Option<String>,
    },
}

fn main() -> Result<()> {
    load_dotenv();
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            start,
            end,
            limit,
            max_attempts,
            backoff_secs,
            gateway,
            endpoint,
            dry_run,
        } => run_sync(
            start,
            end,
            limit,
            max_attempts,
            backoff_secs,
            gateway,
            endpoint,
            dry_run,
        ),
        Commands::Check { gateway } => run_check(gateway),
    }
}

/// Load a `.env` file when present. Absence is fine; a malformed file is
/// reported but not fatal.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("warning: .env not loaded: {e}"),
    }
}

/// Diagnostic logging, gated by RUST_LOG (default: warnings only).
/// User-facing progress prints to stdout regardless.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("tracing init")?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_sync(
    start: String,
    end: Option<String>,
    limit: Option<usize>,
    max_attempts: u32,
    backoff_secs: u64,
    gateway: Option<String>,
    endpoint: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let start_date =
        NaiveDate::parse_from_str(&start, "%Y-%m-%d").context("invalid --start date")?;
    let end_date = end
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("invalid --end date")?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    if end_date < start_date {
        bail!("--end {end_date} is before --start {start_date}");
    }

    let config = Config::from_env().context("configuration")?;
    let gateway_url = gateway.unwrap_or(config.gateway_url);
    let endpoint_url = endpoint.unwrap_or(config.endpoint);

    let mut opts = RunOptions::new(start_date, end_date);
    opts.limit = limit;
    let policy = RetryPolicy::new(max_attempts, Duration::from_secs(backoff_secs));

    let uploader: Box<dyn Uploader> = if dry_run {
        println!("Dry run: nothing will be uploaded.");
        Box::new(DryRunUploader)
    } else {
        Box::new(HttpUploader::new(
            endpoint_url,
            config.auth_token.as_str(),
        ))
    };

    println!("Gateway: {gateway_url}");
    let mut session = GatewaySession::new(gateway_url.as_str());

    match pipeline::run(
        &mut session,
        uploader.as_ref(),
        &opts,
        &policy,
        &StdoutProgress,
    ) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("Sync failed: {e}");
            std::process::exit(1);
        }
    }
}

fn run_check(gateway: Option<String>) -> Result<()> {
    let config = Config::from_env().context("configuration")?;
    println!("Config OK: endpoint {}", config.endpoint);

    let gateway_url = gateway.unwrap_or(config.gateway_url);
    println!("Probing gateway at {gateway_url}...");

    let mut session = GatewaySession::new(gateway_url.as_str());
    match session.open() {
        Ok(()) => {
            session.close();
            println!("Gateway OK: login/logout round trip succeeded");
            Ok(())
        }
        Err(e) => {
            eprintln!("Gateway check failed: {e}");
            std::process::exit(1);
        }
    }
}
