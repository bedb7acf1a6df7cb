//! popflights - popular flights with a 24 hour cache
//!
//! Runs the cache gateway once, the way a page request would, and prints the
//! result. Logging goes to stderr so `--json` output on stdout stays clean.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use popflights::cli::{format_offers, format_status, Cli, Command};
use popflights::config::AppConfig;
use popflights::data::{fallback_offers, AmadeusClient, FlightOffer};
use popflights::rate_limit::{CallGuard, COUNTER_FILE};
use popflights::{CacheGateway, Clock, JsonFileStore, Offers, SystemClock};

/// Installs the stderr log subscriber; RUST_LOG overrides the default level
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("popflights=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the gateway from configuration
fn build_gateway(config: &AppConfig) -> Result<CacheGateway, Box<dyn std::error::Error>> {
    let store = JsonFileStore::resolve(config.cache_dir.as_deref())?;

    let guard = if config.rate_limit_enabled {
        CallGuard::new(store.dir().join(COUNTER_FILE), config.rate_limit_daily)
    } else {
        CallGuard::disabled()
    };

    let provider = AmadeusClient::new(config.amadeus())?;
    if !provider.has_credentials() {
        tracing::info!("no Amadeus credentials configured; cache misses will use the fallback catalogue");
    }

    tracing::debug!(cache_dir = %store.dir().display(), key = %config.cache_key, "cache location");

    Ok(CacheGateway::new(Arc::new(store), Arc::new(provider), Arc::new(SystemClock))
        .with_key(config.cache_key.clone())
        .with_ttl(config.ttl())
        .with_query(config.query())
        .with_policy(config.policy())
        .with_guard(guard))
}

fn print_offers(offers: &[FlightOffer], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(offers)?);
    } else {
        print!("{}", format_offers(offers));
    }
    Ok(())
}

fn report_source(result: &Offers) {
    tracing::info!(source = %result.source, offers = result.offers.len(), "offers ready");
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.apply_overrides(AppConfig::load(cli.config.as_deref())?);

    match cli.command() {
        Command::Fallback { json } => {
            print_offers(&fallback_offers(SystemClock.now()), json)?;
        }
        Command::Status => {
            let gateway = build_gateway(&config)?;
            println!("{}", format_status(gateway.key(), &gateway.status()));
        }
        Command::Offers { json } => {
            let gateway = build_gateway(&config)?;
            let result = gateway.fetch().await?;
            report_source(&result);
            print_offers(&result.offers, json)?;
        }
        Command::Refresh { json } => {
            let gateway = build_gateway(&config)?;
            let result = gateway.refresh().await?;
            report_source(&result);
            print_offers(&result.offers, json)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
