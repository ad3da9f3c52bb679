//! Pricewatch
//!
//! Command-line shell over the monitoring engine:
//! - `run` keeps the scheduler going until Ctrl+C
//! - `add`, `remove`, `list`, `contact` edit the snapshot through the registry
//! - `check` runs a single tick and exits

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pricewatch_engine::config::LogFormat;
use pricewatch_engine::models::{UserContact, WatchedItem};
use pricewatch_engine::services::build_sampler;
use pricewatch_engine::{AppConfig, AppError, AppResult, AppState};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(version, about = "Track product prices and get alerted when they hit your target")]
struct Args {
    /// Path to config file (falls back to PRICEWATCH_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monitor prices until interrupted
    Run,
    /// Sample every item once and exit
    Check,
    /// Start tracking a product
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Target price, e.g. 49.99
        #[arg(long)]
        target: Decimal,
    },
    /// Stop tracking products by id
    Remove {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Show tracked products
    List,
    /// Set or clear the alert contact
    Contact {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, conflicts_with_all = ["email", "phone"])]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var("PRICEWATCH_CONFIG").ok().map(PathBuf::from));

    let config = AppConfig::load(config_path.as_deref()).context("load configuration")?;
    init_tracing(&config);

    let state = AppState::initialize(config)
        .await
        .context("initialize application state")?;

    if let Err(e) = execute(state, args.command).await {
        if e.is_caller_error() {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
        return Err(e.into());
    }
    Ok(())
}

async fn execute(state: AppState, command: Command) -> AppResult<()> {
    match command {
        Command::Run => run(state).await,
        Command::Check => check(state).await,
        Command::Add { name, url, target } => {
            let id = state.registry.add(&name, &url, target).await?;
            state.save().await?;
            println!("Added {} ({})", name, id);
            Ok(())
        }
        Command::Remove { ids } => {
            let removed = state.registry.remove(&ids).await;
            state.save().await?;
            println!("Removed {} product(s)", removed);
            Ok(())
        }
        Command::List => {
            print_items(&state.registry.list().await);
            Ok(())
        }
        Command::Contact { email, phone, clear } => {
            if clear {
                state.registry.set_contact(None).await;
                println!("Contact cleared");
            } else {
                let contact = UserContact::new(email, phone).map_err(AppError::Validation)?;
                state.registry.set_contact(Some(contact)).await;
                println!("Contact updated");
            }
            state.save().await
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("pricewatch_engine={},pricewatch={}", config.log_level, config.log_level).into()
    });

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn run(state: AppState) -> AppResult<()> {
    info!("Pricewatch starting");
    info!("Snapshot: {}", state.config.snapshot.path.display());
    info!("Tracking: {} products", state.registry.len().await);

    let sampler = build_sampler(&state.config.sampler, state.config.monitor.sampler_timeout())?;
    let scheduler = Arc::new(state.scheduler(sampler));

    // Surface alerts on the console
    let mut alerts = state.dispatcher.subscribe();
    let alert_printer = tokio::spawn(async move {
        while let Ok(payload) = alerts.recv().await {
            println!("\n{}\n", payload.message());
        }
    });

    let handle = scheduler.spawn();
    info!("Press Ctrl+C to shutdown gracefully");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutdown signal received, shutting down gracefully...");
    handle.stop().await;
    alert_printer.abort();

    info!("Pricewatch shutdown complete");
    Ok(())
}

async fn check(state: AppState) -> AppResult<()> {
    let sampler = build_sampler(&state.config.sampler, state.config.monitor.sampler_timeout())?;
    let scheduler = state.scheduler(sampler);

    let report = scheduler.run_tick().await;
    scheduler.persist(true).await;

    println!(
        "Checked {} products: {} sampled, {} failed, {} alert(s)",
        report.items,
        report.sampled,
        report.failed,
        report.alerts.len()
    );
    for alert in &report.alerts {
        println!("\n{}", alert.payload.message());
    }
    print_items(&state.registry.list().await);
    Ok(())
}

fn print_items(items: &[WatchedItem]) {
    println!("Tracking: {} products", items.len());
    for item in items {
        let price = |p: Option<Decimal>| {
            p.map(|p| format!("${:.2}", p.round_dp(2)))
                .unwrap_or_else(|| "-".to_string())
        };
        let last_drop = item
            .last_drop_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        println!(
            "{}  {:<30} now {:>12}  low {:>12}  target ${:.2}  drop {}  {}  {}",
            item.id,
            item.name,
            price(item.current_price),
            price(item.lowest_observed_price),
            item.target_price.round_dp(2),
            last_drop,
            item.status.label(),
            item.source_url
        );
    }
}
