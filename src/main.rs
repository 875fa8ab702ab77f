use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use grocery_prices::config::MetricsConfig;
use grocery_prices::{AppConfig, PricePipeline, Snapshot, logging};

#[derive(Debug, Parser)]
#[command(name = "grocery-prices", version, about = "Collect grocery prices across store chains")]
struct Cli {
    /// Base configuration file (defaults to config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    /// Only show these stores (repeatable)
    #[arg(long = "store", global = true)]
    stores: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Return fresh cached prices or collect them
    Collect,
    /// Discard the cache and collect every store and product again
    Reload,
    /// Print the last persisted snapshot
    Show,
    /// Cheapest store per product
    Compare,
    /// Keep prices fresh until interrupted
    Watch {
        #[arg(long, default_value_t = 600)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = logging::init(&config.logging)?;

    if config.metrics.enabled {
        install_metrics_exporter(&config.metrics)?;
    }

    info!("Starting grocery price collector...");
    let pipeline = PricePipeline::from_config(&config).await?;

    match cli.command {
        Command::Collect => {
            let snapshot = pipeline.get_or_collect().await;
            print_snapshot(&snapshot.filter_stores(&cli.stores), cli.json)?;
        }
        Command::Reload => {
            let snapshot = pipeline.force_reload().await;
            print_snapshot(&snapshot.filter_stores(&cli.stores), cli.json)?;
        }
        Command::Show => {
            let snapshot = pipeline.persisted().await?;
            if snapshot.is_empty() {
                info!("no persisted snapshot yet; run `collect` first");
            }
            print_snapshot(&snapshot.filter_stores(&cli.stores), cli.json)?;
        }
        Command::Compare => {
            let snapshot = pipeline.get_or_collect().await;
            print_comparisons(&snapshot.filter_stores(&cli.stores), cli.json)?;
        }
        Command::Watch { interval_secs } => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for Ctrl-C");
                }
            };
            pipeline
                .watch(Duration::from_secs(interval_secs.max(1)), shutdown)
                .await;
        }
    }

    pipeline.store().close().await;
    info!("Shutting down...");
    Ok(())
}

fn install_metrics_exporter(config: &MetricsConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    info!(%addr, "metrics exporter listening");
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    println!(
        "{:<32} {:<16} {:>10}  {:<10} {:<14} {}",
        "PRODUCT", "STORE", "PRICE", "DATE", "STATUS", "REGION"
    );
    for record in snapshot.sorted_by_price() {
        println!(
            "{:<32} {:<16} {:>10}  {:<10} {:<14} {}",
            record.product,
            record.store,
            record.price,
            record.captured_at,
            record.status,
            record.region
        );
    }
    println!(
        "\n{} records, {} with prices, {} unavailable",
        snapshot.len(),
        snapshot.found_count(),
        snapshot.unavailable_count()
    );
    if let Some(cheapest) = snapshot.cheapest() {
        println!("Cheapest: {} at {} for {}", cheapest.product, cheapest.store, cheapest.price);
    }
    Ok(())
}

fn print_comparisons(snapshot: &Snapshot, json: bool) -> Result<()> {
    let comparisons = snapshot.comparisons();
    if json {
        println!("{}", serde_json::to_string_pretty(&comparisons)?);
        return Ok(());
    }

    println!(
        "{:<32} {:<16} {:>10} {:>10} {:>8}",
        "PRODUCT", "BEST STORE", "BEST", "AVERAGE", "SAVINGS"
    );
    for comparison in &comparisons {
        let savings = comparison
            .savings_percentage()
            .map(|pct| format!("{}%", pct))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:<16} {:>10} {:>10} {:>8}",
            comparison.product,
            comparison.best_store,
            comparison.best_price,
            comparison.average_price,
            savings
        );
    }
    Ok(())
}
