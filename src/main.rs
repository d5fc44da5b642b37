//! Most Active Stocks - Main Entry Point
//!
//! Daily backtests of the most-active-stocks universe with a constant alpha.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use most_active_stocks::backtest::{day_bounds, BacktestConfig, BacktestEngine, CsvDataLoader, DataLoader};
use most_active_stocks::config::Config;
use most_active_stocks::strategy::{CoarseUniverseSelector, FineFundamentalFilter};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Most Active Stocks CLI
#[derive(Parser)]
#[command(name = "most-active-stocks")]
#[command(version, about = "Trade the most actively traded US equities")]
struct Cli {
    /// Write log lines as JSON objects
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest simulation on historical data
    Backtest {
        /// Path to CSV data file
        #[arg(short, long)]
        data: String,

        /// Start date (YYYY-MM-DD), defaults to the configured start
        #[arg(short, long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD), defaults to the configured end
        #[arg(short, long)]
        end: Option<NaiveDate>,

        /// Initial cash, defaults to the configured amount
        #[arg(short, long)]
        cash: Option<Decimal>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show the universe selected from one snapshot
    Universe {
        /// Path to CSV data file
        #[arg(short, long)]
        data: String,

        /// Snapshot time (RFC 3339); latest snapshot not after it is used
        #[arg(short, long)]
        at: Option<DateTime<Utc>>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.json_logs)?;

    let mut config = Config::load()?;

    match cli.command {
        Commands::Backtest {
            data,
            start,
            end,
            cash,
            output,
        } => {
            if let Some(start) = start {
                config.backtest.start_date = start;
            }
            if let Some(end) = end {
                config.backtest.end_date = end;
            }
            if let Some(cash) = cash {
                config.backtest.initial_cash = cash;
            }
            config.validate()?;
            log_config(&config);

            run_backtest(&data, config, output.as_deref())
        }
        Commands::Universe { data, at } => {
            config.validate()?;
            show_universe(&data, &config, at)
        }
    }
}

/// Initialize logging to stdout and a daily rolling file.
fn init_logging(json: bool) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "most-active-stocks.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("most_active_stocks=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    if json {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_ansi(true).init();
    }

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Coarse Universe Size: {}", config.universe.num_coarse);
    info!(
        "   Fine Filter: {} ({} on {})",
        if config.universe.fine_filter_enabled { "on" } else { "off" },
        config.universe.country,
        config.universe.allowed_exchanges.join("/")
    );
    info!("   Universe Cadence: {}d", config.universe.rebalance_cadence_days);
    info!("   Alpha Top N: {}", config.alpha.top_n);
    info!("   Insight Period: {}d", config.alpha.insight_period_days);
    info!("   Alpha Cadence: {}d", config.alpha.rebalance_cadence_days);
    info!(
        "   Suppress Repeat Insights: {}",
        config.alpha.suppress_repeat_insights
    );
}

/// Run a single backtest over the configured window.
fn run_backtest(data_path: &str, config: Config, output_dir: Option<&str>) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║              BACKTEST MODE                                 ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    let (start, end) = day_bounds(config.backtest.start_date, config.backtest.end_date)?;

    info!("📊 Loading data from: {}", data_path);
    let data_loader = CsvDataLoader::new(data_path)?;

    if let Some((data_start, data_end)) = data_loader.available_range() {
        info!(
            "   Data range: {} to {}",
            data_start.format("%Y-%m-%d"),
            data_end.format("%Y-%m-%d")
        );
    }

    info!("   Symbols: {}", data_loader.available_symbols().len());
    info!("   Snapshots: {}", data_loader.len());

    let backtest_config = BacktestConfig {
        output_path: output_dir.map(String::from),
        ..BacktestConfig::from(&config.backtest)
    };

    info!("💰 Initial cash: ${:.2}", backtest_config.initial_cash);
    info!(
        "📅 Period: {} to {}",
        config.backtest.start_date, config.backtest.end_date
    );

    let mut engine = BacktestEngine::new(data_loader, config, backtest_config);
    let result = engine.run(start, end)?;

    println!("\n{}", result.summary());

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {dir}"))?;

        let equity_path = Path::new(dir).join("equity_curve.csv");
        result.equity_to_csv(&equity_path)?;
        info!("📁 Equity curve saved to: {}", equity_path.display());

        let result_path = Path::new(dir).join("result.json");
        result.write_json(&result_path)?;
        info!("📁 Result saved to: {}", result_path.display());
    }

    Ok(())
}

/// Run coarse and fine selection on one snapshot and print the members.
fn show_universe(data_path: &str, config: &Config, at: Option<DateTime<Utc>>) -> Result<()> {
    let data_loader = CsvDataLoader::new(data_path)?;
    let snapshot = data_loader
        .snapshot_at(at)
        .context("No snapshot at or before the requested time")?;

    let selector = CoarseUniverseSelector::new(&config.universe);
    let mut members = selector.rank(&snapshot.coarse_records());

    if config.universe.fine_filter_enabled {
        let filter = FineFundamentalFilter::new(&config.universe);
        members = filter.filter(&snapshot.fine_records_for(&members));
    }

    println!(
        "Universe at {} ({} members)",
        snapshot.timestamp.to_rfc3339(),
        members.len()
    );
    println!("{:>4}  {:<10} {:>12} {:>16}", "#", "SYMBOL", "PRICE", "VOLUME");

    let index = snapshot.index();
    for (rank, symbol) in members.iter().enumerate() {
        let (price, volume) = index
            .get(symbol.as_str())
            .map(|d| (d.price.unwrap_or_default(), d.volume.unwrap_or_default()))
            .unwrap_or_default();
        println!("{:>4}  {:<10} {:>12.2} {:>16}", rank + 1, symbol, price, volume);
    }

    Ok(())
}
