//! Backtesting module for the most-active-stocks strategy.
//!
//! This module provides:
//! - Historical data loading (CSV import)
//! - Daily simulation engine (universe, alpha, equal-weight execution)
//! - Performance metrics calculation
//!
//! # Example
//!
//! ```rust,ignore
//! use most_active_stocks::backtest::{BacktestEngine, CsvDataLoader, BacktestConfig};
//!
//! let loader = CsvDataLoader::new("data/daily.csv")?;
//! let mut engine = BacktestEngine::new(loader, Config::default(), BacktestConfig::default());
//!
//! let result = engine.run(start, end)?;
//! println!("Return: {:.2}%", result.metrics.total_return_pct);
//! ```

mod data;
mod engine;
mod metrics;

pub use data::{CsvDataLoader, DataLoader, MarketSnapshot, SymbolData};
pub use engine::{BacktestEngine, BacktestResult, StepResult};
pub use metrics::{ActivityCounts, BacktestMetrics, EquityPoint};

use crate::config::BacktestWindowConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration for a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Initial capital for the backtest
    pub initial_cash: Decimal,

    /// Whether to record every equity point
    pub record_equity_curve: bool,

    /// Directory to write results to (optional)
    pub output_path: Option<String>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: Decimal::new(10000, 0), // $10,000
            record_equity_curve: true,
            output_path: None,
        }
    }
}

impl From<&BacktestWindowConfig> for BacktestConfig {
    fn from(window: &BacktestWindowConfig) -> Self {
        Self {
            initial_cash: window.initial_cash,
            ..Self::default()
        }
    }
}

/// Convert an inclusive date range to UTC timestamps covering both whole days.
pub fn day_bounds(start: NaiveDate, end: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_time = start
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid start date: {start}"))?
        .and_utc();
    let end_time = end
        .and_hms_opt(23, 59, 59)
        .with_context(|| format!("Invalid end date: {end}"))?
        .and_utc();

    anyhow::ensure!(
        start_time < end_time,
        "Start date {start} must not be after end date {end}"
    );

    Ok((start_time, end_time))
}
