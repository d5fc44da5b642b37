//! Configuration management for the most-active-stocks strategy.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coarse/fine universe selection criteria
    #[serde(default)]
    pub universe: UniverseConfig,
    /// Constant alpha model parameters
    #[serde(default)]
    pub alpha: AlphaConfig,
    /// Backtest window and capital
    #[serde(default)]
    pub backtest: BacktestWindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Maximum number of symbols kept by the coarse (liquidity) pass
    #[serde(default = "default_num_coarse")]
    pub num_coarse: usize,
    /// Maximum number of symbols kept by the fine (metadata) pass
    #[serde(default = "default_num_fine")]
    pub num_fine: usize,
    /// Country id a company must report to pass the fine filter
    #[serde(default = "default_country")]
    pub country: String,
    /// Primary exchange ids accepted by the fine filter
    #[serde(default = "default_allowed_exchanges")]
    pub allowed_exchanges: Vec<String>,
    /// Run the fine filter as a second pass over coarse members
    #[serde(default = "default_fine_filter_enabled")]
    pub fine_filter_enabled: bool,
    /// Minimum days between two universe rebalances
    #[serde(default = "default_rebalance_cadence_days")]
    pub rebalance_cadence_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaConfig {
    /// Number of highest-volume tracked symbols that receive an insight
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Horizon of each emitted insight in days
    #[serde(default = "default_insight_period_days")]
    pub insight_period_days: u32,
    /// Minimum days between two alpha updates
    #[serde(default = "default_rebalance_cadence_days")]
    pub rebalance_cadence_days: u32,
    /// Skip symbols whose previous insight is still within its period.
    /// Off by default: every due update re-emits for the whole top-N.
    #[serde(default)]
    pub suppress_repeat_insights: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestWindowConfig {
    /// Starting cash in account currency
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    /// First day of the simulation (inclusive)
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    /// Last day of the simulation (inclusive)
    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,
}

// Default value functions
fn default_num_coarse() -> usize {
    500
}

fn default_num_fine() -> usize {
    500
}

fn default_country() -> String {
    "USA".to_string()
}

fn default_allowed_exchanges() -> Vec<String> {
    // NYSE and NASDAQ primary listing ids
    vec!["NYS".to_string(), "NAS".to_string()]
}

fn default_fine_filter_enabled() -> bool {
    true
}

fn default_rebalance_cadence_days() -> u32 {
    1
}

fn default_top_n() -> usize {
    10
}

fn default_insight_period_days() -> u32 {
    1
}

fn default_initial_cash() -> Decimal {
    Decimal::new(10000, 0) // $10,000
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 7).unwrap_or_default()
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 9, 27).unwrap_or_default()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("MAS")
                    .list_separator(",")
                    .with_list_parse_key("universe.allowed_exchanges")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.universe.num_coarse > 0, "num_coarse must be > 0");
        anyhow::ensure!(self.universe.num_fine > 0, "num_fine must be > 0");
        anyhow::ensure!(
            !self.universe.allowed_exchanges.is_empty(),
            "allowed_exchanges must not be empty"
        );
        anyhow::ensure!(
            self.universe.rebalance_cadence_days >= 1 && self.alpha.rebalance_cadence_days >= 1,
            "rebalance_cadence_days must be >= 1"
        );
        anyhow::ensure!(self.alpha.top_n > 0, "top_n must be > 0");
        anyhow::ensure!(
            self.alpha.insight_period_days >= 1,
            "insight_period_days must be >= 1"
        );
        anyhow::ensure!(
            self.backtest.initial_cash > Decimal::ZERO,
            "initial_cash must be positive"
        );
        anyhow::ensure!(
            self.backtest.start_date <= self.backtest.end_date,
            "start_date must not be after end_date"
        );

        Ok(())
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            num_coarse: default_num_coarse(),
            num_fine: default_num_fine(),
            country: default_country(),
            allowed_exchanges: default_allowed_exchanges(),
            fine_filter_enabled: default_fine_filter_enabled(),
            rebalance_cadence_days: default_rebalance_cadence_days(),
        }
    }
}

impl Default for AlphaConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            insight_period_days: default_insight_period_days(),
            rebalance_cadence_days: default_rebalance_cadence_days(),
            suppress_repeat_insights: false,
        }
    }
}

impl Default for BacktestWindowConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            start_date: default_start_date(),
            end_date: default_end_date(),
        }
    }
}
