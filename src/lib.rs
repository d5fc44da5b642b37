//! # Most Active Stocks
//!
//! Daily universe selection of the most actively traded US equities, with a
//! constant "up" alpha over the highest-volume members.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `error`: Record and selection error types
//! - `market`: Market data records and the paper portfolio
//! - `strategy`: Universe selection, alpha, portfolio construction, execution
//! - `backtest`: Historical daily backtesting and metrics
//! - `utils`: Shared utilities and decimal arithmetic

pub mod backtest;
pub mod config;
pub mod error;
pub mod market;
pub mod strategy;
pub mod utils;

pub use config::Config;
