//! Historical data loading for backtesting.
//!
//! Provides CSV import of daily equity snapshots.

use crate::market::{CoarseRecord, FineRecord, Slice, Symbol};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// A snapshot of market data at a specific point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub symbols: Vec<SymbolData>,
}

impl MarketSnapshot {
    /// Create an empty snapshot at the given timestamp.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            symbols: Vec::new(),
        }
    }

    /// Coarse candidates in file order.
    pub fn coarse_records(&self) -> Vec<CoarseRecord> {
        self.symbols
            .iter()
            .map(|s| CoarseRecord {
                symbol: s.symbol.clone(),
                price: s.price,
                volume: s.volume,
            })
            .collect()
    }

    /// Fine records for `members`, in member order. Members absent from the
    /// snapshot are returned without metadata.
    pub fn fine_records_for(&self, members: &[Symbol]) -> Vec<FineRecord> {
        let index = self.index();
        members
            .iter()
            .map(|symbol| match index.get(symbol.as_str()) {
                Some(data) => FineRecord {
                    symbol: symbol.clone(),
                    country_id: data.country_id.clone(),
                    primary_exchange_id: data.primary_exchange_id.clone(),
                },
                None => FineRecord {
                    symbol: symbol.clone(),
                    country_id: None,
                    primary_exchange_id: None,
                },
            })
            .collect()
    }

    /// Positive prices by symbol.
    pub fn prices(&self) -> HashMap<Symbol, Decimal> {
        self.symbols
            .iter()
            .filter_map(|s| match s.price {
                Some(p) if p > Decimal::ZERO => Some((s.symbol.clone(), p)),
                _ => None,
            })
            .collect()
    }

    /// Bars for every symbol with a usable price.
    pub fn slice(&self) -> Slice {
        self.symbols
            .iter()
            .filter(|s| s.price.is_some_and(|p| p > Decimal::ZERO))
            .fold(Slice::new(self.timestamp), |slice, s| {
                slice.with_bar(
                    &s.symbol,
                    s.price.unwrap_or(Decimal::ZERO),
                    s.volume.unwrap_or(Decimal::ZERO),
                )
            })
    }

    /// Symbol data keyed by symbol. The first row wins on duplicates.
    pub fn index(&self) -> HashMap<&str, &SymbolData> {
        let mut index = HashMap::with_capacity(self.symbols.len());
        for data in &self.symbols {
            index.entry(data.symbol.as_str()).or_insert(data);
        }
        index
    }

    /// Get symbol data by symbol name.
    pub fn get_symbol(&self, symbol: &str) -> Option<&SymbolData> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }
}

/// Daily data for a single equity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolData {
    pub symbol: Symbol,
    pub price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub country_id: Option<String>,
    pub primary_exchange_id: Option<String>,
}

/// Trait for loading historical market data.
pub trait DataLoader: Send + Sync {
    /// Load all snapshots in the given time range.
    fn load_snapshots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarketSnapshot>>;

    /// Get the available date range in the data.
    fn available_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)>;

    /// Get all available symbols.
    fn available_symbols(&self) -> Vec<String>;
}

/// CSV data loader for historical backtesting.
///
/// Expected CSV format (price, volume, country and exchange may be blank):
/// ```csv
/// timestamp,symbol,price,volume,country,exchange
/// 2021-01-07T00:00:00Z,AAPL,130.92,109578157,USA,NAS
/// ```
#[derive(Clone)]
pub struct CsvDataLoader {
    /// Loaded snapshots sorted by timestamp
    snapshots: Vec<MarketSnapshot>,
    /// All available symbols
    symbols: Vec<String>,
}

impl CsvDataLoader {
    /// Load data from a CSV file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;

        Self::from_csv_content(&content)
    }

    /// Load data from CSV content string.
    pub fn from_csv_content(content: &str) -> Result<Self> {
        let mut rows: Vec<CsvRow> = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            // Skip header
            if line_num == 0 && line.starts_with("timestamp") {
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let row = CsvRow::parse(line)
                .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
            rows.push(row);
        }

        if rows.is_empty() {
            anyhow::bail!("CSV file contains no data rows");
        }

        // Group by timestamp; BTreeMap keeps snapshots in time order
        let mut by_timestamp: BTreeMap<DateTime<Utc>, Vec<SymbolData>> = BTreeMap::new();

        for row in rows {
            by_timestamp.entry(row.timestamp).or_default().push(row.data);
        }

        let snapshots: Vec<MarketSnapshot> = by_timestamp
            .into_iter()
            .map(|(timestamp, symbols)| MarketSnapshot { timestamp, symbols })
            .collect();

        Ok(Self::from_snapshots(snapshots))
    }

    /// Create a loader from in-memory snapshots.
    pub fn from_snapshots(mut snapshots: Vec<MarketSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.timestamp);

        let symbols: BTreeSet<String> = snapshots
            .iter()
            .flat_map(|s| s.symbols.iter().map(|d| d.symbol.clone()))
            .collect();

        Self {
            snapshots,
            symbols: symbols.into_iter().collect(),
        }
    }

    /// Get total number of snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Check if the loader has no data.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot at `at`, or the latest one not after it. `None` picks the first.
    pub fn snapshot_at(&self, at: Option<DateTime<Utc>>) -> Option<&MarketSnapshot> {
        match at {
            None => self.snapshots.first(),
            Some(at) => self.snapshots.iter().rev().find(|s| s.timestamp <= at),
        }
    }
}

impl DataLoader for CsvDataLoader {
    fn load_snapshots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarketSnapshot>> {
        let filtered: Vec<MarketSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .cloned()
            .collect();

        Ok(filtered)
    }

    fn available_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.snapshots.first()?.timestamp;
        let end = self.snapshots.last()?.timestamp;
        Some((start, end))
    }

    fn available_symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }
}

/// Internal struct for parsing CSV rows.
#[derive(Debug)]
struct CsvRow {
    timestamp: DateTime<Utc>,
    data: SymbolData,
}

impl CsvRow {
    fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 2 {
            anyhow::bail!(
                "Expected at least 2 columns (timestamp,symbol[,price,volume,country,exchange]), got {}",
                parts.len()
            );
        }

        let column = |i: usize| parts.get(i).map(|s| s.trim()).unwrap_or("");

        Ok(Self {
            timestamp: column(0)
                .parse()
                .with_context(|| format!("Invalid timestamp: {}", column(0)))?,
            data: SymbolData {
                symbol: column(1).to_string(),
                price: parse_optional_decimal(column(2))
                    .with_context(|| format!("Invalid price: {}", column(2)))?,
                volume: parse_optional_decimal(column(3))
                    .with_context(|| format!("Invalid volume: {}", column(3)))?,
                country_id: optional_text(column(4)),
                primary_exchange_id: optional_text(column(5)),
            },
        })
    }
}

fn parse_optional_decimal(field: &str) -> Result<Option<Decimal>> {
    if field.is_empty() {
        return Ok(None);
    }
    Ok(Some(field.parse()?))
}

fn optional_text(field: &str) -> Option<String> {
    (!field.is_empty()).then(|| field.to_string())
}
