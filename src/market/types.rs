//! Market data types delivered to the strategy by the host.

use crate::error::{RecordDefect, SelectionError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ticker symbol (e.g., "AAPL").
pub type Symbol = String;

/// Coarse candidate: the liquidity fields used by the first universe pass.
///
/// Price and volume may be missing in raw data; both read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoarseRecord {
    pub symbol: Symbol,
    pub price: Option<Decimal>,
    pub volume: Option<Decimal>,
}

impl CoarseRecord {
    /// Create a record with both fields present.
    pub fn new(symbol: &str, price: Decimal, volume: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            price: Some(price),
            volume: Some(volume),
        }
    }

    /// Price, or zero when missing.
    pub fn price_or_zero(&self) -> Decimal {
        self.price.unwrap_or(Decimal::ZERO)
    }

    /// Volume, or zero when missing.
    pub fn volume_or_zero(&self) -> Decimal {
        self.volume.unwrap_or(Decimal::ZERO)
    }

    /// Check the fields the coarse pass cannot do without.
    pub fn validate(&self) -> Result<(), SelectionError> {
        if self.symbol.trim().is_empty() {
            return Err(SelectionError::invalid(&self.symbol, RecordDefect::EmptySymbol));
        }
        if self.price.is_none() {
            return Err(SelectionError::invalid(&self.symbol, RecordDefect::MissingPrice));
        }
        Ok(())
    }
}

/// Fine candidate: company reference metadata used by the second pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineRecord {
    pub symbol: Symbol,
    pub country_id: Option<String>,
    pub primary_exchange_id: Option<String>,
}

impl FineRecord {
    pub fn new(symbol: &str, country_id: &str, primary_exchange_id: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            country_id: Some(country_id.to_string()),
            primary_exchange_id: Some(primary_exchange_id.to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), SelectionError> {
        if self.symbol.trim().is_empty() {
            return Err(SelectionError::invalid(&self.symbol, RecordDefect::EmptySymbol));
        }
        if self.country_id.is_none() {
            return Err(SelectionError::invalid(&self.symbol, RecordDefect::MissingCountry));
        }
        if self.primary_exchange_id.is_none() {
            return Err(SelectionError::invalid(&self.symbol, RecordDefect::MissingExchange));
        }
        Ok(())
    }
}

/// A security subscribed to the data feed, with its latest quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub symbol: Symbol,
    pub price: Decimal,
    pub volume: Decimal,
}

impl Security {
    pub fn new(symbol: &str, price: Decimal, volume: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            volume,
        }
    }
}

/// Additions to and removals from the subscribed security set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityChanges {
    pub added: Vec<Security>,
    pub removed: Vec<Security>,
}

impl SecurityChanges {
    pub fn new(added: Vec<Security>, removed: Vec<Security>) -> Self {
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// One bar of market data for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub price: Decimal,
    pub volume: Decimal,
}

/// All bars delivered at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Slice {
    pub time: Option<DateTime<Utc>>,
    pub bars: HashMap<Symbol, Bar>,
}

impl Slice {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Some(time),
            bars: HashMap::new(),
        }
    }

    pub fn with_bar(mut self, symbol: &str, price: Decimal, volume: Decimal) -> Self {
        self.bars.insert(symbol.to_string(), Bar { price, volume });
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&Bar> {
        self.bars.get(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_fields_read_as_zero() {
        let record = CoarseRecord {
            symbol: "XYZ".to_string(),
            price: None,
            volume: None,
        };

        assert_eq!(record.price_or_zero(), Decimal::ZERO);
        assert_eq!(record.volume_or_zero(), Decimal::ZERO);
    }

    #[test]
    fn test_coarse_validate() {
        assert!(CoarseRecord::new("AAPL", dec!(150), dec!(1000)).validate().is_ok());

        let no_price = CoarseRecord {
            symbol: "AAPL".to_string(),
            price: None,
            volume: Some(dec!(1000)),
        };
        assert_eq!(
            no_price.validate(),
            Err(SelectionError::invalid("AAPL", RecordDefect::MissingPrice))
        );

        let blank = CoarseRecord::new("  ", dec!(1), dec!(1));
        assert!(matches!(
            blank.validate(),
            Err(SelectionError::InvalidRecord {
                defect: RecordDefect::EmptySymbol,
                ..
            })
        ));
    }

    #[test]
    fn test_fine_validate() {
        assert!(FineRecord::new("MSFT", "USA", "NAS").validate().is_ok());

        let no_exchange = FineRecord {
            symbol: "MSFT".to_string(),
            country_id: Some("USA".to_string()),
            primary_exchange_id: None,
        };
        assert_eq!(
            no_exchange.validate(),
            Err(SelectionError::invalid("MSFT", RecordDefect::MissingExchange))
        );
    }

    #[test]
    fn test_security_changes_is_empty() {
        assert!(SecurityChanges::default().is_empty());

        let changes = SecurityChanges::new(vec![Security::new("A", dec!(1), dec!(1))], vec![]);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_slice_builder() {
        let slice = Slice::default().with_bar("SPY", dec!(400), dec!(1_000_000));

        assert!(!slice.is_empty());
        assert_eq!(slice.get("SPY").unwrap().volume, dec!(1_000_000));
        assert!(slice.get("QQQ").is_none());
    }
}
