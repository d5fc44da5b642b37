//! Insights: directional predictions consumed by portfolio construction.

use crate::market::Symbol;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

/// What the insight predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightType {
    Price,
}

/// Predicted direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightDirection {
    Up,
    Flat,
    Down,
}

impl InsightDirection {
    /// Signed unit weight (+1 / 0 / -1).
    pub fn sign(&self) -> i8 {
        match self {
            InsightDirection::Up => 1,
            InsightDirection::Flat => 0,
            InsightDirection::Down => -1,
        }
    }
}

/// A directional prediction for one symbol over a fixed horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    pub symbol: Symbol,
    pub insight_type: InsightType,
    pub direction: InsightDirection,
    pub period: Duration,
    pub generated_at: DateTime<Utc>,
    /// Predicted move as a +- fraction
    pub magnitude: Option<f64>,
    /// Confidence in [0, 1]
    pub confidence: Option<f64>,
}

impl Insight {
    /// A price insight with no magnitude or confidence payload.
    pub fn price(
        symbol: &str,
        period: Duration,
        direction: InsightDirection,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            insight_type: InsightType::Price,
            direction,
            period,
            generated_at,
            magnitude: None,
            confidence: None,
        }
    }

    pub fn close_time(&self) -> DateTime<Utc> {
        self.generated_at + self.period
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.close_time()
    }
}

/// Latest insight per symbol, with expiry.
#[derive(Debug, Default)]
pub struct ActiveInsights {
    by_symbol: HashMap<Symbol, Insight>,
}

impl ActiveInsights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store new insights; a newer insight replaces the previous one for its symbol.
    pub fn extend(&mut self, insights: impl IntoIterator<Item = Insight>) {
        for insight in insights {
            self.by_symbol.insert(insight.symbol.clone(), insight);
        }
    }

    /// Drop insights whose period has elapsed and return them.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Insight> {
        let expired_symbols: Vec<Symbol> = self
            .by_symbol
            .values()
            .filter(|i| !i.is_active(now))
            .map(|i| i.symbol.clone())
            .collect();

        let expired: Vec<Insight> = expired_symbols
            .iter()
            .filter_map(|s| self.by_symbol.remove(s))
            .collect();

        if !expired.is_empty() {
            debug!(expired = expired.len(), remaining = self.by_symbol.len(), "Insights expired");
        }

        expired
    }

    pub fn remove(&mut self, symbol: &str) -> Option<Insight> {
        self.by_symbol.remove(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Insight> {
        self.by_symbol.get(symbol)
    }

    /// Active insights sorted by symbol.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<&Insight> {
        let mut active: Vec<&Insight> = self
            .by_symbol
            .values()
            .filter(|i| i.is_active(now))
            .collect();
        active.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        active
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
