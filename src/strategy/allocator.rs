//! Equal-weighting portfolio construction.

use crate::market::Symbol;
use crate::strategy::insight::{Insight, InsightDirection};
use crate::utils::decimal::{round_down_to_lot, safe_div};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Desired share count for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioTarget {
    pub symbol: Symbol,
    /// Signed share count (zero = flatten)
    pub quantity: Decimal,
}

impl PortfolioTarget {
    pub fn new(symbol: &str, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
        }
    }
}

/// Gives every non-flat active insight the same share of equity.
pub struct EqualWeightingAllocator {
    /// Share rounding (1 = whole shares)
    lot_size: Decimal,
}

impl Default for EqualWeightingAllocator {
    fn default() -> Self {
        Self::new(Decimal::ONE)
    }
}

impl EqualWeightingAllocator {
    pub fn new(lot_size: Decimal) -> Self {
        Self { lot_size }
    }

    /// Compute targets from the active insights.
    ///
    /// # Arguments
    /// * `insights` - Active insights (one per symbol)
    /// * `total_equity` - Portfolio value to distribute
    /// * `prices` - Current prices; symbols without a positive price get no target
    /// * `held` - Symbols currently held; any not covered by an insight are flattened
    pub fn calculate_targets(
        &self,
        insights: &[&Insight],
        total_equity: Decimal,
        prices: &HashMap<Symbol, Decimal>,
        held: &[Symbol],
    ) -> Vec<PortfolioTarget> {
        let weighted: Vec<&Insight> = insights
            .iter()
            .copied()
            .filter(|i| i.direction != InsightDirection::Flat)
            .collect();

        let weight = if weighted.is_empty() {
            Decimal::ZERO
        } else {
            safe_div(Decimal::ONE, Decimal::from(weighted.len()))
        };

        debug!(
            %total_equity,
            %weight,
            insights = weighted.len(),
            "Calculating equal-weight targets"
        );

        let mut targets = Vec::with_capacity(weighted.len() + held.len());

        for insight in insights {
            let price = match prices.get(&insight.symbol) {
                Some(p) if *p > Decimal::ZERO => *p,
                _ => {
                    warn!(symbol = %insight.symbol, "No price for target, skipping");
                    continue;
                }
            };

            let quantity = if insight.direction == InsightDirection::Flat {
                Decimal::ZERO
            } else {
                let notional = total_equity * weight * Decimal::from(insight.direction.sign());
                // Truncate toward zero so shorts never exceed their share either
                let shares = round_down_to_lot(notional.abs() / price, self.lot_size);
                if notional.is_sign_negative() {
                    -shares
                } else {
                    shares
                }
            };

            targets.push(PortfolioTarget::new(&insight.symbol, quantity));
        }

        for symbol in held {
            if !insights.iter().any(|i| &i.symbol == symbol) {
                targets.push(PortfolioTarget::new(symbol, Decimal::ZERO));
            }
        }

        targets
    }
}
