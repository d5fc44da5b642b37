//! Immediate execution of portfolio targets against the paper portfolio.

use crate::market::{Fill, Portfolio, Symbol};
use crate::strategy::allocator::PortfolioTarget;
use crate::utils::decimal::round_down_to_lot;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

/// Fills the whole difference between target and holding at the current price.
pub struct ImmediateExecutor {
    lot_size: Decimal,
}

impl Default for ImmediateExecutor {
    fn default() -> Self {
        Self::new(Decimal::ONE)
    }
}

impl ImmediateExecutor {
    pub fn new(lot_size: Decimal) -> Self {
        Self { lot_size }
    }

    /// Bring holdings to `targets`.
    ///
    /// Sells run before buys so freed cash funds the purchases. A buy that
    /// would overdraw cash is cut down to what cash covers.
    pub fn execute(
        &self,
        portfolio: &mut Portfolio,
        targets: &[PortfolioTarget],
        prices: &HashMap<Symbol, Decimal>,
        time: DateTime<Utc>,
    ) -> Vec<Fill> {
        let mut orders: Vec<(&str, Decimal, Decimal)> = Vec::with_capacity(targets.len());

        for target in targets {
            let delta = target.quantity - portfolio.quantity(&target.symbol);
            if delta.is_zero() {
                continue;
            }

            let price = match prices.get(&target.symbol) {
                Some(p) if *p > Decimal::ZERO => *p,
                _ => match portfolio.holdings().get(&target.symbol) {
                    // Flattening a position with no fresh quote: use its last mark
                    Some(h) if target.quantity.is_zero() => h.last_price,
                    _ => {
                        warn!(symbol = %target.symbol, "No price, cannot execute target");
                        continue;
                    }
                },
            };

            orders.push((target.symbol.as_str(), delta, price));
        }

        // Sells first
        orders.sort_by(|a, b| a.1.cmp(&b.1));

        let mut fills = Vec::with_capacity(orders.len());
        for (symbol, mut quantity, price) in orders {
            if quantity > Decimal::ZERO {
                let affordable = round_down_to_lot(portfolio.cash().max(Decimal::ZERO) / price, self.lot_size);
                if quantity > affordable {
                    warn!(
                        %symbol,
                        requested = %quantity,
                        %affordable,
                        "Insufficient cash, reducing buy"
                    );
                    quantity = affordable;
                }
                if quantity.is_zero() {
                    continue;
                }
            }

            fills.push(portfolio.fill(symbol, quantity, price, time));
        }

        if !fills.is_empty() {
            info!(
                orders = fills.len(),
                cash = %portfolio.cash(),
                equity = %portfolio.total_equity(),
                "Executed portfolio targets"
            );
        }

        fills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 7, 0, 0, 0).unwrap()
    }

    fn prices(entries: &[(&str, Decimal)]) -> HashMap<Symbol, Decimal> {
        entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn test_executes_delta_only() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.fill("A", dec!(10), dec!(100), t0());

        let fills = ImmediateExecutor::default().execute(
            &mut portfolio,
            &[PortfolioTarget::new("A", dec!(25))],
            &prices(&[("A", dec!(100))]),
            t0(),
        );

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].quantity, dec!(15));
        assert_eq!(portfolio.quantity("A"), dec!(25));
    }

    #[test]
    fn test_no_order_when_on_target() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.fill("A", dec!(10), dec!(100), t0());

        let fills = ImmediateExecutor::default().execute(
            &mut portfolio,
            &[PortfolioTarget::new("A", dec!(10))],
            &prices(&[("A", dec!(100))]),
            t0(),
        );

        assert!(fills.is_empty());
    }

    #[test]
    fn test_sells_before_buys() {
        let mut portfolio = Portfolio::new(dec!(1000));
        portfolio.fill("OLD", dec!(10), dec!(100), t0());
        assert_eq!(portfolio.cash(), Decimal::ZERO);

        let fills = ImmediateExecutor::default().execute(
            &mut portfolio,
            &[
                PortfolioTarget::new("NEW", dec!(10)),
                PortfolioTarget::new("OLD", Decimal::ZERO),
            ],
            &prices(&[("OLD", dec!(100)), ("NEW", dec!(100))]),
            t0(),
        );

        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].symbol, "OLD");
        assert_eq!(portfolio.quantity("NEW"), dec!(10));
        assert_eq!(portfolio.cash(), Decimal::ZERO);
    }

    #[test]
    fn test_buy_capped_by_cash() {
        let mut portfolio = Portfolio::new(dec!(500));

        ImmediateExecutor::default().execute(
            &mut portfolio,
            &[PortfolioTarget::new("A", dec!(10))],
            &prices(&[("A", dec!(120))]),
            t0(),
        );

        assert_eq!(portfolio.quantity("A"), dec!(4));
        assert!(portfolio.cash() >= Decimal::ZERO);
    }

    #[test]
    fn test_flatten_without_quote_uses_last_mark() {
        let mut portfolio = Portfolio::new(dec!(1000));
        portfolio.fill("A", dec!(5), dec!(100), t0());

        let fills = ImmediateExecutor::default().execute(
            &mut portfolio,
            &[PortfolioTarget::new("A", Decimal::ZERO)],
            &HashMap::new(),
            t0(),
        );

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, dec!(100));
        assert!(portfolio.holdings().is_empty());
    }

    #[test]
    fn test_buy_without_price_is_skipped() {
        let mut portfolio = Portfolio::new(dec!(1000));

        let fills = ImmediateExecutor::default().execute(
            &mut portfolio,
            &[PortfolioTarget::new("A", dec!(5))],
            &HashMap::new(),
            t0(),
        );

        assert!(fills.is_empty());
    }
}
