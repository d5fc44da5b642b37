//! Paper portfolio for backtesting.
//!
//! Long/short share holdings against a cash balance. Fills are immediate at
//! the price supplied by the caller; there are no fees or slippage.

use crate::market::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A position in a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: Symbol,
    /// Signed share count (negative = short)
    pub quantity: Decimal,
    /// Volume-weighted entry price of the open quantity
    pub average_price: Decimal,
    /// Most recent mark price
    pub last_price: Decimal,
}

impl Holding {
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.last_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.quantity * (self.last_price - self.average_price)
    }
}

/// An executed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: u64,
    pub symbol: Symbol,
    /// Signed share count (negative = sell)
    pub quantity: Decimal,
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

/// Cash plus holdings.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_cash: Decimal,
    cash: Decimal,
    holdings: HashMap<Symbol, Holding>,
    realized_pnl: Decimal,
    order_count: u64,
}

impl Portfolio {
    /// Create a portfolio holding only cash.
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            holdings: HashMap::new(),
            realized_pnl: Decimal::ZERO,
            order_count: 0,
        }
    }

    pub fn initial_cash(&self) -> Decimal {
        self.initial_cash
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn order_count(&self) -> u64 {
        self.order_count
    }

    pub fn holdings(&self) -> &HashMap<Symbol, Holding> {
        &self.holdings
    }

    /// Held quantity for a symbol (zero if flat).
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.holdings
            .get(symbol)
            .map(|h| h.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Symbols with a non-zero position.
    pub fn invested_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.holdings.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn holdings_value(&self) -> Decimal {
        self.holdings.values().map(Holding::market_value).sum()
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.holdings.values().map(Holding::unrealized_pnl).sum()
    }

    /// Cash plus marked holdings.
    pub fn total_equity(&self) -> Decimal {
        self.cash + self.holdings_value()
    }

    /// Update mark prices. Symbols without a price keep their last mark.
    pub fn mark_to_market(&mut self, prices: &HashMap<Symbol, Decimal>) {
        for (symbol, holding) in self.holdings.iter_mut() {
            if let Some(&price) = prices.get(symbol) {
                if price > Decimal::ZERO {
                    holding.last_price = price;
                }
            }
        }
    }

    /// Execute a signed quantity at `price`.
    pub fn fill(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time: DateTime<Utc>,
    ) -> Fill {
        self.order_count += 1;
        self.cash -= quantity * price;

        let holding = self
            .holdings
            .entry(symbol.to_string())
            .or_insert_with(|| Holding {
                symbol: symbol.to_string(),
                quantity: Decimal::ZERO,
                average_price: price,
                last_price: price,
            });

        let old_qty = holding.quantity;
        let new_qty = old_qty + quantity;
        let same_direction = old_qty.is_zero() || (old_qty.is_sign_positive() == quantity.is_sign_positive());

        if same_direction {
            // Adding to the position: blend entry price
            if !new_qty.is_zero() {
                holding.average_price =
                    (old_qty * holding.average_price + quantity * price) / new_qty;
            }
        } else {
            // Reducing (or flipping): realize PnL on the closed part
            let closed = quantity.abs().min(old_qty.abs());
            let direction = if old_qty.is_sign_positive() {
                Decimal::ONE
            } else {
                -Decimal::ONE
            };
            self.realized_pnl += closed * (price - holding.average_price) * direction;

            if quantity.abs() > old_qty.abs() {
                holding.average_price = price;
            }
        }

        holding.quantity = new_qty;
        holding.last_price = price;

        if new_qty.is_zero() {
            self.holdings.remove(symbol);
        }

        debug!(
            order_id = self.order_count,
            %symbol,
            %quantity,
            %price,
            cash = %self.cash,
            "Paper order filled"
        );

        Fill {
            order_id: self.order_count,
            symbol: symbol.to_string(),
            quantity,
            price,
            time,
        }
    }

    /// Close every position. Symbols absent from `prices` close at their last mark.
    pub fn liquidate(
        &mut self,
        prices: &HashMap<Symbol, Decimal>,
        time: DateTime<Utc>,
    ) -> Vec<Fill> {
        let positions: Vec<(Symbol, Decimal, Decimal)> = self
            .holdings
            .values()
            .map(|h| {
                let price = prices
                    .get(&h.symbol)
                    .copied()
                    .filter(|p| *p > Decimal::ZERO)
                    .unwrap_or(h.last_price);
                (h.symbol.clone(), h.quantity, price)
            })
            .collect();

        if positions.is_empty() {
            return Vec::new();
        }

        let fills: Vec<Fill> = positions
            .into_iter()
            .map(|(symbol, qty, price)| self.fill(&symbol, -qty, price, time))
            .collect();

        info!(
            closed = fills.len(),
            cash = %self.cash,
            "Liquidated all holdings"
        );

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

    #[test]
    fn test_new_portfolio_is_all_cash() {
        let portfolio = Portfolio::new(dec!(10000));

        assert_eq!(portfolio.cash(), dec!(10000));
        assert_eq!(portfolio.total_equity(), dec!(10000));
        assert!(portfolio.holdings().is_empty());
    }

    #[test]
    fn test_buy_moves_cash_into_holding() {
        let mut portfolio = Portfolio::new(dec!(10000));
        let fill = portfolio.fill("AAPL", dec!(10), dec!(150), t0());

        assert_eq!(fill.order_id, 1);
        assert_eq!(portfolio.cash(), dec!(8500));
        assert_eq!(portfolio.quantity("AAPL"), dec!(10));
        assert_eq!(portfolio.total_equity(), dec!(10000));
    }

    #[test]
    fn test_average_price_blends_on_add() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.fill("AAPL", dec!(10), dec!(100), t0());
        portfolio.fill("AAPL", dec!(10), dec!(200), t0());

        assert_eq!(portfolio.holdings()["AAPL"].average_price, dec!(150));
    }

    #[test]
    fn test_partial_sell_realizes_pnl() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.fill("AAPL", dec!(10), dec!(100), t0());
        portfolio.fill("AAPL", dec!(-4), dec!(110), t0());

        assert_eq!(portfolio.realized_pnl(), dec!(40));
        assert_eq!(portfolio.quantity("AAPL"), dec!(6));
        assert_eq!(portfolio.holdings()["AAPL"].average_price, dec!(100));
    }

    #[test]
    fn test_closing_removes_holding() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.fill("AAPL", dec!(10), dec!(100), t0());
        portfolio.fill("AAPL", dec!(-10), dec!(90), t0());

        assert!(portfolio.holdings().is_empty());
        assert_eq!(portfolio.cash(), dec!(9900));
        assert_eq!(portfolio.realized_pnl(), dec!(-100));
    }

    #[test]
    fn test_mark_to_market_updates_equity() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.fill("AAPL", dec!(10), dec!(100), t0());

        let prices = HashMap::from([("AAPL".to_string(), dec!(120))]);
        portfolio.mark_to_market(&prices);

        assert_eq!(portfolio.holdings_value(), dec!(1200));
        assert_eq!(portfolio.unrealized_pnl(), dec!(200));
        assert_eq!(portfolio.total_equity(), dec!(10200));
    }

    #[test]
    fn test_liquidate_closes_everything() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.fill("AAPL", dec!(10), dec!(100), t0());
        portfolio.fill("MSFT", dec!(5), dec!(200), t0());

        // MSFT missing from prices: closes at last mark
        let prices = HashMap::from([("AAPL".to_string(), dec!(110))]);
        let fills = portfolio.liquidate(&prices, t0());

        assert_eq!(fills.len(), 2);
        assert!(portfolio.holdings().is_empty());
        assert_eq!(portfolio.cash(), dec!(10100));
    }

    #[test]
    fn test_liquidate_flat_portfolio_is_noop() {
        let mut portfolio = Portfolio::new(dec!(10000));
        let fills = portfolio.liquidate(&HashMap::new(), t0());

        assert!(fills.is_empty());
        assert_eq!(portfolio.order_count(), 0);
    }
}
