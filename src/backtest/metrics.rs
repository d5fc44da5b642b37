//! Performance metrics calculation for backtesting.
//!
//! Provides Sharpe ratio, Sortino ratio, drawdown analysis, and more.

use crate::utils::decimal::{from_f64, safe_div, to_f64};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A point on the equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub holdings_value: Decimal,
    pub total_equity: Decimal,
    pub drawdown: Decimal,
    pub position_count: usize,
}

impl EquityPoint {
    /// Create a new equity point.
    pub fn new(
        timestamp: DateTime<Utc>,
        cash: Decimal,
        holdings_value: Decimal,
        position_count: usize,
        peak_equity: Decimal,
    ) -> Self {
        let total_equity = cash + holdings_value;
        let drawdown = if peak_equity > Decimal::ZERO {
            ((peak_equity - total_equity) / peak_equity).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };

        Self {
            timestamp,
            cash,
            holdings_value,
            total_equity,
            drawdown,
            position_count,
        }
    }
}

/// Strategy activity counted by the engine over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub total_trades: u64,
    pub insights_emitted: u64,
    pub universe_rebalances: u64,
}

/// Comprehensive backtest performance metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // Returns
    /// Total absolute return (final - initial)
    pub total_return: Decimal,
    /// Total return as percentage
    pub total_return_pct: Decimal,
    /// Annualized return percentage
    pub annualized_return: Decimal,
    /// Realized profit from closed lots
    pub realized_pnl: Decimal,

    // Risk
    /// Maximum drawdown fraction
    pub max_drawdown: Decimal,
    /// Duration of maximum drawdown in days
    pub max_drawdown_duration_days: i64,
    /// Annualized volatility (std dev of returns)
    pub volatility: Decimal,

    // Risk-adjusted
    /// Sharpe ratio (assuming 0 risk-free rate)
    pub sharpe_ratio: Decimal,
    /// Sortino ratio (downside deviation only)
    pub sortino_ratio: Decimal,
    /// Calmar ratio (return / max drawdown)
    pub calmar_ratio: Decimal,

    // Activity
    /// Total number of fills
    pub total_trades: u64,
    /// Insights emitted by the alpha model
    pub insights_emitted: u64,
    /// Times the coarse universe was reselected
    pub universe_rebalances: u64,

    // Time
    /// Backtest duration in days
    pub duration_days: f64,
}

impl BacktestMetrics {
    /// Calculate metrics from equity curve and run activity.
    pub fn calculate(
        equity_curve: &[EquityPoint],
        initial_cash: Decimal,
        realized_pnl: Decimal,
        activity: ActivityCounts,
    ) -> Self {
        let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
            return Self::empty();
        };

        // Duration
        let duration = last.timestamp - first.timestamp;
        let duration_days = duration.num_seconds() as f64 / 86400.0;
        let duration_years = duration_days / 365.0;

        // Returns
        let total_return = last.total_equity - initial_cash;
        let total_return_pct = safe_div(total_return, initial_cash) * dec!(100);

        let annualized_return = if duration_years > 0.0 {
            let factor = 1.0 + to_f64(total_return_pct) / 100.0;
            from_f64((factor.max(0.0).powf(1.0 / duration_years) - 1.0) * 100.0)
        } else {
            Decimal::ZERO
        };

        // Drawdown
        let (max_drawdown, max_dd_duration) = calculate_max_drawdown(equity_curve);

        let returns = calculate_period_returns(equity_curve);
        let volatility = calculate_volatility(&returns, duration_years);

        // Risk-adjusted metrics
        let sharpe_ratio = calculate_sharpe(&returns, duration_years);
        let sortino_ratio = calculate_sortino(&returns, duration_years);
        let calmar_ratio = if max_drawdown > Decimal::ZERO {
            annualized_return / (max_drawdown * dec!(100))
        } else {
            Decimal::ZERO
        };

        Self {
            total_return,
            total_return_pct,
            annualized_return,
            realized_pnl,
            max_drawdown,
            max_drawdown_duration_days: max_dd_duration,
            volatility,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            total_trades: activity.total_trades,
            insights_emitted: activity.insights_emitted,
            universe_rebalances: activity.universe_rebalances,
            duration_days,
        }
    }

    /// Create empty metrics (for error cases).
    pub fn empty() -> Self {
        Self {
            total_return: Decimal::ZERO,
            total_return_pct: Decimal::ZERO,
            annualized_return: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            max_drawdown_duration_days: 0,
            volatility: Decimal::ZERO,
            sharpe_ratio: Decimal::ZERO,
            sortino_ratio: Decimal::ZERO,
            calmar_ratio: Decimal::ZERO,
            total_trades: 0,
            insights_emitted: 0,
            universe_rebalances: 0,
            duration_days: 0.0,
        }
    }

    /// Format metrics as a summary string.
    pub fn summary(&self) -> String {
        format!(
            r#"═══════════════════════════════════════════════
BACKTEST RESULTS ({:.1} days)
═══════════════════════════════════════════════
RETURNS
  Total Return:      ${:.2} ({:.2}%)
  Annualized:        {:.2}%
  Realized PnL:      ${:.2}

RISK
  Max Drawdown:      {:.2}% ({} days)
  Volatility:        {:.2}%

RISK-ADJUSTED
  Sharpe Ratio:      {:.3}
  Sortino Ratio:     {:.3}
  Calmar Ratio:      {:.3}

ACTIVITY
  Total Trades:      {}
  Insights Emitted:  {}
  Universe Changes:  {}
═══════════════════════════════════════════════"#,
            self.duration_days,
            self.total_return,
            self.total_return_pct,
            self.annualized_return,
            self.realized_pnl,
            self.max_drawdown * dec!(100),
            self.max_drawdown_duration_days,
            self.volatility * dec!(100),
            self.sharpe_ratio,
            self.sortino_ratio,
            self.calmar_ratio,
            self.total_trades,
            self.insights_emitted,
            self.universe_rebalances,
        )
    }
}

/// Calculate period returns from equity curve.
fn calculate_period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| to_f64(safe_div(w[1].total_equity - w[0].total_equity, w[0].total_equity)))
        .collect()
}

/// Calculate maximum drawdown and its duration in days.
fn calculate_max_drawdown(equity_curve: &[EquityPoint]) -> (Decimal, i64) {
    let Some(first) = equity_curve.first() else {
        return (Decimal::ZERO, 0);
    };

    let mut peak = first.total_equity;
    let mut peak_time = first.timestamp;
    let mut max_dd = Decimal::ZERO;
    let mut max_dd_duration: i64 = 0;

    for point in equity_curve {
        if point.total_equity >= peak {
            peak = point.total_equity;
            peak_time = point.timestamp;
            continue;
        }

        let dd = safe_div(peak - point.total_equity, peak);
        if dd > max_dd {
            max_dd = dd;
        }

        let underwater = (point.timestamp - peak_time).num_days();
        if underwater > max_dd_duration {
            max_dd_duration = underwater;
        }
    }

    (max_dd, max_dd_duration)
}

fn mean_and_std(returns: &[f64]) -> (f64, f64) {
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Calculate annualized volatility from returns.
fn calculate_volatility(returns: &[f64], duration_years: f64) -> Decimal {
    if returns.len() < 2 || duration_years <= 0.0 {
        return Decimal::ZERO;
    }

    let (_, std_dev) = mean_and_std(returns);

    // Annualize: multiply by sqrt(periods_per_year)
    let periods_per_year = returns.len() as f64 / duration_years;
    from_f64(std_dev * periods_per_year.sqrt())
}

/// Calculate Sharpe ratio (assuming 0 risk-free rate).
fn calculate_sharpe(returns: &[f64], duration_years: f64) -> Decimal {
    if returns.is_empty() || duration_years <= 0.0 {
        return Decimal::ZERO;
    }

    let (mean, std_dev) = mean_and_std(returns);
    if std_dev < 1e-10 {
        return Decimal::ZERO;
    }

    let periods_per_year = returns.len() as f64 / duration_years;
    let annualized_return = mean * periods_per_year;
    let annualized_std = std_dev * periods_per_year.sqrt();

    from_f64(annualized_return / annualized_std)
}

/// Calculate Sortino ratio (downside deviation only).
fn calculate_sortino(returns: &[f64], duration_years: f64) -> Decimal {
    if returns.is_empty() || duration_years <= 0.0 {
        return Decimal::ZERO;
    }

    let (mean, _) = mean_and_std(returns);

    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        // No negative returns: cap instead of reporting infinity, unless flat
        return if mean > 0.0 { dec!(100) } else { Decimal::ZERO };
    }

    let downside_variance = downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64;
    let downside_deviation = downside_variance.sqrt();
    if downside_deviation < 1e-10 {
        return dec!(100);
    }

    let periods_per_year = returns.len() as f64 / duration_years;
    let annualized_return = mean * periods_per_year;
    let annualized_dd = downside_deviation * periods_per_year.sqrt();

    from_f64(annualized_return / annualized_dd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 7, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn curve(equities: &[Decimal]) -> Vec<EquityPoint> {
        let mut peak = Decimal::ZERO;
        equities
            .iter()
            .enumerate()
            .map(|(i, e)| {
                peak = peak.max(*e);
                EquityPoint::new(day(i as i64), *e, Decimal::ZERO, 0, peak)
            })
            .collect()
    }

    #[test]
    fn test_equity_point_drawdown() {
        let point = EquityPoint::new(
            day(0),
            dec!(4500),  // cash
            dec!(5000),  // holdings
            2,           // positions
            dec!(10000), // peak
        );

        assert_eq!(point.total_equity, dec!(9500));
        assert_eq!(point.drawdown, dec!(0.05)); // 5% drawdown
    }

    #[test]
    fn test_max_drawdown_calculation() {
        let curve = curve(&[dec!(10000), dec!(10500), dec!(9500), dec!(9800), dec!(11000)]);

        let (max_dd, duration) = calculate_max_drawdown(&curve);
        // Max DD was from 10500 to 9500 = 9.52%
        assert!(max_dd > dec!(0.09) && max_dd < dec!(0.10));
        // Underwater from day 1 until the day 3 mark
        assert_eq!(duration, 2);
    }

    #[test]
    fn test_period_returns() {
        let returns = calculate_period_returns(&curve(&[dec!(10000), dec!(10100), dec!(10000)]));

        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.01).abs() < 1e-12);
        assert!(returns[1] < 0.0);
    }

    #[test]
    fn test_calculate_from_curve() {
        let curve = curve(&[dec!(10000), dec!(10200), dec!(10100), dec!(10500)]);
        let activity = ActivityCounts {
            total_trades: 12,
            insights_emitted: 20,
            universe_rebalances: 2,
        };

        let metrics = BacktestMetrics::calculate(&curve, dec!(10000), dec!(50), activity);

        assert_eq!(metrics.total_return, dec!(500));
        assert_eq!(metrics.total_return_pct, dec!(5));
        assert!((metrics.duration_days - 3.0).abs() < 1e-9);
        assert!(metrics.max_drawdown > Decimal::ZERO);
        assert!(metrics.sharpe_ratio > Decimal::ZERO);
        assert_eq!(metrics.total_trades, 12);
        assert_eq!(metrics.universe_rebalances, 2);
    }

    #[test]
    fn test_flat_curve_has_no_risk() {
        let metrics = BacktestMetrics::calculate(
            &curve(&[dec!(10000), dec!(10000), dec!(10000)]),
            dec!(10000),
            Decimal::ZERO,
            ActivityCounts::default(),
        );

        assert_eq!(metrics.total_return, Decimal::ZERO);
        assert_eq!(metrics.max_drawdown, Decimal::ZERO);
        assert_eq!(metrics.volatility, Decimal::ZERO);
        assert_eq!(metrics.sharpe_ratio, Decimal::ZERO);
    }

    #[test]
    fn test_flat_month_has_zero_sortino() {
        let equities = vec![dec!(10000); 30];
        let metrics = BacktestMetrics::calculate(
            &curve(&equities),
            dec!(10000),
            Decimal::ZERO,
            ActivityCounts::default(),
        );

        assert_eq!(metrics.sortino_ratio, Decimal::ZERO);
        assert_eq!(metrics.sharpe_ratio, Decimal::ZERO);
    }

    #[test]
    fn test_rising_curve_caps_sortino() {
        let metrics = BacktestMetrics::calculate(
            &curve(&[dec!(10000), dec!(10100), dec!(10200)]),
            dec!(10000),
            Decimal::ZERO,
            ActivityCounts::default(),
        );

        assert_eq!(metrics.sortino_ratio, dec!(100));
    }

    #[test]
    fn test_empty_curve() {
        let metrics =
            BacktestMetrics::calculate(&[], dec!(10000), Decimal::ZERO, ActivityCounts::default());
        assert_eq!(metrics.total_return, Decimal::ZERO);
        assert_eq!(metrics.duration_days, 0.0);
    }

    #[test]
    fn test_metrics_summary() {
        let mut metrics = BacktestMetrics::empty();
        metrics.total_return = dec!(500);
        metrics.total_return_pct = dec!(5);
        metrics.insights_emitted = 42;
        metrics.duration_days = 90.0;

        let summary = metrics.summary();
        assert!(summary.contains("500.00"));
        assert!(summary.contains("Sharpe"));
        assert!(summary.contains("Insights Emitted:  42"));
    }
}
