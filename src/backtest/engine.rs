//! Backtesting simulation engine.
//!
//! Replays daily market snapshots through universe selection, the alpha
//! model, equal-weight portfolio construction and immediate execution.

use crate::backtest::metrics::{ActivityCounts, BacktestMetrics, EquityPoint};
use crate::backtest::{BacktestConfig, DataLoader, MarketSnapshot};
use crate::config::Config;
use crate::market::{Portfolio, Security, SecurityChanges, Slice, Symbol};
use crate::strategy::{
    ActiveInsights, AlphaModel, CoarseUniverseSelector, ConstantAlphaModel,
    EqualWeightingAllocator, FineFundamentalFilter, ImmediateExecutor, Insight,
    NullRiskManagement, RiskManagementModel, UniverseSelection,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Result of a single simulation step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub holdings_value: Decimal,
    pub total_equity: Decimal,
    pub position_count: usize,
    pub fills: usize,
    pub insights_emitted: usize,
    pub universe_rebalanced: bool,
}

/// Complete result of a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: Config,
    pub backtest_config: BacktestConfig,
    pub metrics: BacktestMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub snapshots_processed: usize,
    pub final_cash: Decimal,
    pub final_equity: Decimal,
    /// Universe members at the end of the run, sorted by symbol
    pub final_universe: Vec<Symbol>,
}

impl BacktestResult {
    /// Export equity curve to CSV.
    pub fn equity_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use std::io::Write;
        let path = path.as_ref();
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writeln!(file, "timestamp,cash,holdings_value,total_equity,drawdown,positions")?;

        for point in &self.equity_curve {
            writeln!(
                file,
                "{},{},{},{},{},{}",
                point.timestamp.to_rfc3339(),
                point.cash,
                point.holdings_value,
                point.total_equity,
                point.drawdown,
                point.position_count,
            )?;
        }

        Ok(())
    }

    /// Serialize the full result as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize backtest result")
    }

    /// Write the JSON result to `path`.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        format!(
            "{}\n\nBacktest Period: {} to {}\nSnapshots: {}\nFinal Equity: ${:.2}\nUniverse Size: {}",
            self.metrics.summary(),
            self.start_time.format("%Y-%m-%d"),
            self.end_time.format("%Y-%m-%d"),
            self.snapshots_processed,
            self.final_equity,
            self.final_universe.len(),
        )
    }
}

/// The backtesting simulation engine.
pub struct BacktestEngine<D: DataLoader, A: AlphaModel = ConstantAlphaModel> {
    data_loader: D,
    config: Config,
    backtest_config: BacktestConfig,

    // Strategy pipeline
    selector: CoarseUniverseSelector,
    fine_filter: FineFundamentalFilter,
    alpha: A,
    insights: ActiveInsights,
    allocator: EqualWeightingAllocator,
    risk: NullRiskManagement,
    executor: ImmediateExecutor,
    portfolio: Portfolio,
    universe: HashSet<Symbol>,

    // Tracking for metrics
    equity_curve: Vec<EquityPoint>,
    peak_equity: Decimal,
    activity: ActivityCounts,
}

impl<D: DataLoader> BacktestEngine<D> {
    /// Create a new backtest engine running the constant alpha model.
    pub fn new(data_loader: D, config: Config, backtest_config: BacktestConfig) -> Self {
        let alpha = ConstantAlphaModel::new(&config.alpha);
        Self::with_alpha(data_loader, config, backtest_config, alpha)
    }
}

impl<D: DataLoader, A: AlphaModel> BacktestEngine<D, A> {
    /// Create a backtest engine around any alpha model.
    pub fn with_alpha(
        data_loader: D,
        config: Config,
        backtest_config: BacktestConfig,
        alpha: A,
    ) -> Self {
        let initial_cash = backtest_config.initial_cash;

        Self {
            data_loader,
            selector: CoarseUniverseSelector::new(&config.universe),
            fine_filter: FineFundamentalFilter::new(&config.universe),
            alpha,
            insights: ActiveInsights::new(),
            allocator: EqualWeightingAllocator::default(),
            risk: NullRiskManagement,
            executor: ImmediateExecutor::default(),
            portfolio: Portfolio::new(initial_cash),
            universe: HashSet::new(),
            equity_curve: Vec::new(),
            peak_equity: initial_cash,
            activity: ActivityCounts::default(),
            config,
            backtest_config,
        }
    }

    /// Run the backtest from start to end time.
    pub fn run(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<BacktestResult> {
        info!(
            "Starting backtest from {} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        // Load historical data
        let snapshots = self.data_loader.load_snapshots(start, end)?;
        if snapshots.is_empty() {
            anyhow::bail!("No data available for the specified time range");
        }

        info!("Loaded {} snapshots", snapshots.len());

        self.equity_curve.clear();
        self.peak_equity = self.backtest_config.initial_cash;
        self.activity = ActivityCounts::default();

        for (i, snapshot) in snapshots.iter().enumerate() {
            let step_result = self.step(snapshot);

            if self.backtest_config.record_equity_curve {
                self.equity_curve.push(EquityPoint::new(
                    step_result.timestamp,
                    step_result.cash,
                    step_result.holdings_value,
                    step_result.position_count,
                    self.peak_equity.max(step_result.total_equity),
                ));
            }

            if step_result.total_equity > self.peak_equity {
                self.peak_equity = step_result.total_equity;
            }

            // Progress logging
            if i % 100 == 0 {
                debug!(
                    "Progress: {}/{} ({:.1}%), Equity: ${:.2}",
                    i,
                    snapshots.len(),
                    (i as f64 / snapshots.len() as f64) * 100.0,
                    step_result.total_equity
                );
            }
        }

        let metrics = BacktestMetrics::calculate(
            &self.equity_curve,
            self.backtest_config.initial_cash,
            self.portfolio.realized_pnl(),
            self.activity,
        );

        info!(
            final_equity = %self.portfolio.total_equity(),
            trades = self.activity.total_trades,
            insights = self.activity.insights_emitted,
            rebalances = self.activity.universe_rebalances,
            "Backtest complete"
        );

        let mut final_universe: Vec<Symbol> = self.universe.iter().cloned().collect();
        final_universe.sort();

        Ok(BacktestResult {
            config: self.config.clone(),
            backtest_config: self.backtest_config.clone(),
            metrics,
            equity_curve: self.equity_curve.clone(),
            start_time: start,
            end_time: end,
            snapshots_processed: snapshots.len(),
            final_cash: self.portfolio.cash(),
            final_equity: self.portfolio.total_equity(),
            final_universe,
        })
    }

    /// Process a single snapshot.
    pub fn step(&mut self, snapshot: &MarketSnapshot) -> StepResult {
        let now = snapshot.timestamp;
        let prices = snapshot.prices();
        let slice = snapshot.slice();
        let mut fills = 0usize;

        // 1. Universe selection; a rebalance closes every position first
        let selection = self.selector.select(now, &snapshot.coarse_records());
        let universe_rebalanced = !selection.is_unchanged();
        if let UniverseSelection::Rebalanced(members) = selection {
            fills += self.portfolio.liquidate(&prices, now).len();
            self.activity.universe_rebalances += 1;

            let members = if self.config.universe.fine_filter_enabled {
                self.fine_filter.filter(&snapshot.fine_records_for(&members))
            } else {
                members
            };

            let changes = self.apply_universe(members, &slice);
            for removed in &changes.removed {
                self.insights.remove(&removed.symbol);
            }
            if !changes.is_empty() {
                self.alpha.on_securities_changed(&changes);
            }
        }

        // 2. Alpha
        let new_insights = self.alpha.update(now, &slice);
        let insights_emitted = new_insights.len();
        self.activity.insights_emitted += insights_emitted as u64;
        self.insights.extend(new_insights);

        // 3. Expiry
        let expired = self.insights.expire(now);

        // 4-6. Portfolio construction, risk, execution
        if insights_emitted > 0 || !expired.is_empty() || universe_rebalanced {
            let active: Vec<&Insight> = self
                .insights
                .active(now)
                .into_iter()
                .filter(|i| self.universe.contains(&i.symbol))
                .collect();

            let targets = self.allocator.calculate_targets(
                &active,
                self.portfolio.total_equity(),
                &prices,
                &self.portfolio.invested_symbols(),
            );
            let targets = self.risk.manage_risk(targets, &self.portfolio);

            fills += self
                .executor
                .execute(&mut self.portfolio, &targets, &prices, now)
                .len();
        }
        self.activity.total_trades += fills as u64;

        // 7. Mark to market
        self.portfolio.mark_to_market(&prices);

        StepResult {
            timestamp: now,
            cash: self.portfolio.cash(),
            holdings_value: self.portfolio.holdings_value(),
            total_equity: self.portfolio.total_equity(),
            position_count: self.portfolio.holdings().len(),
            fills,
            insights_emitted,
            universe_rebalanced,
        }
    }

    /// Replace the universe and describe the difference.
    ///
    /// Added securities keep `members` order (most liquid first); removed
    /// ones are sorted by symbol.
    fn apply_universe(&mut self, members: Vec<Symbol>, slice: &Slice) -> SecurityChanges {
        let security = |symbol: &Symbol| match slice.get(symbol) {
            Some(bar) => Security::new(symbol, bar.price, bar.volume),
            None => Security::new(symbol, Decimal::ZERO, Decimal::ZERO),
        };

        let next: HashSet<Symbol> = members.iter().cloned().collect();

        let added: Vec<Security> = members
            .iter()
            .filter(|s| !self.universe.contains(*s))
            .map(security)
            .collect();

        let mut removed_symbols: Vec<&Symbol> =
            self.universe.iter().filter(|s| !next.contains(*s)).collect();
        removed_symbols.sort();
        let removed: Vec<Security> = removed_symbols.into_iter().map(security).collect();

        info!(
            members = next.len(),
            added = added.len(),
            removed = removed.len(),
            "Universe updated"
        );

        self.universe = next;
        SecurityChanges::new(added, removed)
    }

    /// Current universe members.
    pub fn universe(&self) -> &HashSet<Symbol> {
        &self.universe
    }

    /// Get the paper portfolio.
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Get the stored insights.
    pub fn insights(&self) -> &ActiveInsights {
        &self.insights
    }

    /// Get the current equity curve.
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }
}
