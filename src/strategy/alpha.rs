//! Alpha models: turn universe membership and market data into insights.

use crate::config::AlphaConfig;
use crate::market::{Security, SecurityChanges, Slice, Symbol};
use crate::strategy::insight::{Insight, InsightDirection};
use crate::strategy::rebalance::RebalanceGate;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// Capability interface the host drives on every data update and membership change.
#[cfg_attr(test, mockall::automock)]
pub trait AlphaModel {
    /// Produce insights for the current time. May return nothing.
    fn update(&mut self, now: DateTime<Utc>, slice: &Slice) -> Vec<Insight>;

    /// Securities were added to or removed from the data feed.
    fn on_securities_changed(&mut self, changes: &SecurityChanges);
}

/// A subscribed security plus its arrival sequence (ties in volume rank by arrival).
#[derive(Debug, Clone)]
struct TrackedSecurity {
    security: Security,
    arrival: u64,
}

/// Emits the same "price up" insight for the most liquid tracked securities.
///
/// Once per cadence window the tracked set is ranked by volume and the top
/// `top_n` each get one insight with horizon `period`.
#[derive(Debug)]
pub struct ConstantAlphaModel {
    top_n: usize,
    period: Duration,
    suppress_repeats: bool,
    gate: RebalanceGate,
    securities: HashMap<Symbol, TrackedSecurity>,
    next_arrival: u64,
    /// Last emission time per symbol; cleared when the symbol leaves, which
    /// re-arms emission when it returns
    insight_times: HashMap<Symbol, DateTime<Utc>>,
}

impl ConstantAlphaModel {
    pub fn new(config: &AlphaConfig) -> Self {
        Self {
            top_n: config.top_n,
            period: Duration::days(i64::from(config.insight_period_days)),
            suppress_repeats: config.suppress_repeat_insights,
            gate: RebalanceGate::days(config.rebalance_cadence_days),
            securities: HashMap::new(),
            next_arrival: 0,
            insight_times: HashMap::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn gate(&self) -> &RebalanceGate {
        &self.gate
    }

    pub fn is_tracking(&self, symbol: &str) -> bool {
        self.securities.contains_key(symbol)
    }

    pub fn tracked_count(&self) -> usize {
        self.securities.len()
    }

    pub fn last_insight_time(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.insight_times.get(symbol).copied()
    }

    /// Decide whether a new insight may be emitted for `symbol` at `time`.
    ///
    /// Records `time` when it returns true. A symbol whose last insight is
    /// younger than one period is refused and the record is left untouched.
    pub fn should_emit_insight(&mut self, time: DateTime<Utc>, symbol: &str) -> bool {
        if let Some(&generated) = self.insight_times.get(symbol) {
            if time - generated < self.period {
                return false;
            }
        }

        self.insight_times.insert(symbol.to_string(), time);
        true
    }

    /// Tracked securities, highest volume first; ties by arrival order.
    fn ranked(&self) -> Vec<&TrackedSecurity> {
        let mut ranked: Vec<&TrackedSecurity> = self.securities.values().collect();
        ranked.sort_by(|a, b| {
            b.security
                .volume
                .cmp(&a.security.volume)
                .then(a.arrival.cmp(&b.arrival))
        });
        ranked
    }

    /// Copy the slice's latest quotes onto tracked securities.
    fn refresh_quotes(&mut self, slice: &Slice) {
        for (symbol, tracked) in self.securities.iter_mut() {
            if let Some(bar) = slice.get(symbol) {
                tracked.security.price = bar.price;
                tracked.security.volume = bar.volume;
            }
        }
    }
}

impl AlphaModel for ConstantAlphaModel {
    fn update(&mut self, now: DateTime<Utc>, slice: &Slice) -> Vec<Insight> {
        self.refresh_quotes(slice);

        if !self.gate.try_fire(now) {
            return Vec::new();
        }

        let selected: Vec<Symbol> = self
            .ranked()
            .into_iter()
            .take(self.top_n)
            .map(|t| t.security.symbol.clone())
            .collect();

        let mut insights = Vec::with_capacity(selected.len());
        for symbol in selected {
            if self.suppress_repeats && !self.should_emit_insight(now, &symbol) {
                trace!(%symbol, "Insight still active, not re-emitting");
                continue;
            }
            insights.push(Insight::price(
                &symbol,
                self.period,
                InsightDirection::Up,
                now,
            ));
        }

        info!(
            %now,
            tracked = self.securities.len(),
            emitted = insights.len(),
            "Constant alpha emitted insights"
        );

        insights
    }

    fn on_securities_changed(&mut self, changes: &SecurityChanges) {
        for removed in &changes.removed {
            self.securities.remove(&removed.symbol);
            self.insight_times.remove(&removed.symbol);
        }

        for added in &changes.added {
            // Already tracked: refresh the quote but keep the original arrival slot
            if let Some(tracked) = self.securities.get_mut(&added.symbol) {
                tracked.security = added.clone();
                continue;
            }

            self.securities.insert(
                added.symbol.clone(),
                TrackedSecurity {
                    security: added.clone(),
                    arrival: self.next_arrival,
                },
            );
            self.next_arrival += 1;
        }

        debug!(
            added = changes.added.len(),
            removed = changes.removed.len(),
            tracked = self.securities.len(),
            "Alpha tracked securities changed"
        );
    }
}
