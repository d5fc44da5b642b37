//! Coarse universe selection: the most liquid instruments.

use crate::config::UniverseConfig;
use crate::error::{RecordDefect, SelectionError};
use crate::market::{CoarseRecord, Symbol};
use crate::strategy::rebalance::RebalanceGate;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, trace, warn};

/// Reasons for rejecting a candidate during the coarse pass.
#[derive(Debug, Clone, Copy)]
enum RejectReason {
    Invalid(RecordDefect),
    NonPositivePrice,
}

/// Outcome of a coarse selection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniverseSelection {
    /// Not due; keep the current membership.
    Unchanged,
    /// A rebalance happened. The host must liquidate all holdings, then
    /// replace the universe with these members (most liquid first).
    Rebalanced(Vec<Symbol>),
}

impl UniverseSelection {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, UniverseSelection::Unchanged)
    }

    pub fn members(&self) -> Option<&[Symbol]> {
        match self {
            UniverseSelection::Unchanged => None,
            UniverseSelection::Rebalanced(members) => Some(members),
        }
    }
}

/// Picks the `num_coarse` highest-volume instruments with a positive price.
#[derive(Debug, Clone)]
pub struct CoarseUniverseSelector {
    num_coarse: usize,
    gate: RebalanceGate,
}

impl CoarseUniverseSelector {
    /// Create a new selector with the given configuration.
    pub fn new(config: &UniverseConfig) -> Self {
        Self {
            num_coarse: config.num_coarse,
            gate: RebalanceGate::days(config.rebalance_cadence_days),
        }
    }

    pub fn num_coarse(&self) -> usize {
        self.num_coarse
    }

    /// The selector's rebalance cursor.
    pub fn gate(&self) -> &RebalanceGate {
        &self.gate
    }

    /// Gate on cadence, then rank. Waiting calls touch no state.
    pub fn select(&mut self, now: DateTime<Utc>, candidates: &[CoarseRecord]) -> UniverseSelection {
        if !self.gate.try_fire(now) {
            return UniverseSelection::Unchanged;
        }

        debug!(
            %now,
            next_allowed = ?self.gate.next_allowed(),
            candidates = candidates.len(),
            "Universe rebalance due"
        );

        UniverseSelection::Rebalanced(self.rank(candidates))
    }

    /// Filter and rank without consulting the gate.
    ///
    /// Drops non-positive (or missing) prices, sorts by volume descending and
    /// keeps the first `num_coarse`. The sort is stable: equal volumes keep
    /// their input order.
    pub fn rank(&self, candidates: &[CoarseRecord]) -> Vec<Symbol> {
        let mut rejected_invalid = 0usize;
        let mut rejected_price = 0usize;

        let mut selected: Vec<&CoarseRecord> = candidates
            .iter()
            .filter(|record| match Self::qualify(record) {
                Ok(()) => true,
                Err(reason) => {
                    match reason {
                        RejectReason::Invalid(defect) => {
                            trace!(
                                error = %SelectionError::invalid(&record.symbol, defect),
                                "Skipping coarse record"
                            );
                            rejected_invalid += 1;
                        }
                        RejectReason::NonPositivePrice => rejected_price += 1,
                    }
                    false
                }
            })
            .collect();

        // Sort by volume (descending) - most liquid first
        selected.sort_by(|a, b| b.volume_or_zero().cmp(&a.volume_or_zero()));

        let members: Vec<Symbol> = selected
            .into_iter()
            .take(self.num_coarse)
            .map(|record| record.symbol.clone())
            .collect();

        if members.is_empty() {
            warn!(
                candidates = candidates.len(),
                error = %SelectionError::EmptyUniverse,
                "Coarse selection produced an empty universe"
            );
        }

        info!(
            total_scanned = candidates.len(),
            selected = members.len(),
            rejected_invalid,
            rejected_price,
            "Coarse selection complete"
        );

        members
    }

    fn qualify(record: &CoarseRecord) -> Result<(), RejectReason> {
        // Missing price reads as zero and is filtered like any other non-positive price
        if let Err(SelectionError::InvalidRecord { defect, .. }) = record.validate() {
            if defect != RecordDefect::MissingPrice {
                return Err(RejectReason::Invalid(defect));
            }
        }

        if record.price_or_zero() <= Decimal::ZERO {
            return Err(RejectReason::NonPositivePrice);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn test_selector(num_coarse: usize) -> CoarseUniverseSelector {
        CoarseUniverseSelector::new(&UniverseConfig {
            num_coarse,
            ..UniverseConfig::default()
        })
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 7, 0, 0, 0).unwrap()
    }

    fn rec(symbol: &str, price: Decimal, volume: Decimal) -> CoarseRecord {
        CoarseRecord::new(symbol, price, volume)
    }

    // =========================================================================
    // Ranking Tests
    // =========================================================================

    #[test]
    fn test_filters_non_positive_price_and_ranks_by_volume() {
        let mut selector = test_selector(2);
        let candidates = vec![
            rec("A", dec!(10), dec!(100)),
            rec("B", dec!(-1), dec!(500)),
            rec("C", dec!(5), dec!(300)),
        ];

        let selection = selector.select(t0(), &candidates);

        assert_eq!(
            selection,
            UniverseSelection::Rebalanced(vec!["C".to_string(), "A".to_string()])
        );
    }

    #[test]
    fn test_zero_price_is_filtered() {
        let selector = test_selector(10);
        let members = selector.rank(&[rec("Z", dec!(0), dec!(1_000_000)), rec("A", dec!(1), dec!(1))]);

        assert_eq!(members, vec!["A"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let selector = test_selector(10);
        let candidates = vec![
            rec("X", dec!(1), dec!(50)),
            rec("Y", dec!(1), dec!(50)),
            rec("Z", dec!(1), dec!(80)),
            rec("W", dec!(1), dec!(50)),
        ];

        assert_eq!(selector.rank(&candidates), vec!["Z", "X", "Y", "W"]);
    }

    #[test]
    fn test_truncates_to_num_coarse() {
        let selector = test_selector(500);
        let candidates: Vec<CoarseRecord> = (0..750)
            .map(|i| rec(&format!("S{i}"), dec!(10), Decimal::from(i)))
            .collect();

        let members = selector.rank(&candidates);

        assert_eq!(members.len(), 500);
        assert_eq!(members[0], "S749");
        assert_eq!(members[499], "S250");
    }

    #[test]
    fn test_output_sorted_by_descending_volume() {
        let selector = test_selector(500);
        let volumes = [7, 3, 9, 1, 4, 8, 2];
        let candidates: Vec<CoarseRecord> = volumes
            .iter()
            .map(|v| rec(&format!("V{v}"), dec!(1), Decimal::from(*v)))
            .collect();

        let members = selector.rank(&candidates);

        assert_eq!(members, vec!["V9", "V8", "V7", "V4", "V3", "V2", "V1"]);
    }

    #[test]
    fn test_missing_fields_are_tolerated() {
        let selector = test_selector(10);
        let candidates = vec![
            CoarseRecord {
                symbol: "NOPRICE".to_string(),
                price: None,
                volume: Some(dec!(1_000_000)),
            },
            CoarseRecord {
                symbol: "NOVOL".to_string(),
                price: Some(dec!(20)),
                volume: None,
            },
            rec("", dec!(5), dec!(999)),
            rec("OK", dec!(5), dec!(10)),
        ];

        // Missing volume ranks as zero; missing price and empty symbol are dropped
        assert_eq!(selector.rank(&candidates), vec!["OK", "NOVOL"]);
    }

    #[test]
    fn test_empty_candidates_yield_empty_membership() {
        let mut selector = test_selector(500);
        assert_eq!(selector.select(t0(), &[]), UniverseSelection::Rebalanced(vec![]));
    }

    // =========================================================================
    // Cadence Tests
    // =========================================================================

    #[test]
    fn test_unchanged_before_cursor_elapses() {
        let mut selector = test_selector(500);
        let candidates = vec![rec("A", dec!(10), dec!(100))];

        assert!(!selector.select(t0(), &candidates).is_unchanged());
        let cursor = selector.gate().next_allowed();

        assert!(selector.select(t0() + Duration::hours(6), &candidates).is_unchanged());
        assert!(selector.select(t0() + Duration::days(1), &candidates).is_unchanged());
        assert_eq!(selector.gate().next_allowed(), cursor);

        let later = selector.select(t0() + Duration::days(1) + Duration::minutes(1), &candidates);
        assert_eq!(later.members(), Some(&["A".to_string()][..]));
    }

    #[test]
    fn test_first_call_always_rebalances() {
        let mut selector = test_selector(500);
        assert!(selector.gate().next_allowed().is_none());
        assert!(!selector.select(t0(), &[]).is_unchanged());
        assert_eq!(selector.gate().next_allowed(), Some(t0() + Duration::days(1)));
    }
}
