//! Fine universe filter: company reference metadata.

use crate::config::UniverseConfig;
use crate::error::SelectionError;
use crate::market::{FineRecord, Symbol};
use std::collections::HashSet;
use tracing::{info, trace, warn};

/// Keeps US companies whose primary listing is on an allowed exchange.
///
/// No ranking of its own: output keeps input order, truncated to `num_fine`.
#[derive(Debug, Clone)]
pub struct FineFundamentalFilter {
    country: String,
    allowed_exchanges: HashSet<String>,
    num_fine: usize,
}

impl FineFundamentalFilter {
    pub fn new(config: &UniverseConfig) -> Self {
        Self {
            country: config.country.clone(),
            allowed_exchanges: config.allowed_exchanges.iter().cloned().collect(),
            num_fine: config.num_fine,
        }
    }

    pub fn filter(&self, records: &[FineRecord]) -> Vec<Symbol> {
        let mut rejected_invalid = 0usize;

        let members: Vec<Symbol> = records
            .iter()
            .filter(|record| {
                if let Err(e) = record.validate() {
                    trace!(error = %e, "Skipping fine record");
                    rejected_invalid += 1;
                    return false;
                }
                self.accepts(record)
            })
            .take(self.num_fine)
            .map(|record| record.symbol.clone())
            .collect();

        if members.is_empty() && !records.is_empty() {
            warn!(
                candidates = records.len(),
                error = %SelectionError::EmptyUniverse,
                "Fine filter rejected every candidate"
            );
        }

        info!(
            total_scanned = records.len(),
            selected = members.len(),
            rejected_invalid,
            "Fine filter complete"
        );

        members
    }

    fn accepts(&self, record: &FineRecord) -> bool {
        let country_ok = record.country_id.as_deref() == Some(self.country.as_str());
        let exchange_ok = record
            .primary_exchange_id
            .as_deref()
            .is_some_and(|id| self.allowed_exchanges.contains(id));

        country_ok && exchange_ok
    }
}
