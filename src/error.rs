//! Non-fatal selection errors.
//!
//! Nothing here aborts a batch: selectors count and log these, skip the
//! offending record, and carry on with the rest of the snapshot.

use thiserror::Error;

/// Why a single instrument record could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordDefect {
    #[error("empty symbol")]
    EmptySymbol,
    #[error("missing price")]
    MissingPrice,
    #[error("missing country id")]
    MissingCountry,
    #[error("missing primary exchange id")]
    MissingExchange,
}

/// Errors raised while narrowing the universe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// A candidate is missing required fields; it is skipped.
    #[error("invalid record '{symbol}': {defect}")]
    InvalidRecord { symbol: String, defect: RecordDefect },

    /// No candidate survived filtering. A valid, expected state.
    #[error("no candidates survived filtering")]
    EmptyUniverse,
}

impl SelectionError {
    pub fn invalid(symbol: &str, defect: RecordDefect) -> Self {
        Self::InvalidRecord {
            symbol: symbol.to_string(),
            defect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_message() {
        let err = SelectionError::invalid("AAPL", RecordDefect::MissingPrice);
        assert_eq!(err.to_string(), "invalid record 'AAPL': missing price");
    }

    #[test]
    fn test_empty_universe_message() {
        assert_eq!(
            SelectionError::EmptyUniverse.to_string(),
            "no candidates survived filtering"
        );
    }
}
