//! Market data types and the paper portfolio.

pub mod portfolio;
pub mod types;

pub use portfolio::{Fill, Holding, Portfolio};
pub use types::{Bar, CoarseRecord, FineRecord, Security, SecurityChanges, Slice, Symbol};
