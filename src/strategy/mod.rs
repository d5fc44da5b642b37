//! Strategy components: universe selection, alpha, portfolio construction, execution.

pub mod allocator;
pub mod alpha;
pub mod executor;
pub mod fine_filter;
pub mod insight;
pub mod rebalance;
pub mod risk;
pub mod universe;

pub use allocator::{EqualWeightingAllocator, PortfolioTarget};
pub use alpha::{AlphaModel, ConstantAlphaModel};
pub use executor::ImmediateExecutor;
pub use fine_filter::FineFundamentalFilter;
pub use insight::{ActiveInsights, Insight, InsightDirection, InsightType};
pub use rebalance::{GateState, RebalanceGate};
pub use risk::{NullRiskManagement, RiskManagementModel};
pub use universe::{CoarseUniverseSelector, UniverseSelection};
