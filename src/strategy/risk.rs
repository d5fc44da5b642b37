//! Risk adjustment of portfolio targets.

use crate::market::Portfolio;
use crate::strategy::allocator::PortfolioTarget;

/// Adjusts targets after portfolio construction and before execution.
pub trait RiskManagementModel {
    fn manage_risk(&mut self, targets: Vec<PortfolioTarget>, portfolio: &Portfolio)
        -> Vec<PortfolioTarget>;
}

/// Passes targets through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRiskManagement;

impl RiskManagementModel for NullRiskManagement {
    fn manage_risk(
        &mut self,
        targets: Vec<PortfolioTarget>,
        _portfolio: &Portfolio,
    ) -> Vec<PortfolioTarget> {
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_null_risk_passes_targets_through() {
        let targets = vec![
            PortfolioTarget::new("A", dec!(10)),
            PortfolioTarget::new("B", dec!(0)),
        ];
        let portfolio = Portfolio::new(dec!(1000));

        let adjusted = NullRiskManagement.manage_risk(targets.clone(), &portfolio);

        assert_eq!(adjusted, targets);
    }
}
