use serde::{Deserialize, Serialize};

use crate::domain::{Action, Decision, FeedId};

/// Instruction amounts are always rendered with this many decimals.
pub const RATE_DECIMALS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRateRule {
    /// Asset spent, e.g. `C2FLR`.
    pub base_symbol: String,
    /// Asset received, e.g. `WBTC`.
    pub quote_symbol: String,
    pub numerator: FeedId,
    pub denominator: FeedId,
    pub unit_amount: f64,
    pub fallback_rate: f64,
}

impl CrossRateRule {
    /// `numerator / denominator`, or the fallback rate when that is undefined.
    pub fn implied_rate(&self, numerator: f64, denominator: f64) -> f64 {
        if denominator > 0.0 {
            let rate = numerator / denominator;
            if rate.is_finite() {
                return rate;
            }
        }
        self.fallback_rate
    }

    pub fn decide(&self, reference_price: f64, rate: f64) -> Decision {
        let amount_out = self.unit_amount * rate;
        Decision {
            action: Action::Buy,
            instruction: format!(
                "BUY {} {} worth of {} at rate {:.prec$} (Output: {:.prec$} {})",
                self.unit_amount,
                self.base_symbol,
                self.quote_symbol,
                rate,
                amount_out,
                self.quote_symbol,
                prec = RATE_DECIMALS,
            ),
            price: reference_price,
            rate: Some(rate),
        }
    }
}
