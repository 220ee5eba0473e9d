use serde::{Deserialize, Serialize};

use crate::domain::{Action, Decision, FeedId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Asset name used in the instruction, e.g. `BTC`.
    pub asset: String,
    pub feed: FeedId,
    /// BUY strictly below this price.
    pub buy_below: f64,
}

impl ThresholdRule {
    pub fn decide(&self, price: f64) -> Decision {
        // A missing feed resolves to 0.0; never trade on it.
        if !price.is_finite() || price <= 0.0 {
            return Decision { action: Action::Error, instruction: Action::Error.to_string(), price, rate: None };
        }

        if price < self.buy_below {
            Decision {
                action: Action::Buy,
                instruction: format!("BUY {} at price {}", self.asset, format_price(price)),
                price,
                rate: None,
            }
        } else {
            Decision { action: Action::Hold, instruction: Action::Hold.to_string(), price, rate: None }
        }
    }
}

/// Shortest round-trip form that always keeps a fractional part (`94999.0`).
pub fn format_price(price: f64) -> String {
    format!("{price:?}")
}
