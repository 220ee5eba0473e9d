//! Decision rules. Pure functions of feed quotes and configuration.
pub mod cross_rate;
pub mod threshold;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Decision, FeedId, FeedQuote};

pub use cross_rate::CrossRateRule;
pub use threshold::{format_price, ThresholdRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DecisionRule {
    /// BUY one asset while its price is strictly below a bound.
    Threshold(ThresholdRule),
    /// Always BUY, priced by the ratio of two feeds.
    CrossRate(CrossRateRule),
}

impl DecisionRule {
    /// Feeds that must be fetched before deciding.
    pub fn feeds(&self) -> Vec<FeedId> {
        match self {
            DecisionRule::Threshold(r) => vec![r.feed.clone()],
            DecisionRule::CrossRate(r) => vec![r.numerator.clone(), r.denominator.clone()],
        }
    }

    pub fn decide(&self, quotes: &HashMap<FeedId, FeedQuote>) -> Decision {
        match self {
            DecisionRule::Threshold(r) => r.decide(price_of(quotes, &r.feed)),
            DecisionRule::CrossRate(r) => {
                let numerator = price_of(quotes, &r.numerator);
                let denominator = price_of(quotes, &r.denominator);
                r.decide(denominator, r.implied_rate(numerator, denominator))
            }
        }
    }

    /// Decision on configured constants, used when the feed fetch failed.
    pub fn decide_fallback(&self, fallback_price: f64) -> Decision {
        match self {
            DecisionRule::Threshold(r) => r.decide(fallback_price),
            DecisionRule::CrossRate(r) => r.decide(fallback_price, r.fallback_rate),
        }
    }
}

fn price_of(quotes: &HashMap<FeedId, FeedQuote>, id: &FeedId) -> f64 {
    quotes.get(id).map(|q| q.price).unwrap_or(0.0)
}
