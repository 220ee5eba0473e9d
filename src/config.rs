use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{FeedId, Symbol};
use crate::strategy::{CrossRateRule, DecisionRule, ThresholdRule};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Feed service
    pub fdc_base_url: String,
    pub fdc_anchor_feeds_path: String,
    pub http_timeout_ms: u64,

    // Attestation
    pub attestation_simulate: bool,
    pub attestation_url: String,
    pub attestation_audience: String,

    // Runtime
    pub tz: String,

    pub strategy: StrategyConfig,
}

/// Everything a strategy run decides with. Passed to the orchestrator at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub rule: DecisionRule,
    /// Reference price substituted when the feed fetch fails.
    pub fallback_price: f64,
}

pub const DEFAULT_BUY_THRESHOLD: f64 = 95_000.0;
pub const DEFAULT_FALLBACK_PRICE: f64 = 94_999.00;
pub const DEFAULT_FALLBACK_RATE: f64 = 0.0000105;

impl StrategyConfig {
    /// Single-asset BUY/HOLD on BTC/USD.
    pub fn threshold(buy_below: f64, fallback_price: f64) -> Self {
        Self {
            rule: DecisionRule::Threshold(ThresholdRule {
                asset: "BTC".into(),
                feed: Symbol::Btc.feed_id(),
                buy_below,
            }),
            fallback_price,
        }
    }

    /// FLR priced in BTC, bought as C2FLR -> WBTC.
    pub fn cross_rate(unit_amount: f64, fallback_rate: f64, fallback_price: f64) -> Result<Self> {
        let numerator = FeedId::crypto("FLR/USD").map_err(|e| anyhow!(e))?;
        Ok(Self {
            rule: DecisionRule::CrossRate(CrossRateRule {
                base_symbol: "C2FLR".into(),
                quote_symbol: "WBTC".into(),
                numerator,
                denominator: Symbol::Btc.feed_id(),
                unit_amount,
                fallback_rate,
            }),
            fallback_price,
        })
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::threshold(DEFAULT_BUY_THRESHOLD, DEFAULT_FALLBACK_PRICE)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

/// Set-but-unparseable values are logged and treated as unset.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    parse_setting(key, &raw)
}

fn parse_setting<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = raw, "config: unparseable value, using default");
            None
        }
    }
}

fn ensure_positive(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(anyhow!("{name} must be a positive number, got {v}"));
    }
    Ok(())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Feed service
        let fdc_base_url = std::env::var("FDC_BASE_URL")
            .unwrap_or_else(|_| "https://flr-data-availability.flare.network".to_string());
        let fdc_anchor_feeds_path = std::env::var("FDC_ANCHOR_FEEDS_PATH")
            .unwrap_or_else(|_| "/api/v0/ftso/anchor-feeds-with-proof".to_string());
        let http_timeout_ms = env_parse::<u64>("HTTP_TIMEOUT_MS").unwrap_or(10_000);
        if http_timeout_ms == 0 {
            return Err(anyhow!("HTTP_TIMEOUT_MS must be > 0"));
        }

        // Attestation. Simulated unless explicitly disabled.
        let attestation_simulate = env_bool("ATTESTATION_SIMULATE", true);
        let attestation_url =
            std::env::var("ATTESTATION_URL").unwrap_or_else(|_| "http://localhost/v1/token".to_string());
        let attestation_audience =
            std::env::var("ATTESTATION_AUDIENCE").unwrap_or_else(|_| "https://sts.google.com".to_string());

        let tz = std::env::var("ENGINE_TZ").unwrap_or_else(|_| "UTC".to_string());

        // Strategy
        let mode = std::env::var("STRATEGY_MODE").unwrap_or_else(|_| "cross_rate".to_string());
        let buy_threshold = env_parse::<f64>("BUY_THRESHOLD").unwrap_or(DEFAULT_BUY_THRESHOLD);
        let fallback_price = env_parse::<f64>("FALLBACK_PRICE").unwrap_or(DEFAULT_FALLBACK_PRICE);
        let fallback_rate = env_parse::<f64>("FALLBACK_RATE").unwrap_or(DEFAULT_FALLBACK_RATE);
        let unit_amount = env_parse::<f64>("TRADE_UNIT_AMOUNT").unwrap_or(1.0);
        ensure_positive("BUY_THRESHOLD", buy_threshold)?;
        ensure_positive("FALLBACK_PRICE", fallback_price)?;
        ensure_positive("FALLBACK_RATE", fallback_rate)?;
        ensure_positive("TRADE_UNIT_AMOUNT", unit_amount)?;

        let mut strategy = match mode.trim().to_lowercase().as_str() {
            "threshold" => StrategyConfig::threshold(buy_threshold, fallback_price),
            "cross_rate" => StrategyConfig::cross_rate(unit_amount, fallback_rate, fallback_price)?,
            other => return Err(anyhow!("unknown STRATEGY_MODE {other:?} (threshold|cross_rate)")),
        };
        if let DecisionRule::CrossRate(r) = &mut strategy.rule {
            if let Ok(base) = std::env::var("TRADE_BASE_SYMBOL") {
                r.base_symbol = base;
            }
            if let Ok(quote) = std::env::var("TRADE_QUOTE_SYMBOL") {
                r.quote_symbol = quote;
            }
        }

        Ok(Self {
            fdc_base_url,
            fdc_anchor_feeds_path,
            http_timeout_ms,
            attestation_simulate,
            attestation_url,
            attestation_audience,
            tz,
            strategy,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}
