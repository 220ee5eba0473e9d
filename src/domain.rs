use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, InvalidSymbolError};

/// Total width of an anchor feed id in bytes (category + padded pair).
pub const FEED_ID_BYTES: usize = 21;

/// Category byte of crypto anchor feeds.
pub const CATEGORY_CRYPTO: u8 = 0x01;

/// Anchor feed identifier, `0x`-prefixed hex. Compared by exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds `category || ascii(pair) || zero padding`, e.g. `BTC/USD`.
    pub fn from_pair(category: u8, pair: &str) -> Result<Self, String> {
        let bytes = pair.as_bytes();
        if bytes.is_empty() || bytes.len() > FEED_ID_BYTES - 1 {
            return Err(format!("feed pair {pair:?} must be 1..={} bytes", FEED_ID_BYTES - 1));
        }
        let mut raw = Vec::with_capacity(FEED_ID_BYTES);
        raw.push(category);
        raw.extend_from_slice(bytes);
        raw.resize(FEED_ID_BYTES, 0);

        let mut hex = String::with_capacity(2 + FEED_ID_BYTES * 2);
        hex.push_str("0x");
        for b in raw {
            hex.push_str(&format!("{b:02x}"));
        }
        Ok(Self(hex))
    }

    pub fn crypto(pair: &str) -> Result<Self, String> {
        Self::from_pair(CATEGORY_CRYPTO, pair)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoded anchor feed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedQuote {
    pub id: FeedId,
    pub raw_value: i128,
    pub decimals: i32,
    /// `raw_value * 10^-decimals`
    pub price: f64,
    /// False for the zero-price sentinel of a feed missing from the response.
    pub present: bool,
}

impl FeedQuote {
    pub fn from_raw(id: FeedId, raw_value: i128, decimals: i32) -> Result<Self, FetchError> {
        let price = scale_value(raw_value, decimals).ok_or_else(|| FetchError::Decode {
            id: id.to_string(),
            reason: format!("value {raw_value} with {decimals} decimals is out of range"),
        })?;
        Ok(Self { id, raw_value, decimals, price, present: true })
    }

    pub fn missing(id: FeedId) -> Self {
        Self { id, raw_value: 0, decimals: 0, price: 0.0, present: false }
    }
}

/// Largest decimal exponent a feed may carry, either sign.
pub const MAX_DECIMALS: i32 = 28;

/// Exact fixed-point scaling, rounded to `f64` once at the end.
pub fn scale_value(raw_value: i128, decimals: i32) -> Option<f64> {
    if !(-MAX_DECIMALS..=MAX_DECIMALS).contains(&decimals) {
        return None;
    }
    let scaled = if decimals >= 0 {
        Decimal::try_from_i128_with_scale(raw_value, decimals as u32).ok()?
    } else {
        let mut d = Decimal::try_from_i128_with_scale(raw_value, 0).ok()?;
        for _ in 0..decimals.unsigned_abs() {
            d = d.checked_mul(Decimal::TEN)?;
        }
        d
    };
    scaled.to_f64().filter(|p| p.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Hold,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Hold => write!(f, "HOLD"),
            Action::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of a decision rule. `instruction` is the exact attestation nonce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub instruction: String,
    /// Reference price the decision was taken on.
    pub price: f64,
    pub rate: Option<f64>,
}

/// Opaque quote returned by the TEE provider for one nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttestationToken(String);

impl AttestationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Deciding,
    Attesting,
    Done,
    Errored,
}

/// Payload of one strategy run.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyResult {
    pub message: String,
    pub signature: Option<AttestationToken>,
    pub instruction: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub stage: Stage,
}

impl StrategyResult {
    /// True only when the instruction carries an attestation.
    pub fn is_attested(&self) -> bool {
        self.stage == Stage::Done && self.signature.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceResponse {
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self { price: 0.0, timestamp: None, error: Some(error.into()) }
    }
}

/// Symbols served by the price lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Btc,
    Eth,
    Bnb,
}

impl Symbol {
    pub fn pair(self) -> &'static str {
        match self {
            Symbol::Btc => "BTC/USD",
            Symbol::Eth => "ETH/USD",
            Symbol::Bnb => "BNB/USD",
        }
    }

    pub fn feed_id(self) -> FeedId {
        match self {
            Symbol::Btc => FeedId::new("0x014254432f55534400000000000000000000000000"),
            Symbol::Eth => FeedId::new("0x014554482f55534400000000000000000000000000"),
            Symbol::Bnb => FeedId::new("0x01424e422f55534400000000000000000000000000"),
        }
    }
}

impl FromStr for Symbol {
    type Err = InvalidSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" => Ok(Symbol::Btc),
            "eth" => Ok(Symbol::Eth),
            "bnb" => Ok(Symbol::Bnb),
            _ => Err(InvalidSymbolError { symbol: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_id_matches_published_layout() {
        for sym in [Symbol::Btc, Symbol::Eth, Symbol::Bnb] {
            assert_eq!(FeedId::crypto(sym.pair()).unwrap(), sym.feed_id());
        }
        assert_eq!(
            FeedId::crypto("FLR/USD").unwrap().as_str(),
            "0x01464c522f55534400000000000000000000000000"
        );
    }

    #[test]
    fn feed_id_rejects_oversized_pair() {
        assert!(FeedId::crypto("").is_err());
        assert!(FeedId::crypto("ABCDEFGHIJ/KLMNOPQRST").is_err());
    }

    #[test]
    fn scaling_is_exact_across_decimal_range() {
        let values: [i128; 4] = [1, 9_499_900_000_000, 123_456_789_012_345, i64::MAX as i128 + 1];
        for value in values {
            for decimals in 0..=18 {
                let got = scale_value(value, decimals).unwrap();
                let want = value as f64 / 10f64.powi(decimals);
                let rel = ((got - want) / want).abs();
                assert!(rel <= 1e-9, "value={value} decimals={decimals} got={got} want={want}");
            }
        }
    }

    #[test]
    fn negative_decimals_scale_up() {
        assert_eq!(scale_value(12, -3), Some(12_000.0));
        assert_eq!(scale_value(1, -MAX_DECIMALS), Some(1e28));
    }

    #[test]
    fn exponent_outside_decimal_range_is_rejected() {
        let started = std::time::Instant::now();
        assert_eq!(scale_value(0, i32::MIN + 1), None);
        assert_eq!(scale_value(0, i32::MIN), None);
        assert_eq!(scale_value(0, -(MAX_DECIMALS + 1)), None);
        assert_eq!(scale_value(0, MAX_DECIMALS + 1), None);
        assert_eq!(scale_value(0, i32::MAX), None);
        assert!(started.elapsed() < std::time::Duration::from_millis(100));

        let err = FeedQuote::from_raw(Symbol::Btc.feed_id(), 0, -2_147_483_647).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn out_of_range_value_is_a_decode_error() {
        let err = FeedQuote::from_raw(Symbol::Btc.feed_id(), i128::MAX, 8).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn symbol_parse_is_case_insensitive() {
        assert_eq!("BTC".parse::<Symbol>().unwrap(), Symbol::Btc);
        assert_eq!("eth".parse::<Symbol>().unwrap(), Symbol::Eth);
        let err = "doge".parse::<Symbol>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid symbol");
    }

    #[test]
    fn unsigned_result_serializes_null_signature() {
        let r = StrategyResult {
            message: "m".into(),
            signature: None,
            instruction: "HOLD".into(),
            price: 1.5,
            error: None,
            stage: Stage::Done,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert!(v["signature"].is_null());
        assert!(v.get("error").is_none());
        assert!(v.get("stage").is_none());
        assert!(!r.is_attested());
    }
}
