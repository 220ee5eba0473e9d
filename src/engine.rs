use std::sync::Arc;

use tracing::{error, info, warn};

use crate::attestation::Attester;
use crate::config::StrategyConfig;
use crate::domain::{Action, Decision, Stage, StrategyResult};
use crate::fdc::FeedSource;
use crate::strategy::{format_price, DecisionRule};

/// Runs fetch -> decide -> attest for one invocation. Holds no per-run state.
#[derive(Clone)]
pub struct Orchestrator {
    cfg: StrategyConfig,
    feeds: Arc<dyn FeedSource>,
    attester: Arc<dyn Attester>,
}

/// Where the decision inputs came from; disclosed in the result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceSource {
    Fdc,
    Fallback,
}

impl PriceSource {
    fn label(self) -> &'static str {
        match self {
            PriceSource::Fdc => "FDC",
            PriceSource::Fallback => "fallback",
        }
    }
}

impl Orchestrator {
    pub fn new(cfg: StrategyConfig, feeds: Arc<dyn FeedSource>, attester: Arc<dyn Attester>) -> Self {
        Self { cfg, feeds, attester }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.cfg
    }

    pub async fn run(&self) -> StrategyResult {
        let rule = &self.cfg.rule;
        let ids = rule.feeds();

        info!(stage = ?Stage::Fetching, feeds = ids.len(), "engine.fetching");
        let (decision, source) = match self.feeds.fetch_quotes(&ids).await {
            Ok(quotes) => {
                info!(stage = ?Stage::Deciding, "engine.deciding");
                (rule.decide(&quotes), PriceSource::Fdc)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback_price = self.cfg.fallback_price,
                    "engine.fetch_failed; deciding on fallback values"
                );
                info!(stage = ?Stage::Deciding, "engine.deciding");
                (rule.decide_fallback(self.cfg.fallback_price), PriceSource::Fallback)
            }
        };

        let message = self.message(&decision, source);
        match decision.action {
            Action::Hold => {
                info!(stage = ?Stage::Done, price = decision.price, "engine.done: hold, nothing to attest");
                finish(message, decision, None, Stage::Done)
            }
            Action::Error => {
                error!(stage = ?Stage::Errored, price = decision.price, "engine.errored: no usable price");
                let reason = format!("no usable price (got {})", decision.price);
                finish(message, decision, Some(reason), Stage::Errored)
            }
            Action::Buy => {
                info!(stage = ?Stage::Attesting, instruction = %decision.instruction, "engine.attesting");
                match self.attester.attest(&decision.instruction).await {
                    Ok(token) => {
                        info!(stage = ?Stage::Done, "engine.done");
                        StrategyResult {
                            message,
                            signature: Some(token),
                            instruction: decision.instruction,
                            price: decision.price,
                            error: None,
                            stage: Stage::Done,
                        }
                    }
                    Err(e) => {
                        error!(stage = ?Stage::Errored, error = %e, "engine.errored: attestation failed");
                        finish(message, decision, Some(e.to_string()), Stage::Errored)
                    }
                }
            }
        }
    }

    fn message(&self, decision: &Decision, source: PriceSource) -> String {
        match (&self.cfg.rule, decision.action) {
            (DecisionRule::CrossRate(r), _) => format!(
                "Trigger Detected BUYING {} {} worth of {} (Rate: {:.8} via {})",
                r.unit_amount,
                r.base_symbol,
                r.quote_symbol,
                decision.rate.unwrap_or(r.fallback_rate),
                source.label()
            ),
            (DecisionRule::Threshold(r), Action::Buy) => format!(
                "Trigger Detected BUYING {} at {} (below {} via {})",
                r.asset,
                format_price(decision.price),
                format_price(r.buy_below),
                source.label()
            ),
            (DecisionRule::Threshold(r), Action::Hold) => format!(
                "No trigger: {} at {} (threshold {} via {})",
                r.asset,
                format_price(decision.price),
                format_price(r.buy_below),
                source.label()
            ),
            (DecisionRule::Threshold(r), Action::Error) => {
                format!("No decision: {} price unavailable via {}", r.asset, source.label())
            }
        }
    }
}

fn finish(message: String, decision: Decision, error: Option<String>, stage: Stage) -> StrategyResult {
    StrategyResult {
        message,
        signature: None,
        instruction: decision.instruction,
        price: decision.price,
        error,
        stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::domain::{AttestationToken, FeedId, FeedQuote, Symbol};
    use crate::error::{AttestationError, FetchError};
    use crate::strategy::{CrossRateRule, ThresholdRule};

    enum FakeFeed {
        Quotes(Vec<(FeedId, i128, i32)>),
        Down,
    }

    #[async_trait]
    impl FeedSource for FakeFeed {
        async fn fetch_quotes(&self, ids: &[FeedId]) -> Result<HashMap<FeedId, FeedQuote>, FetchError> {
            match self {
                FakeFeed::Down => Err(FetchError::Status(502)),
                FakeFeed::Quotes(items) => Ok(ids
                    .iter()
                    .map(|id| {
                        let q = items
                            .iter()
                            .find(|(i, _, _)| i == id)
                            .map(|(i, v, d)| FeedQuote::from_raw(i.clone(), *v, *d).unwrap())
                            .unwrap_or_else(|| FeedQuote::missing(id.clone()));
                        (id.clone(), q)
                    })
                    .collect()),
            }
        }
    }

    #[derive(Default)]
    struct FakeAttester {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Attester for FakeAttester {
        async fn attest(&self, nonce: &str) -> Result<AttestationToken, AttestationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AttestationError::Rejected { status: 500, body: "tee down".into() });
            }
            Ok(AttestationToken::new(format!("quote({nonce})")))
        }
    }

    fn flr() -> FeedId {
        FeedId::crypto("FLR/USD").unwrap()
    }

    fn threshold_cfg() -> StrategyConfig {
        StrategyConfig {
            rule: DecisionRule::Threshold(ThresholdRule {
                asset: "BTC".into(),
                feed: Symbol::Btc.feed_id(),
                buy_below: 95_000.0,
            }),
            fallback_price: 94_999.0,
        }
    }

    fn cross_cfg() -> StrategyConfig {
        StrategyConfig {
            rule: DecisionRule::CrossRate(CrossRateRule {
                base_symbol: "C2FLR".into(),
                quote_symbol: "WBTC".into(),
                numerator: flr(),
                denominator: Symbol::Btc.feed_id(),
                unit_amount: 1.0,
                fallback_rate: 0.0000105,
            }),
            fallback_price: 94_999.0,
        }
    }

    fn engine(cfg: StrategyConfig, feed: FakeFeed, attester: Arc<FakeAttester>) -> Orchestrator {
        Orchestrator::new(cfg, Arc::new(feed), attester)
    }

    #[tokio::test]
    async fn buy_below_threshold_is_attested() {
        let att = Arc::new(FakeAttester::default());
        let feed = FakeFeed::Quotes(vec![(Symbol::Btc.feed_id(), 9_499_900_000_000, 8)]);
        let r = engine(threshold_cfg(), feed, att.clone()).run().await;

        assert_eq!(r.stage, Stage::Done);
        assert_eq!(r.instruction, "BUY BTC at price 94999.0");
        assert_eq!(r.price, 94_999.0);
        assert_eq!(r.signature.as_ref().unwrap().as_str(), "quote(BUY BTC at price 94999.0)");
        assert!(r.is_attested());
        assert_eq!(att.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hold_skips_attestation() {
        let att = Arc::new(FakeAttester::default());
        let feed = FakeFeed::Quotes(vec![(Symbol::Btc.feed_id(), 9_500_000_000_000, 8)]);
        let r = engine(threshold_cfg(), feed, att.clone()).run().await;

        assert_eq!(r.stage, Stage::Done);
        assert_eq!(r.instruction, "HOLD");
        assert!(r.signature.is_none());
        assert!(r.error.is_none());
        assert_eq!(att.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_threshold_feed_errors_without_attesting() {
        let att = Arc::new(FakeAttester::default());
        let r = engine(threshold_cfg(), FakeFeed::Quotes(vec![]), att.clone()).run().await;

        assert_eq!(r.stage, Stage::Errored);
        assert_eq!(r.instruction, "ERROR");
        assert!(r.error.is_some());
        assert_eq!(att.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_and_still_attests() {
        let att = Arc::new(FakeAttester::default());
        let r = engine(threshold_cfg(), FakeFeed::Down, att.clone()).run().await;

        assert_eq!(r.stage, Stage::Done);
        assert_eq!(r.price, 94_999.0);
        assert_eq!(r.instruction, "BUY BTC at price 94999.0");
        assert!(r.message.contains("via fallback"));
        assert!(r.signature.is_some());
    }

    #[tokio::test]
    async fn cross_rate_fetch_failure_uses_fallback_rate() {
        let att = Arc::new(FakeAttester::default());
        let r = engine(cross_cfg(), FakeFeed::Down, att.clone()).run().await;

        assert_eq!(r.stage, Stage::Done);
        assert_eq!(r.price, 94_999.0);
        assert_eq!(
            r.instruction,
            "BUY 1 C2FLR worth of WBTC at rate 0.00001050 (Output: 0.00001050 WBTC)"
        );
        assert_eq!(
            r.message,
            "Trigger Detected BUYING 1 C2FLR worth of WBTC (Rate: 0.00001050 via fallback)"
        );
    }

    #[tokio::test]
    async fn cross_rate_prices_from_feeds() {
        let att = Arc::new(FakeAttester::default());
        let feed = FakeFeed::Quotes(vec![
            (flr(), 2_500_000, 8),
            (Symbol::Btc.feed_id(), 10_000_000_000_000, 8),
        ]);
        let r = engine(cross_cfg(), feed, att.clone()).run().await;

        assert_eq!(r.price, 100_000.0);
        assert_eq!(
            r.instruction,
            "BUY 1 C2FLR worth of WBTC at rate 0.00000025 (Output: 0.00000025 WBTC)"
        );
        assert!(r.message.ends_with("via FDC)"));
        assert!(r.is_attested());
    }

    #[tokio::test]
    async fn attestation_failure_keeps_instruction_unsigned() {
        let att = Arc::new(FakeAttester { calls: AtomicUsize::new(0), fail: true });
        let r = engine(cross_cfg(), FakeFeed::Down, att.clone()).run().await;

        assert_eq!(r.stage, Stage::Errored);
        assert!(r.signature.is_none());
        assert!(r.instruction.starts_with("BUY 1 C2FLR"));
        assert!(r.error.as_deref().unwrap().contains("tee down"));
        assert!(!r.is_attested());
    }

    #[tokio::test]
    async fn oversized_instruction_is_errored_not_attested() {
        use crate::attestation::{AttestationBinder, TokenProvider};

        struct CountingProvider(Arc<AtomicUsize>);

        #[async_trait]
        impl TokenProvider for CountingProvider {
            async fn get_token(&self, _nonces: &[String]) -> Result<String, AttestationError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok("tok".into())
            }
        }

        let mut cfg = cross_cfg();
        if let DecisionRule::CrossRate(r) = &mut cfg.rule {
            r.base_symbol = "AVERYLONGBASESYMBOLNAME".into();
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let binder = Arc::new(AttestationBinder::new(CountingProvider(calls.clone())));
        let r = Orchestrator::new(cfg, Arc::new(FakeFeed::Down), binder).run().await;

        assert_eq!(r.stage, Stage::Errored);
        assert!(r.signature.is_none());
        assert!(r.error.as_deref().unwrap().contains("bytes"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(r.instruction.len() > 74);
    }
}
