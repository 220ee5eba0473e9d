//! Handlers behind `POST /execute-strategy` and `GET /price/{symbol}`.
//!
//! Transport-agnostic: the HTTP layer serializes the returned values as-is.
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::attestation::{AttestationBinder, VtpmAttestation};
use crate::config::Config;
use crate::domain::{PriceResponse, StrategyResult, Symbol};
use crate::engine::Orchestrator;
use crate::fdc::{FdcClient, FeedSource};
use crate::time::clock_label;

#[derive(Clone)]
pub struct Service {
    engine: Orchestrator,
    feeds: Arc<dyn FeedSource>,
    tz: String,
}

impl Service {
    pub fn new(engine: Orchestrator, feeds: Arc<dyn FeedSource>, tz: String) -> Self {
        Self { engine, feeds, tz }
    }

    /// Wires the real feed client and the configured attestation mode.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let feeds: Arc<dyn FeedSource> = Arc::new(FdcClient::new(
            &cfg.fdc_base_url,
            &cfg.fdc_anchor_feeds_path,
            cfg.http_timeout(),
        )?);
        let vtpm = VtpmAttestation::new(
            cfg.attestation_simulate,
            cfg.attestation_url.clone(),
            cfg.attestation_audience.clone(),
            cfg.http_timeout(),
        )?;
        info!(simulate = vtpm.is_simulated(), "service.attestation");

        let engine = Orchestrator::new(cfg.strategy.clone(), feeds.clone(), Arc::new(AttestationBinder::new(vtpm)));
        Ok(Self::new(engine, feeds, cfg.tz.clone()))
    }

    pub async fn execute_strategy(&self) -> StrategyResult {
        self.engine.run().await
    }

    pub async fn price(&self, symbol: &str) -> PriceResponse {
        let symbol = match symbol.parse::<Symbol>() {
            Ok(s) => s,
            Err(e) => {
                warn!(symbol = %e.symbol, "service.price.invalid_symbol");
                return PriceResponse::failed(e.to_string());
            }
        };

        let id = symbol.feed_id();
        match self.feeds.fetch_quotes(std::slice::from_ref(&id)).await {
            Ok(quotes) => match quotes.get(&id) {
                Some(q) if q.present => PriceResponse {
                    price: q.price,
                    timestamp: Some(clock_label(&self.tz)),
                    error: None,
                },
                _ => PriceResponse { price: 0.0, timestamp: None, error: None },
            },
            Err(e) => {
                warn!(pair = symbol.pair(), error = %e, "service.price.fetch_failed");
                PriceResponse::failed(e.to_string())
            }
        }
    }
}
