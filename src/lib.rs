//! Price-triggered attestation engine.
//!
//! Fetches anchor feed prices, decides on a trade instruction and binds that
//! instruction into a TEE attestation token as its nonce.
pub mod attestation;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fdc;
pub mod monitoring;
pub mod service;
pub mod strategy;
pub mod time;

pub use config::{Config, StrategyConfig};
pub use domain::{Action, AttestationToken, Decision, FeedId, FeedQuote, PriceResponse, Stage, StrategyResult};
pub use engine::Orchestrator;
pub use error::{AttestationError, FetchError, InvalidSymbolError};
pub use service::Service;
