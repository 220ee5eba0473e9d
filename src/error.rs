//! Error taxonomy for the feed, attestation and symbol-lookup boundaries.
use thiserror::Error;

/// Failure talking to the feed service. Recovered by the orchestrator via fallback values.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no feed ids requested")]
    EmptyRequest,

    #[error("feed transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed service returned HTTP {0}")]
    Status(u16),

    #[error("malformed feed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("cannot decode feed {id}: {reason}")]
    Decode { id: String, reason: String },
}

/// Failure producing an attestation token. No partial token is ever returned.
#[derive(Error, Debug)]
pub enum AttestationError {
    #[error("no nonce supplied")]
    NoNonce,

    #[error("nonce is {len} bytes, must be within [{min}, {max}]")]
    NonceLength { len: usize, min: usize, max: usize },

    #[error("attestation transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("attestation provider rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("attestation provider returned an empty token")]
    EmptyToken,
}

/// Requested symbol has no known feed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid symbol")]
pub struct InvalidSymbolError {
    pub symbol: String,
}
