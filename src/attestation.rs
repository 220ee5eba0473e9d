use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use sha3::{Digest, Sha3_256};
use tracing::{debug, info};

use crate::domain::AttestationToken;
use crate::error::AttestationError;

/// Nonce size window accepted by the attestation provider, in UTF-8 bytes.
pub const NONCE_MIN_BYTES: usize = 10;
pub const NONCE_MAX_BYTES: usize = 74;

pub fn validate_nonce(nonce: &str) -> Result<(), AttestationError> {
    let len = nonce.len();
    if !(NONCE_MIN_BYTES..=NONCE_MAX_BYTES).contains(&len) {
        return Err(AttestationError::NonceLength { len, min: NONCE_MIN_BYTES, max: NONCE_MAX_BYTES });
    }
    Ok(())
}

/// Raw TEE token provider.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, nonces: &[String]) -> Result<String, AttestationError>;
}

/// Binds one instruction into a fresh attestation token.
#[async_trait]
pub trait Attester: Send + Sync {
    async fn attest(&self, nonce: &str) -> Result<AttestationToken, AttestationError>;
}

/// vTPM attestation client.
///
/// `simulate` is fixed at construction. Simulated tokens are JWT-shaped and
/// deterministic in (audience, nonces); they carry no hardware evidence.
#[derive(Clone)]
pub struct VtpmAttestation {
    simulate: bool,
    url: String,
    audience: String,
    http: Client,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    audience: &'a str,
    token_type: &'a str,
    nonces: &'a [String],
}

impl VtpmAttestation {
    pub fn new(simulate: bool, url: String, audience: String, timeout: Duration) -> Result<Self, AttestationError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { simulate, url, audience, http })
    }

    pub fn is_simulated(&self) -> bool {
        self.simulate
    }

    fn simulated_token(&self, nonces: &[String]) -> String {
        let header = json!({ "alg": "RS256", "kid": "simulated", "typ": "JWT" });
        let claims = json!({
            "aud": self.audience,
            "iss": "https://confidentialcomputing.googleapis.com",
            "hwmodel": "GCP_INTEL_TDX",
            "swname": "CONFIDENTIAL_SPACE",
            "dbgstat": "enabled",
            "eat_nonce": nonces,
            "simulated": true,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let digest = Sha3_256::digest(signing_input.as_bytes());
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(digest))
    }
}

#[async_trait]
impl TokenProvider for VtpmAttestation {
    async fn get_token(&self, nonces: &[String]) -> Result<String, AttestationError> {
        if nonces.is_empty() {
            return Err(AttestationError::NoNonce);
        }
        for nonce in nonces {
            validate_nonce(nonce)?;
        }

        if self.simulate {
            debug!(nonces = nonces.len(), "attestation.simulated");
            return Ok(self.simulated_token(nonces));
        }

        info!(url = %self.url, nonces = nonces.len(), "attestation.request");
        let resp = self
            .http
            .post(&self.url)
            .json(&TokenRequest { audience: &self.audience, token_type: "OIDC", nonces })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AttestationError::Rejected { status: status.as_u16(), body });
        }
        Ok(body.trim().to_string())
    }
}

/// Checks the nonce window locally, then asks the provider for a token.
pub struct AttestationBinder<P> {
    provider: P,
}

impl<P: TokenProvider> AttestationBinder<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: TokenProvider> Attester for AttestationBinder<P> {
    async fn attest(&self, nonce: &str) -> Result<AttestationToken, AttestationError> {
        validate_nonce(nonce)?;
        let token = self.provider.get_token(&[nonce.to_string()]).await?;
        if token.is_empty() {
            return Err(AttestationError::EmptyToken);
        }
        Ok(AttestationToken::new(token))
    }
}
