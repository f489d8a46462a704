//! Attestation service client.
//!
//! After a burn, the bridge operator observes the source chain and publishes
//! a signed attestation once the burn reaches the requested finality. This
//! module polls the operator's REST API, keyed by the burn transaction hash
//! and the **source** domain:
//!
//! `GET /v2/messages/{domain}?transactionHash={hash}`
//!
//! Only `status == "complete"` counts as success. A 404 or any other status
//! means "not yet indexed" and is retried by the caller's polling loop, never
//! surfaced as an error.

use alloy_primitives::{B256, Bytes};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use url::Url;

/// Production attestation API, used for mainnet source chains.
pub static PRODUCTION_API: Lazy<Url> =
    Lazy::new(|| Url::parse("https://iris-api.circle.com").expect("valid attestation API URL"));
/// Sandbox attestation API, used for testnet source chains.
pub static SANDBOX_API: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://iris-api-sandbox.circle.com").expect("valid attestation API URL")
});

/// A completed attestation: the original message bytes plus the operator's
/// signature over them. Both go verbatim into the destination-chain
/// `receiveMessage` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationMessage {
    pub message: Bytes,
    pub attestation: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum AttestationError {
    #[error("attestation API request failed")]
    Http(#[from] reqwest::Error),
    /// The service reported a complete message but the payload fields were
    /// missing or unparsable. Not retried.
    #[error("malformed attestation response: {0}")]
    Malformed(String),
}

/// Fetch-side of the attestation service.
#[async_trait]
pub trait AttestationClient: Send + Sync {
    /// Look up the message a burn produced. `Ok(None)` means the service has
    /// not indexed or attested it yet.
    async fn fetch(
        &self,
        source_domain: u32,
        tx_hash: B256,
    ) -> Result<Option<AttestationMessage>, AttestationError>;
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<IrisMessage>,
}

// `message` and `attestation` are plain strings here: the service fills them
// with placeholder text (e.g. "PENDING") until the attestation is complete.
#[derive(Debug, Deserialize)]
struct IrisMessage {
    status: String,
    message: Option<String>,
    attestation: Option<String>,
}

fn extract(response: MessagesResponse) -> Result<Option<AttestationMessage>, AttestationError> {
    let Some(first) = response.messages.first() else {
        return Ok(None);
    };
    if first.status != "complete" {
        tracing::debug!(status = %first.status, "attestation not ready");
        return Ok(None);
    }
    let message = first
        .message
        .as_deref()
        .and_then(|s| s.parse::<Bytes>().ok())
        .ok_or_else(|| AttestationError::Malformed("complete message without bytes".into()))?;
    let attestation = first
        .attestation
        .as_deref()
        .and_then(|s| s.parse::<Bytes>().ok())
        .ok_or_else(|| AttestationError::Malformed("complete message without attestation".into()))?;
    Ok(Some(AttestationMessage {
        message,
        attestation,
    }))
}

/// HTTP client for the Iris attestation API.
pub struct IrisClient {
    http: reqwest::Client,
    base: Url,
}

impl IrisClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    /// Client for the environment the source chain belongs to: sandbox for
    /// testnets, production otherwise.
    pub fn for_environment(testnet: bool) -> Self {
        let base = if testnet { &SANDBOX_API } else { &PRODUCTION_API };
        Self::new(Url::clone(base))
    }
}

#[async_trait]
impl AttestationClient for IrisClient {
    async fn fetch(
        &self,
        source_domain: u32,
        tx_hash: B256,
    ) -> Result<Option<AttestationMessage>, AttestationError> {
        let mut url = self
            .base
            .join(&format!("/v2/messages/{source_domain}"))
            .map_err(|e| AttestationError::Malformed(e.to_string()))?;
        url.set_query(Some(&format!("transactionHash={tx_hash}")));
        let response = self.http.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Not indexed yet; the poller will come back.
            return Ok(None);
        }
        let body: MessagesResponse = response.error_for_status()?.json().await?;
        extract(body)
    }
}
