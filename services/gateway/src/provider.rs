//! Ledger provider client
//!
//! The provider is an external black box that streams confirmed ledger
//! events and accepts signed transactions. Calls are bounded by a timeout
//! and retried with exponential backoff, but only for failures classified
//! as `ServiceUnavailable`; everything else is returned to the caller at
//! once.

use async_trait::async_trait;
use indexer::{ChainPoint, LedgerEvent};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use types::errors::{Classify, ErrorClass};
use types::ids::TxId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider unreachable: {0}")]
    Unavailable(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid provider response: {0}")]
    Decode(String),
}

impl Classify for ProviderError {
    fn class(&self) -> ErrorClass {
        match self {
            ProviderError::Unavailable(_) | ProviderError::Timeout(_) => ErrorClass::ServiceUnavailable,
            ProviderError::Rejected { .. } => ErrorClass::ValidationFailure,
            ProviderError::Decode(_) => ErrorClass::Internal,
        }
    }
}

#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// Confirmed events strictly after `cursor`, in block order
    async fn events_after(&self, cursor: Option<ChainPoint>) -> Result<Vec<LedgerEvent>, ProviderError>;

    /// Submit a signed transaction given as hex-encoded CBOR
    async fn submit(&self, signed_tx: &str) -> Result<TxId, ProviderError>;
}

/// Retry budget for provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based retries)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Run `call` under the policy's timeout, retrying retryable failures
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(policy.timeout)),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.class().is_retryable() && attempt < policy.retries => {
                attempt += 1;
                let delay = policy.delay(attempt);
                warn!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Provider call failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    cbor: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReply {
    tx_id: TxId,
}

/// Provider reached over HTTP
///
/// - `GET {base}/events?slot=&height=&index=` returns a JSON array of events
/// - `POST {base}/tx/submit` takes `{"cbor": hex}` and returns `{"txId": hex}`
pub struct HttpLedgerProvider {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpLedgerProvider {
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Unavailable(format!("{}: {}", status, message)));
        }
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_events(&self, cursor: Option<ChainPoint>) -> Result<Vec<LedgerEvent>, ProviderError> {
        let mut request = self.client.get(format!("{}/events", self.base_url));
        if let Some(point) = cursor {
            request = request.query(&[
                ("slot", point.slot.to_string()),
                ("height", point.block_height.to_string()),
                ("index", point.tx_index.to_string()),
            ]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Self::check(response)
            .await?
            .json::<Vec<LedgerEvent>>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn post_tx(&self, signed_tx: &str) -> Result<TxId, ProviderError> {
        let response = self
            .client
            .post(format!("{}/tx/submit", self.base_url))
            .json(&SubmitBody { cbor: signed_tx })
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let reply = Self::check(response)
            .await?
            .json::<SubmitReply>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(reply.tx_id)
    }
}

#[async_trait]
impl LedgerProvider for HttpLedgerProvider {
    async fn events_after(&self, cursor: Option<ChainPoint>) -> Result<Vec<LedgerEvent>, ProviderError> {
        let events = with_retry(&self.policy, "events", move || self.fetch_events(cursor)).await?;
        debug!(count = events.len(), "Events fetched");
        Ok(events)
    }

    async fn submit(&self, signed_tx: &str) -> Result<TxId, ProviderError> {
        with_retry(&self.policy, "submit", move || self.post_tx(signed_tx)).await
    }
}
