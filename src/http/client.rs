//! Low-level HTTP client — `AuctionHttp`.
//!
//! One method per REST endpoint. Returns wire types; conversion to domain
//! types happens in the high-level client.

use crate::auth::CredentialStore;
use crate::domain::auction::wire::{
    AuctionResponse, AuctionsResponse, CreateAuctionRequest, MyBidsResponse, PlaceBidRequest,
};
use crate::error::HttpError;
use crate::http::retry::RetryPolicy;
use crate::shared::AuctionId;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Low-level HTTP client for the auction REST API.
#[derive(Clone)]
pub struct AuctionHttp {
    base_url: String,
    client: Client,
    credentials: CredentialStore,
}

impl AuctionHttp {
    pub fn new(base_url: &str, credentials: CredentialStore) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    // ── Auctions ─────────────────────────────────────────────────────────

    pub async fn get_active_auctions(&self) -> Result<AuctionsResponse, HttpError> {
        let url = format!("{}/api/auctions/active", self.base_url);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    pub async fn get_auction(&self, id: &AuctionId) -> Result<AuctionResponse, HttpError> {
        let url = format!("{}/api/auctions/{}", self.base_url, id);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    pub async fn create_auction(
        &self,
        request: &CreateAuctionRequest,
    ) -> Result<AuctionResponse, HttpError> {
        let url = format!("{}/api/auctions", self.base_url);
        self.post(&url, request, RetryPolicy::None).await
    }

    // ── Bids ─────────────────────────────────────────────────────────────

    /// Place a bid. Returns the auction as the server sees it afterwards.
    ///
    /// A `409` means the price moved under the bid.
    pub async fn place_bid(
        &self,
        id: &AuctionId,
        amount: Decimal,
    ) -> Result<AuctionResponse, HttpError> {
        let url = format!("{}/api/auctions/{}/bids", self.base_url, id);
        self.post(&url, &PlaceBidRequest { amount }, RetryPolicy::None)
            .await
    }

    pub async fn get_my_bids(&self) -> Result<MyBidsResponse, HttpError> {
        let url = format!("{}/api/bids/me", self.base_url);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    // ── Internal HTTP methods ────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        self.request_with_retry(reqwest::Method::GET, url, None::<&()>, retry)
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        self.request_with_retry(reqwest::Method::POST, url, Some(body), retry)
            .await
    }

    async fn request_with_retry<T: DeserializeOwned, B: Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        let Some(config) = retry.config() else {
            return self.do_request(&method, url, body).await;
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.do_request::<T, B>(&method, url, body).await {
                Ok(resp) => return Ok(resp),
                Err(e) if config.should_retry(&e) && attempt < config.max_retries => {
                    let delay = match &e {
                        HttpError::RateLimited {
                            retry_after_ms: Some(ms),
                        } => Duration::from_millis(*ms),
                        _ => config.delay_for_attempt(attempt),
                    };
                    tracing::debug!(
                        attempt = attempt + 1,
                        max = config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request to {}",
                        url
                    );
                    futures_timer::Delay::new(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(HttpError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &reqwest::Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, HttpError> {
        let mut req = self.client.request(method.clone(), url);

        if let Some(credential) = self.credentials.current().await {
            req = req.bearer_auth(credential.bearer());
        }

        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status.is_success() {
            let parsed = resp.json::<T>().await?;
            return Ok(parsed);
        }

        let retry_after_ms = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let status_code = status.as_u16();
        let body_text = resp.text().await.unwrap_or_default();

        Err(status_error(status_code, body_text, retry_after_ms))
    }
}

/// Map a non-success status to an error.
fn status_error(status: u16, body: String, retry_after_ms: Option<u64>) -> HttpError {
    match status {
        401 => HttpError::Unauthorized,
        404 => HttpError::NotFound(body),
        408 => HttpError::Timeout,
        409 => HttpError::Conflict(body),
        429 => HttpError::RateLimited { retry_after_ms },
        400..=499 => HttpError::BadRequest(body),
        _ => HttpError::ServerError { status, body },
    }
}

/// `Retry-After` in whole seconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|s| s * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, String::new(), None), HttpError::Unauthorized));
        assert!(matches!(status_error(409, "moved".into(), None), HttpError::Conflict(b) if b == "moved"));
        assert!(matches!(
            status_error(429, String::new(), Some(2000)),
            HttpError::RateLimited { retry_after_ms: Some(2000) }
        ));
        assert!(matches!(status_error(422, String::new(), None), HttpError::BadRequest(_)));
        assert!(matches!(
            status_error(503, String::new(), None),
            HttpError::ServerError { status: 503, .. }
        ));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("3"), Some(3000));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let http = AuctionHttp::new("http://localhost:3000/", CredentialStore::default()).unwrap();
        assert_eq!(http.base_url(), "http://localhost:3000");
    }
}
