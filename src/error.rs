//! Unified SDK error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Bid error: {0}")]
    Bid(#[from] BidError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timeout")]
    Timeout,

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Failures while establishing the persistent connection.
///
/// Recovered by the reconnect loop up to the attempt ceiling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Handshake timed out after {0}ms")]
    Timeout(u64),

    #[error("Handshake rejected: {0}")]
    AuthRejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("No credential available")]
    MissingCredential,
}

/// WebSocket errors after the connection is established.
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

/// A subscribe/unsubscribe request the server refused or could not handle.
///
/// Logged only; the next resubscribe-all covers it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Subscription error on {topic:?}: {message}")]
pub struct SubscribeError {
    pub topic: Option<String>,
    pub message: String,
}

/// Errors surfaced to the caller of an optimistic bid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BidError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Auction {0} is not in the local view")]
    UnknownAuction(String),

    #[error("Auction is not in progress")]
    AuctionNotActive,

    #[error("You already hold the highest bid")]
    AlreadyHighestBidder,

    #[error("Bid {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    #[error("Price moved before the bid landed: {0}")]
    StalePrice(String),

    #[error("Network failure: {0}")]
    Network(String),
}

impl From<HttpError> for BidError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Conflict(body) => BidError::StalePrice(body),
            HttpError::Unauthorized => BidError::NotAuthenticated,
            other => BidError::Network(other.to_string()),
        }
    }
}

impl From<SdkError> for BidError {
    fn from(e: SdkError) -> Self {
        match e {
            SdkError::Bid(b) => b,
            SdkError::Http(h) => h.into(),
            other => BidError::Network(other.to_string()),
        }
    }
}

/// Error returned by a subscription handler. Caught and logged by dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Receiver dropped")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_stale_price() {
        let err: BidError = HttpError::Conflict("current price is 120".into()).into();
        assert_eq!(err, BidError::StalePrice("current price is 120".into()));
    }

    #[test]
    fn test_server_error_maps_to_network() {
        let err: BidError = HttpError::ServerError {
            status: 503,
            body: "unavailable".into(),
        }
        .into();
        assert!(matches!(err, BidError::Network(_)));
    }

    #[test]
    fn test_sdk_error_unwraps_bid_error() {
        let err: BidError = SdkError::Bid(BidError::AuctionNotActive).into();
        assert_eq!(err, BidError::AuctionNotActive);
    }
}
