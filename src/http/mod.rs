//! HTTP client layer — `AuctionHttp` with per-endpoint retry policies.

pub mod client;
pub mod retry;

pub use client::AuctionHttp;
pub use retry::{RetryConfig, RetryPolicy};
