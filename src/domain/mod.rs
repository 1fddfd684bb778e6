//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs` — Domain types
//! - `wire.rs` — Raw serde structs matching REST responses and WS payloads
//! - `convert.rs` — `From` conversions from wire to domain
//! - `state.rs` — Caches with merge methods (for WS-driven data)
//! - `client.rs` — Sub-client with HTTP methods, where the domain has REST endpoints

pub mod auction;
pub mod chat;
