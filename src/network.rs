//! Network URL constants for the auction backend.

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000/ws";
