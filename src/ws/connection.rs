//! Connection lifecycle state machine and reconnect backoff.
//!
//! Transport-agnostic: the native client drives it from its background task
//! and sleeps for whatever delay it hands back.

use std::time::Duration;

use super::ConnectionState;

// ─── Disconnect reasons ──────────────────────────────────────────────────────

/// Why the transport went away.
///
/// `as_str` yields the socket-level reason strings the server side uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Local, deliberate close. Never reconnects.
    ClientDisconnect,
    /// The server closed the connection.
    ServerDisconnect,
    /// The underlying stream ended.
    TransportClose,
    /// Read or write on the stream failed.
    TransportError,
    /// No pong within the pong timeout.
    PingTimeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::ClientDisconnect => "io client disconnect",
            DisconnectReason::ServerDisconnect => "io server disconnect",
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::PingTimeout => "ping timeout",
        }
    }

    /// Map a reason string from a server `disconnect` frame.
    ///
    /// Anything unrecognized is treated as a server-side disconnect.
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "io client disconnect" => DisconnectReason::ClientDisconnect,
            "transport close" => DisconnectReason::TransportClose,
            "transport error" => DisconnectReason::TransportError,
            "ping timeout" => DisconnectReason::PingTimeout,
            _ => DisconnectReason::ServerDisconnect,
        }
    }

    pub fn is_deliberate(&self) -> bool {
        matches!(self, DisconnectReason::ClientDisconnect)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Backoff ─────────────────────────────────────────────────────────────────

/// Bounded exponential backoff for reconnect attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            factor: 1.5,
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * factor^attempt, max)`, rounded down to whole milliseconds.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.base_delay_ms as f64 * self.factor.powi(exp);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped.floor() as u64)
    }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// What the connection task should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Sleep for `delay`, then run the handshake again.
    Retry { attempt: u32, delay: Duration },
    /// Deliberate close, reconnect disabled, or first connect failed.
    Stop,
    /// Retry budget exhausted.
    GiveUp,
}

/// Owns `ConnectionState` and the reconnect attempt counter.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycle {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempt: u32,
}

impl ConnectionLifecycle {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempt: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// `Disconnected → Connecting` on initialize, `Reconnecting → Connecting` on retry.
    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Handshake acknowledged.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempt = 0;
    }

    /// A handshake attempt failed.
    ///
    /// The very first `initialize` fails fast to its caller; failures during
    /// a reconnect cycle consume the retry budget.
    pub fn on_connect_failed(&mut self) -> ReconnectDecision {
        if self.attempt == 0 {
            self.state = ConnectionState::Disconnected;
            return ReconnectDecision::Stop;
        }
        self.schedule_retry()
    }

    /// An established transport was lost.
    pub fn on_transport_lost(&mut self, reason: DisconnectReason) -> ReconnectDecision {
        if reason.is_deliberate() || !self.policy.enabled {
            self.state = ConnectionState::Disconnected;
            return ReconnectDecision::Stop;
        }
        self.schedule_retry()
    }

    /// Manual restart after the caller noticed `Disconnected`.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.state = ConnectionState::Disconnected;
    }

    fn schedule_retry(&mut self) -> ReconnectDecision {
        self.attempt += 1;
        if self.attempt > self.policy.max_attempts {
            self.state = ConnectionState::Disconnected;
            return ReconnectDecision::GiveUp;
        }
        self.state = ConnectionState::Reconnecting;
        ReconnectDecision::Retry {
            attempt: self.attempt,
            delay: self.policy.delay_for_attempt(self.attempt),
        }
    }
}
