//! Chat domain — messages pushed on the `chat` topic.

mod convert;
pub mod state;
pub mod wire;

use crate::shared::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use state::ChatLog;

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: UserId,
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
