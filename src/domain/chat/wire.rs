//! Wire types for chat events (WS).

use crate::shared::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `chat:message` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    #[serde(deserialize_with = "crate::shared::serde_util::string_or_number")]
    pub id: String,
    pub sender_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
