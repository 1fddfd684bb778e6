//! Conversions from wire types to domain types for chat.

use super::wire::ChatMessageEvent;
use super::ChatMessage;

impl From<ChatMessageEvent> for ChatMessage {
    fn from(m: ChatMessageEvent) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            sender_name: m.sender_name,
            text: m.text,
            timestamp: m.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_event_conversion() {
        let json = r#"{
            "id": 17,
            "senderId": "u5",
            "text": "gl everyone",
            "timestamp": "2026-03-01T12:00:00Z"
        }"#;
        let ev: ChatMessageEvent = serde_json::from_str(json).unwrap();
        let msg: ChatMessage = ev.into();
        assert_eq!(msg.id, "17");
        assert_eq!(msg.sender_id.as_str(), "u5");
        assert!(msg.sender_name.is_none());
    }
}
