//! Chat state containers — app-owned, SDK-provided update logic.

use super::ChatMessage;
use std::collections::VecDeque;

/// Rolling chat buffer, newest first.
///
/// The app owns instances of this type. The SDK provides update methods.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    max_size: usize,
}

impl ChatLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push a new message, evicting the oldest if at capacity.
    ///
    /// A message whose id is already present is ignored.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        if self.messages.len() >= self.max_size {
            self.messages.pop_back();
        }
        self.messages.push_front(message);
        true
    }

    /// Replace all messages (e.g. from a REST fetch), newest first.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.messages.clear();
        for message in messages.into_iter().take(self.max_size) {
            self.messages.push_back(message);
        }
    }

    pub fn messages(&self) -> &VecDeque<ChatMessage> {
        &self.messages
    }

    pub fn latest(&self) -> Option<&ChatMessage> {
        self.messages.front()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::UserId;
    use chrono::Utc;

    fn msg(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender_id: UserId::from("u1"),
            sender_name: None,
            text: format!("message {id}"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_push_newest_first() {
        let mut log = ChatLog::new(10);
        log.push(msg("m1"));
        log.push(msg("m2"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.latest().unwrap().id, "m2");
    }

    #[test]
    fn test_rolling_buffer_evicts_oldest() {
        let mut log = ChatLog::new(2);
        log.push(msg("m1"));
        log.push(msg("m2"));
        log.push(msg("m3"));
        let ids: Vec<_> = log.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m3", "m2"]);
    }

    #[test]
    fn test_duplicate_id_ignored() {
        let mut log = ChatLog::new(5);
        assert!(log.push(msg("m1")));
        assert!(!log.push(msg("m1")));
        assert_eq!(log.len(), 1);
    }
}
