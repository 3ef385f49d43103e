//! Conversation history storage
//!
//! Keeps the messages of one room in arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::Memory;

/// Conversation history for a single room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub room_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: VecDeque<Memory>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(room_id: Uuid, capacity: usize) -> Self {
        Self {
            room_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, dropping the oldest one once full.
    ///
    /// A message already present (same id) is not stored twice.
    pub fn add_message(&mut self, message: Memory) {
        if self.messages.iter().any(|m| m.id == message.id) {
            return;
        }

        if self.capacity > 0 && self.messages.len() == self.capacity {
            self.messages.pop_front();
        }

        self.messages.push_back(message);
        self.updated_at = Utc::now();
    }

    /// The `count` most recent messages, oldest first.
    pub fn recent_messages(&self, count: usize) -> Vec<Memory> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Render messages for an LLM prompt
    pub fn format_messages(messages: &[Memory], agent_id: Uuid, agent_name: &str) -> String {
        let mut context = String::new();

        for msg in messages {
            let speaker = if msg.user_id == agent_id {
                agent_name.to_string()
            } else {
                format!("User {}", &msg.user_id.to_string()[..8])
            };

            context.push_str(&format!(
                "({}) {}: {}",
                msg.created_at.format("%H:%M:%S"),
                speaker,
                msg.content.text
            ));

            if let Some(action) = &msg.content.action {
                context.push_str(&format!(" ({})", action));
            }

            context.push('\n');
        }

        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Content;

    #[test]
    fn test_history_is_bounded() {
        let room_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut history = ConversationHistory::new(room_id, 3);

        for i in 0..5 {
            history.add_message(Memory::new(user_id, room_id, Content::text(format!("m{}", i))));
        }

        assert_eq!(history.message_count(), 3);
        let recent = history.recent_messages(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content.text, "m3");
        assert_eq!(recent[1].content.text, "m4");
    }

    #[test]
    fn test_duplicate_message_ignored() {
        let room_id = Uuid::new_v4();
        let message = Memory::new(Uuid::new_v4(), room_id, Content::text("hello"));
        let mut history = ConversationHistory::new(room_id, 10);

        history.add_message(message.clone());
        history.add_message(message);

        assert_eq!(history.message_count(), 1);
    }

    #[test]
    fn test_format_messages_names_agent() {
        let room_id = Uuid::new_v4();
        let agent_id = Uuid::new_v4();
        let mut reply = Memory::new(agent_id, room_id, Content::text("Sure, I'll verify the data."));
        reply.content.action = Some("VERIFY".to_string());

        let formatted = ConversationHistory::format_messages(&[reply], agent_id, "attps");
        assert!(formatted.contains("attps: Sure, I'll verify the data. (VERIFY)"));
    }
}
