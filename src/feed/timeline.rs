use crate::models::ChatMessage;
use std::collections::HashSet;

/// A conversation as the consumer displays it: deduplicated by message id
/// and ordered by timestamp, with arrival order breaking ties.
#[derive(Debug, Default)]
pub struct ChatTimeline {
    messages: Vec<ChatMessage>,
    seen: HashSet<String>,
}

impl ChatTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge messages in, skipping ids already present. Returns how many
    /// were new.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = ChatMessage>) -> usize {
        let before = self.messages.len();
        for message in incoming {
            if self.seen.insert(message.id.clone()) {
                self.messages.push(message);
            }
        }
        let added = self.messages.len() - before;
        if added > 0 {
            self.messages.sort_by_key(|m| m.timestamp);
        }
        added
    }

    pub fn insert(&mut self, message: ChatMessage) -> bool {
        self.merge(std::iter::once(message)) == 1
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
