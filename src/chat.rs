//! Chat delivery.
//!
//! Messages are always persisted before anything is pushed; the live channel
//! only shortens latency. Readers rebuild the conversation from
//! [`Api::fetch_history`], which is gated by the access guard on every call.

use crate::api::Api;
use crate::error::{AppError, Result};
use crate::models::ChatMessage;
use crate::protocol::ServerFrame;
use chrono::Utc;
use uuid::Uuid;

impl Api {
    /// Persist a message, then push it live to receiver and sender.
    pub async fn send_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<ChatMessage> {
        if text.trim().is_empty() {
            return Err(AppError::validation("Message text cannot be empty"));
        }
        self.user(sender_id).await?;
        self.user(receiver_id).await?;

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        self.store().append_message(&message).await?;

        let delivered = self.live().push(
            receiver_id,
            ServerFrame::Chat {
                message: message.clone(),
            },
        );
        self.live().push(
            sender_id,
            ServerFrame::Chat {
                message: message.clone(),
            },
        );
        tracing::debug!(
            message_id = %message.id,
            sender_id,
            receiver_id,
            delivered,
            "Chat message stored"
        );
        Ok(message)
    }

    /// The full conversation between a connected pair, oldest first.
    pub async fn fetch_history(&self, user_id: &str, other_id: &str) -> Result<Vec<ChatMessage>> {
        self.connected_pair(user_id, other_id).await?;
        let mut messages = self.store().conversation(user_id, other_id).await?;
        // Stable sort: equal timestamps keep arrival order.
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}
