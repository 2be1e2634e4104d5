use crate::models::ChatMessage;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

/// HTTP client for the chat routes of a trainer-hub server
#[derive(Clone)]
pub struct ChatApiClient {
    client: reqwest::Client,
    base_url: Arc<str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender_id: &'a str,
    receiver_id: &'a str,
    text: &'a str,
}

impl ChatApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The live-channel URL on the same host.
    pub fn live_url(&self) -> String {
        let base = &*self.base_url;
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws", ws_base)
    }

    /// Fetch the conversation between `user_id` and `other_id`
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, user_id: &str, other_id: &str) -> Result<Vec<ChatMessage>> {
        let url = format!("{}/api/chat/{}/{}", self.base_url, user_id, other_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send history request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read body".to_string());
            anyhow::bail!("History failed with status {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse history response")
    }

    /// Send a message through the request/response route
    #[tracing::instrument(skip(self, text))]
    pub async fn send(&self, sender_id: &str, receiver_id: &str, text: &str) -> Result<ChatMessage> {
        let url = format!("{}/api/chat", self.base_url);
        let req = SendRequest {
            sender_id,
            receiver_id,
            text,
        };

        let response = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("Failed to send chat message")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read body".to_string());
            anyhow::bail!("Send failed with status {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse sent message")
    }
}
