//! Consumer side of a conversation.
//!
//! A [`ChatFeed`] keeps one conversation up to date from two sources: pushes
//! on the live channel, and periodic history polls. The live channel is
//! optional; when it cannot be opened or drops, the feed keeps working from
//! polls alone.

mod live;
mod rest;
mod timeline;

pub use live::LiveChannel;
pub use rest::ChatApiClient;
pub use timeline::ChatTimeline;

use crate::models::ChatMessage;
use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A message that could not be sent. The text is handed back so the caller
/// can restore its input.
#[derive(Debug, thiserror::Error)]
#[error("failed to send message: {cause:#}")]
pub struct SendError {
    pub text: String,
    cause: anyhow::Error,
}

impl SendError {
    pub fn into_text(self) -> String {
        self.text
    }
}

/// What woke a [`ChatFeed::tick`].
enum Wake {
    Live(Option<ChatMessage>),
    Poll,
}

pub struct ChatFeed {
    api: ChatApiClient,
    user_id: String,
    other_id: String,
    timeline: ChatTimeline,
    live: Option<LiveChannel>,
    poll_interval: Duration,
    next_poll: Instant,
}

impl ChatFeed {
    /// Load the conversation and try to subscribe at `live_url`. History
    /// errors are returned; a failed subscription only costs latency.
    pub async fn open(
        api: ChatApiClient,
        live_url: &str,
        user_id: &str,
        other_id: &str,
    ) -> Result<Self> {
        Self::open_with_interval(api, live_url, user_id, other_id, DEFAULT_POLL_INTERVAL).await
    }

    pub async fn open_with_interval(
        api: ChatApiClient,
        live_url: &str,
        user_id: &str,
        other_id: &str,
        poll_interval: Duration,
    ) -> Result<Self> {
        let mut timeline = ChatTimeline::new();
        timeline.merge(api.history(user_id, other_id).await?);

        let live = match LiveChannel::subscribe(live_url, user_id).await {
            Ok(live) => Some(live),
            Err(e) => {
                tracing::warn!("Live channel unavailable, polling only: {:#}", e);
                None
            }
        };

        Ok(Self {
            api,
            user_id: user_id.to_string(),
            other_id: other_id.to_string(),
            timeline,
            live,
            poll_interval,
            next_poll: Instant::now() + poll_interval,
        })
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.timeline.messages()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Wait for the next live message or poll deadline, whichever comes
    /// first, and fold the result in. Returns how many messages were new.
    pub async fn tick(&mut self) -> Result<usize> {
        let wake = match self.live.as_mut() {
            Some(live) => tokio::select! {
                msg = live.recv() => Wake::Live(msg),
                _ = tokio::time::sleep_until(self.next_poll) => Wake::Poll,
            },
            None => {
                tokio::time::sleep_until(self.next_poll).await;
                Wake::Poll
            }
        };

        match wake {
            Wake::Live(Some(message)) => {
                if message.is_between(&self.user_id, &self.other_id) {
                    Ok(usize::from(self.timeline.insert(message)))
                } else {
                    Ok(0)
                }
            }
            Wake::Live(None) => {
                tracing::warn!("Live channel closed, falling back to polling");
                self.live = None;
                Ok(0)
            }
            Wake::Poll => self.poll().await,
        }
    }

    /// Re-fetch history now and merge it in.
    pub async fn poll(&mut self) -> Result<usize> {
        self.next_poll = Instant::now() + self.poll_interval;
        let history = self.api.history(&self.user_id, &self.other_id).await?;
        Ok(self.timeline.merge(history))
    }

    /// Send `text` to the other party. On failure the text comes back inside
    /// the error.
    pub async fn send(&mut self, text: String) -> Result<ChatMessage, SendError> {
        match self.api.send(&self.user_id, &self.other_id, &text).await {
            Ok(message) => {
                self.timeline.insert(message.clone());
                Ok(message)
            }
            Err(cause) => Err(SendError { text, cause }),
        }
    }
}
