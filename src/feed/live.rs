use crate::models::ChatMessage;
use crate::protocol::{ClientFrame, ServerFrame};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Receiving half of a live-channel subscription. Chat frames are forwarded
/// from a background reader task; the channel ends when the socket does.
pub struct LiveChannel {
    inbox: mpsc::UnboundedReceiver<ChatMessage>,
    reader: JoinHandle<()>,
}

impl LiveChannel {
    /// Connect to `url` and authenticate as `user_id`.
    pub async fn subscribe(url: &str, user_id: &str) -> Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to live channel at {}", url))?;
        let (mut sink, mut stream) = socket.split();

        let auth = serde_json::to_string(&ClientFrame::Auth {
            user_id: user_id.to_string(),
        })?;
        sink.send(Message::Text(auth.into()))
            .await
            .context("Failed to authenticate on live channel")?;

        let (tx, inbox) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            // Keep the write half open for the lifetime of the reader.
            let _sink = sink;
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!("Live channel read failed: {}", e);
                        break;
                    }
                };
                match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(ServerFrame::Chat { message }) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Ok(ServerFrame::Error { message }) => {
                        tracing::warn!("Live channel reported: {}", message);
                    }
                    Err(e) => tracing::debug!("Ignoring unparseable live frame: {}", e),
                }
            }
        });

        Ok(Self { inbox, reader })
    }

    /// Next pushed message, or `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.inbox.recv().await
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
