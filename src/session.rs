// src/session.rs
use crate::api::Api;
use crate::error::AppError;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::registry::{Registration, LIVE_OUTBOX_CAPACITY};
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One open live-channel socket. Frames for this socket arrive on the outbox,
/// either as replies or as pushes routed through the registry.
pub struct LiveSession {
    api: Arc<Api>,
    outbox: mpsc::Sender<ServerFrame>,
    registration: Option<Registration>,
}

/// Run a live session on an upgraded socket until either side closes.
pub async fn serve(socket: WebSocket, api: Arc<Api>) {
    let (outbox, inbox) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
    let session = LiveSession {
        api,
        outbox,
        registration: None,
    };
    session.run(socket, inbox).await;
}

impl LiveSession {
    pub fn user_id(&self) -> Option<&str> {
        self.registration.as_ref().map(|r| r.user_id())
    }

    async fn handle_auth(&mut self, user_id: String) -> Option<ServerFrame> {
        match self.api.user(&user_id).await {
            Ok(_) => {
                self.registration = Some(self.api.live().register(&user_id, self.outbox.clone()));
                None
            }
            Err(e) => {
                tracing::debug!("Live auth refused for {}: {}", user_id, e);
                Some(ServerFrame::error(e.public_message()))
            }
        }
    }

    async fn handle_chat(
        &self,
        claimed_sender: Option<String>,
        receiver_id: String,
        text: String,
    ) -> Option<ServerFrame> {
        let Some(user_id) = self.user_id() else {
            return Some(ServerFrame::error("Authenticate first"));
        };
        if claimed_sender.as_deref().is_some_and(|s| s != user_id) {
            tracing::debug!(user_id, "Ignoring senderId that differs from the authenticated user");
        }

        // The sender's copy comes back through the registry like any other push.
        match self.api.send_message(user_id, &receiver_id, &text).await {
            Ok(_) => None,
            Err(e) => {
                if let AppError::Upstream(_) = &e {
                    tracing::error!("Live chat send failed: {:#}", e);
                }
                Some(ServerFrame::error(e.public_message()))
            }
        }
    }

    /// Handle one text frame; returns a reply for this socket, if any.
    pub async fn handle_text(&mut self, text: &str) -> Option<ServerFrame> {
        match serde_json::from_str::<ClientFrame>(text) {
            Ok(ClientFrame::Auth { user_id }) => self.handle_auth(user_id).await,
            Ok(ClientFrame::Chat {
                sender_id,
                receiver_id,
                text,
            }) => self.handle_chat(sender_id, receiver_id, text).await,
            Err(e) => {
                tracing::debug!("Unparseable live frame: {}", e);
                Some(ServerFrame::error("Invalid frame"))
            }
        }
    }

    async fn run(mut self, socket: WebSocket, mut inbox: mpsc::Receiver<ServerFrame>) {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                frame = inbox.recv() => {
                    let Some(frame) = frame else { break };
                    if let Err(e) = send_frame(&mut sink, &frame).await {
                        tracing::debug!("Live channel write failed: {:#}", e);
                        break;
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = self.handle_text(text.as_str()).await {
                                if let Err(e) = send_frame(&mut sink, &reply).await {
                                    tracing::debug!("Live channel write failed: {:#}", e);
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!("Live channel read failed: {}", e);
                            break;
                        }
                        _ => {} // pings, pongs, binary
                    }
                }
            }
        }

        tracing::info!(user_id = ?self.user_id(), "Live channel closed");
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> anyhow::Result<()> {
    let text = frame.to_text()?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NewAccount;
    use crate::hire::Decision;
    use crate::models::{Role, User};
    use crate::registry::ConnectionRegistry;
    use crate::store::JsonFileStore;
    use tempfile::TempDir;

    async fn api(dir: &TempDir) -> Arc<Api> {
        let store = JsonFileStore::open(dir.path().join("db.json")).await.unwrap();
        Arc::new(Api::new(
            Arc::new(store),
            Arc::new(ConnectionRegistry::new()),
            4,
        ))
    }

    async fn register(api: &Api, email: &str, role: Role) -> User {
        api.register(NewAccount {
            email: email.into(),
            name: "Someone".into(),
            role,
            password: "pw".into(),
        })
        .await
        .unwrap()
    }

    fn session(api: Arc<Api>) -> (LiveSession, mpsc::Receiver<ServerFrame>) {
        let (outbox, inbox) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
        (
            LiveSession {
                api,
                outbox,
                registration: None,
            },
            inbox,
        )
    }

    #[tokio::test]
    async fn test_chat_before_auth_is_refused() {
        let dir = TempDir::new().unwrap();
        let (mut session, _inbox) = session(api(&dir).await);

        let reply = session
            .handle_text(r#"{"type":"chat","receiverId":"x","text":"hi"}"#)
            .await;
        assert_eq!(reply, Some(ServerFrame::error("Authenticate first")));
    }

    #[tokio::test]
    async fn test_auth_unknown_user_is_refused() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        let (mut session, _inbox) = session(api.clone());

        let reply = session
            .handle_text(r#"{"type":"auth","userId":"ghost"}"#)
            .await;
        assert!(matches!(reply, Some(ServerFrame::Error { .. })));
        assert!(api.online_users().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_frame_gets_error_reply() {
        let dir = TempDir::new().unwrap();
        let (mut session, _inbox) = session(api(&dir).await);

        let reply = session.handle_text("not json").await;
        assert_eq!(reply, Some(ServerFrame::error("Invalid frame")));
    }

    #[tokio::test]
    async fn test_auth_then_chat_uses_authenticated_sender() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        let client = register(&api, "c@example.com", Role::Client).await;
        let trainer = register(&api, "t@example.com", Role::Trainer).await;
        let (_, request) = api.request_hire(&client.id, &trainer.id).await.unwrap();
        api.respond_to_request(&request.id, Decision::Accepted, None)
            .await
            .unwrap();

        let (mut session, mut inbox) = session(api.clone());
        let auth = format!(r#"{{"type":"auth","userId":"{}"}}"#, client.id);
        assert_eq!(session.handle_text(&auth).await, None);
        assert_eq!(session.user_id(), Some(client.id.as_str()));

        let chat = format!(
            r#"{{"type":"chat","senderId":"spoofed","receiverId":"{}","text":"Hello"}}"#,
            trainer.id
        );
        assert_eq!(session.handle_text(&chat).await, None);

        match inbox.recv().await.unwrap() {
            ServerFrame::Chat { message } => {
                assert_eq!(message.sender_id, client.id);
                assert_eq!(message.text, "Hello");
            }
            other => panic!("unexpected frame {:?}", other),
        }

        drop(session);
        assert!(api.online_users().is_empty());
    }
}
