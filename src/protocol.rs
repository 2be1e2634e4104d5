// src/protocol.rs
use crate::models::ChatMessage;
use serde::{Deserialize, Serialize};

/// Frames a subscriber sends over the live channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "auth")]
    Auth {
        #[serde(rename = "userId")]
        user_id: String,
    },
    #[serde(rename = "chat")]
    Chat {
        #[serde(rename = "senderId", default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
        #[serde(rename = "receiverId")]
        receiver_id: String,
        text: String,
    },
}

/// Frames the server pushes over the live channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "chat")]
    Chat { message: ChatMessage },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_parse_auth_frame() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "auth", "userId": "u1"})).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Auth {
                user_id: "u1".into()
            }
        );
    }

    #[test]
    fn test_parse_chat_frame_with_and_without_sender() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "chat",
            "senderId": "a",
            "receiverId": "b",
            "text": "hey"
        }))
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Chat {
                sender_id: Some("a".into()),
                receiver_id: "b".into(),
                text: "hey".into()
            }
        );

        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "chat", "receiverId": "b", "text": "yo"}))
                .unwrap();
        assert!(matches!(frame, ClientFrame::Chat { sender_id: None, .. }));
    }

    #[test]
    fn test_unknown_frame_type_is_rejected() {
        let result = serde_json::from_value::<ClientFrame>(json!({"type": "typing"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_server_chat_frame_shape() {
        let frame = ServerFrame::Chat {
            message: ChatMessage {
                id: "m1".into(),
                sender_id: "a".into(),
                receiver_id: "b".into(),
                text: "Hello".into(),
                timestamp: Utc::now(),
            },
        };
        let value: serde_json::Value = serde_json::from_str(&frame.to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "chat");
        assert_eq!(value["message"]["senderId"], "a");
        assert_eq!(value["message"]["text"], "Hello");
    }

    #[test]
    fn test_server_error_frame_shape() {
        let value = serde_json::to_value(ServerFrame::error("Authenticate first")).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "Authenticate first"}));
    }
}
