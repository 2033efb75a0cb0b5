use serde::{Deserialize, Serialize};

/// Frames sent by this client to the broker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "login")]
    Login { username: String, password: String },
    #[serde(rename = "auth")]
    Auth { token: String },
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },
    #[serde(rename = "publish")]
    Publish {
        topic: String,
        payload: String,
        message_id: Option<String>,
        qos: Option<u8>,
    },
    #[serde(rename = "ack")]
    Ack { message_id: String },
    #[serde(rename = "describe_topic")]
    DescribeTopic { topic: String },
    #[serde(rename = "create_topic")]
    CreateTopic {
        topic: String,
        partitions: u32,
        replication_factor: u32,
    },
}

/// Frames received from the broker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "login_response")]
    LoginResponse { token: String },
    #[serde(rename = "authenticated")]
    Authenticated {},
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
        message_id: String,
        qos: u8,
    },
    #[serde(rename = "publish_ack")]
    PublishAck { message_id: String },
    #[serde(rename = "publish_rejected")]
    PublishRejected { message_id: String, reason: String },
    #[serde(rename = "topic_metadata")]
    TopicMetadata {
        topic: String,
        exists: bool,
        partitions: Option<u32>,
    },
    #[serde(rename = "topic_created")]
    TopicCreated { topic: String },
}

impl ServerMessage {
    /// Replies to `describe_topic` / `create_topic` requests.
    pub fn is_admin_reply(&self) -> bool {
        matches!(
            self,
            ServerMessage::TopicMetadata { .. }
                | ServerMessage::TopicCreated { .. }
                | ServerMessage::Error { .. }
        )
    }
}
