//! The `error` module defines the error types used within `linepub`.
//!
//! Only setup-time failures are represented here. Per-message submission
//! problems are ordinary values (`SendError`, `DeliveryReport`) handled
//! inside the publishing loop and never surface as a `LinepubError`.

use std::time::Duration;

use thiserror::Error;

/// Fatal errors that abort a run before or around the publishing loop.
#[derive(Debug, Error)]
pub enum LinepubError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to connect to broker at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    #[error("timed out after {timeout:?} connecting to broker at {url}")]
    ConnectTimeout { url: String, timeout: Duration },

    #[error("broker rejected credentials: {0}")]
    Auth(String),

    #[error("broker protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("dead letter store error: {0}")]
    Store(#[from] sled::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "kafka")]
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

impl From<tungstenite::Error> for LinepubError {
    fn from(err: tungstenite::Error) -> Self {
        LinepubError::Protocol(err.to_string())
    }
}

/// Errors returned by topic administration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("topic '{0}' does not exist")]
    MissingTopic(String),

    #[error("broker rejected request for topic '{topic}': {reason}")]
    Rejected { topic: String, reason: String },

    #[error("admin request timed out after {0:?}")]
    Timeout(Duration),

    #[error("broker connection closed")]
    Disconnected,

    #[error("unexpected admin reply: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, LinepubError>;
