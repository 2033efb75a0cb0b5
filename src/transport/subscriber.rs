//! Consumer side of the WebSocket protocol: subscribe to one topic and read
//! the messages the broker pushes.

use tracing::debug;

use crate::config::BrokerSettings;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::websocket::{WsStream, open_session, read_server_message, send_frame};
use crate::utils::{LinepubError, Result};

/// A message pushed by the broker for a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: String,
    /// Unix timestamp in milliseconds assigned by the broker.
    pub timestamp: i64,
    pub message_id: String,
}

pub struct WsSubscriber {
    stream: WsStream,
    topic: String,
}

impl WsSubscriber {
    pub async fn connect(settings: &BrokerSettings, topic: &str) -> Result<Self> {
        let mut stream = open_session(settings).await?;
        let subscribe = ClientMessage::Subscribe {
            topic: topic.to_string(),
        };
        send_frame(&mut stream, &subscribe).await?;
        debug!("Subscribed to '{topic}'");

        Ok(Self {
            stream,
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next message, acknowledging it when the broker asked
    /// for at-least-once delivery. `None` once the broker closes the
    /// connection.
    pub async fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        loop {
            match read_server_message(&mut self.stream).await? {
                Some(ServerMessage::Message {
                    topic,
                    payload,
                    timestamp,
                    message_id,
                    qos,
                }) => {
                    if qos >= 1 {
                        let ack = ClientMessage::Ack {
                            message_id: message_id.clone(),
                        };
                        send_frame(&mut self.stream, &ack).await?;
                    }
                    return Ok(Some(Delivery {
                        topic,
                        payload,
                        timestamp,
                        message_id,
                    }));
                }
                Some(ServerMessage::Error { message }) => {
                    return Err(LinepubError::Protocol(message));
                }
                Some(other) => debug!("Ignoring broker frame: {other:?}"),
                None => return Ok(None),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        let unsubscribe = ClientMessage::Unsubscribe {
            topic: self.topic.clone(),
        };
        send_frame(&mut self.stream, &unsubscribe).await?;
        self.stream.close(None).await?;
        Ok(())
    }
}
