//! The `transport` module holds the concrete broker clients.
//!
//! It defines the JSON protocol spoken with a WebSocket pub/sub broker and
//! implements a producer (`BrokerClient` + `TopicAdmin`) and a subscriber on
//! top of it. With the `kafka` feature a Kafka producer is available too.

pub mod message;
pub mod subscriber;
pub mod websocket;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use subscriber::{Delivery, WsSubscriber};
pub use websocket::WsProducer;

#[cfg(feature = "kafka")]
pub use kafka::KafkaProducer;
