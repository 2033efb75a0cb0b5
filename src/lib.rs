//! # linepub
//!
//! `linepub` reads newline-delimited messages and publishes them to a
//! message broker, one at a time and in input order, with bounded retries,
//! relief for a full local send buffer, and a success/failure summary.
//!
//! ## Core Modules
//!
//! - `publisher`: the publishing loop, its retry state machine and statistics.
//! - `broker`: the client and topic-administration traits a broker must implement.
//! - `transport`: concrete brokers (a WebSocket pub/sub broker, and Kafka
//!   behind the `kafka` feature).
//! - `persistence`: an optional sled-backed dead-letter store for messages
//!   that could not be published.
//! - `generator`: synthetic order records for feeding the publisher.
//! - `shutdown`: interrupt handling.
//! - `config`: layered configuration loading.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod generator;
pub mod persistence;
pub mod publisher;
pub mod shutdown;
pub mod transport;
pub mod utils;
