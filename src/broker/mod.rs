//! Broker collaborator contracts.
//!
//! The publisher never talks to a network directly. It submits [`Record`]s
//! through a [`BrokerClient`], learns about delivery through
//! [`DeliveryReport`]s arriving on a channel, and checks the target topic via
//! [`TopicAdmin`] before the first record is sent. Concrete clients live in
//! `transport`.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::utils::AdminError;

/// One message on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Correlates the record with its [`DeliveryReport`].
    pub id: String,
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Asynchronous outcome of a record that was accepted by [`BrokerClient::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub record_id: String,
    pub topic: String,
    pub result: Result<(), String>,
}

pub type DeliveryReports = mpsc::UnboundedReceiver<DeliveryReport>;
pub type DeliveryReportSender = mpsc::UnboundedSender<DeliveryReport>;

/// Why a submission was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendErrorKind {
    /// The local outbound buffer has no room; a flush makes room.
    #[error("local outbound queue is full")]
    QueueFull,

    #[error("transient submission error: {0}")]
    Transient(String),

    #[error("producer is closed")]
    Closed,

    #[error("payload rejected: {0}")]
    InvalidPayload(String),
}

impl SendErrorKind {
    /// Whether submitting the same record again can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendErrorKind::QueueFull | SendErrorKind::Transient(_))
    }
}

/// A refused submission. The record is handed back so it can be resubmitted
/// without copying.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct SendError {
    pub kind: SendErrorKind,
    pub record: Record,
}

impl SendError {
    pub fn new(kind: SendErrorKind, record: Record) -> Self {
        Self { kind, record }
    }
}

/// Result of a bounded flush. A timeout is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Drained,
    TimedOut { in_flight: usize },
}

/// An open, internally buffered connection to the broker.
pub trait BrokerClient {
    /// Queues `record` for delivery without waiting for the network.
    fn send(&self, record: Record) -> Result<(), SendError>;

    /// Waits until every queued record is acknowledged or `timeout` elapses.
    fn flush(&self, timeout: Duration) -> impl Future<Output = FlushOutcome> + Send;

    /// Records queued or awaiting acknowledgement.
    fn in_flight_count(&self) -> usize;

    /// Releases the connection. Records still in flight are abandoned.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Partitioning requested when a topic has to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
}

impl From<&crate::config::TopicSettings> for TopicSpec {
    fn from(settings: &crate::config::TopicSettings) -> Self {
        Self {
            name: settings.name.clone(),
            partitions: settings.partitions,
            replication_factor: settings.replication_factor,
        }
    }
}

pub trait TopicAdmin {
    fn topic_exists(&self, topic: &str) -> impl Future<Output = Result<bool, AdminError>> + Send;

    fn create_topic(&self, spec: &TopicSpec)
    -> impl Future<Output = Result<(), AdminError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStatus {
    Existing,
    Created,
}

/// Makes sure `spec.name` exists before publishing starts.
pub async fn ensure_topic<A: TopicAdmin>(
    admin: &A,
    spec: &TopicSpec,
    create_if_missing: bool,
) -> Result<TopicStatus, AdminError> {
    if admin.topic_exists(&spec.name).await? {
        return Ok(TopicStatus::Existing);
    }
    if !create_if_missing {
        return Err(AdminError::MissingTopic(spec.name.clone()));
    }

    admin.create_topic(spec).await?;
    info!(
        "Created topic '{}' with {} partition(s), replication factor {}",
        spec.name, spec.partitions, spec.replication_factor
    );
    Ok(TopicStatus::Created)
}
