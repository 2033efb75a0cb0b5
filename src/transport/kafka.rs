//! Kafka transport (feature `kafka`)
//!
//! `KafkaProducer` wraps an rdkafka `ThreadedProducer`: librdkafka batches and
//! sends in its own threads and a background poll thread runs the delivery
//! callback, which is turned into a `DeliveryReport` here. The record id
//! travels with each message as its delivery opaque.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::ClientConfig;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::{ClientContext, DefaultClientContext};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::broker::{
    BrokerClient, DeliveryReport, DeliveryReportSender, DeliveryReports, FlushOutcome, Record,
    SendError, SendErrorKind, TopicAdmin, TopicSpec,
};
use crate::config::BrokerSettings;
use crate::utils::{AdminError, Result};

/// Producer context forwarding delivery callbacks to a channel.
pub struct ReportingContext {
    reports: DeliveryReportSender,
}

impl ClientContext for ReportingContext {}

impl ProducerContext for ReportingContext {
    type DeliveryOpaque = Box<String>;

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, record_id: Self::DeliveryOpaque) {
        let report = match delivery_result {
            Ok(message) => DeliveryReport {
                record_id: *record_id,
                topic: message.topic().to_string(),
                result: Ok(()),
            },
            Err((err, message)) => DeliveryReport {
                record_id: *record_id,
                topic: message.topic().to_string(),
                result: Err(err.to_string()),
            },
        };
        let _ = self.reports.send(report);
    }
}

pub struct KafkaProducer {
    producer: Arc<ThreadedProducer<ReportingContext>>,
    admin: Arc<AdminClient<DefaultClientContext>>,
    request_timeout: Duration,
}

fn client_config(settings: &BrokerSettings) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &settings.brokers)
        .set("client.id", "linepub")
        .set(
            "queue.buffering.max.messages",
            settings.queue_capacity.to_string(),
        )
        .set("socket.timeout.ms", settings.connect_timeout_ms.to_string());
    config
}

impl KafkaProducer {
    /// Creates the producer and admin clients and fetches cluster metadata
    /// once, so an unreachable cluster fails here rather than mid-run.
    pub async fn connect(settings: &BrokerSettings) -> Result<(Self, DeliveryReports)> {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let config = client_config(settings);

        let producer: ThreadedProducer<ReportingContext> =
            config.create_with_context(ReportingContext { reports: report_tx })?;
        let admin: AdminClient<DefaultClientContext> = config.create()?;
        let producer = Arc::new(producer);

        let probe = producer.clone();
        let timeout = settings.connect_timeout();
        let metadata =
            tokio::task::spawn_blocking(move || probe.client().fetch_metadata(None, timeout))
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))??;
        info!(
            "Connected to Kafka cluster at {} ({} broker(s))",
            settings.brokers,
            metadata.brokers().len()
        );

        let client = Self {
            producer,
            admin: Arc::new(admin),
            request_timeout: settings.request_timeout(),
        };
        Ok((client, report_rx))
    }
}

/// Classifies a failed `send` the way the publisher's retry policy expects.
fn send_error_kind(err: &KafkaError) -> SendErrorKind {
    match err {
        KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => SendErrorKind::QueueFull,
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge) => {
            SendErrorKind::InvalidPayload("message too large".into())
        }
        other => SendErrorKind::Transient(other.to_string()),
    }
}

impl BrokerClient for KafkaProducer {
    fn send(&self, record: Record) -> std::result::Result<(), SendError> {
        let result = {
            let base = BaseRecord::<(), [u8], _>::with_opaque_to(
                &record.topic,
                Box::new(record.id.clone()),
            )
            .payload(&record.payload[..]);
            self.producer.send(base).map_err(|(err, _)| err)
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) => Err(SendError::new(send_error_kind(&err), record)),
        }
    }

    async fn flush(&self, timeout: Duration) -> FlushOutcome {
        let producer = self.producer.clone();
        let flushed = tokio::task::spawn_blocking(move || producer.flush(timeout)).await;
        match flushed {
            Ok(Ok(())) => FlushOutcome::Drained,
            Ok(Err(e)) => {
                warn!("Flush did not complete: {e}");
                FlushOutcome::TimedOut {
                    in_flight: self.in_flight_count(),
                }
            }
            Err(e) => {
                warn!("Flush task failed: {e}");
                FlushOutcome::TimedOut {
                    in_flight: self.in_flight_count(),
                }
            }
        }
    }

    fn in_flight_count(&self) -> usize {
        self.producer.in_flight_count().max(0) as usize
    }

    async fn close(&self) {
        // librdkafka tears the connection down when the last handle drops
        if self.in_flight_count() > 0 {
            warn!(
                "Closing Kafka producer with {} message(s) in flight",
                self.in_flight_count()
            );
        }
    }
}

impl TopicAdmin for KafkaProducer {
    async fn topic_exists(&self, topic: &str) -> std::result::Result<bool, AdminError> {
        let admin = self.admin.clone();
        let name = topic.to_string();
        let timeout = self.request_timeout;

        let metadata = tokio::task::spawn_blocking(move || {
            admin.inner().fetch_metadata(Some(name.as_str()), timeout)
        })
        .await
        .map_err(|e| AdminError::Protocol(e.to_string()))?
        .map_err(|e| AdminError::Rejected {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

        Ok(metadata
            .topics()
            .iter()
            .any(|t| t.name() == topic && t.error().is_none()))
    }

    async fn create_topic(&self, spec: &TopicSpec) -> std::result::Result<(), AdminError> {
        let new_topic = NewTopic::new(
            &spec.name,
            spec.partitions as i32,
            TopicReplication::Fixed(spec.replication_factor as i32),
        );
        let opts = AdminOptions::new()
            .operation_timeout(Some(self.request_timeout))
            .request_timeout(Some(self.request_timeout));

        let results = self
            .admin
            .create_topics(&[new_topic], &opts)
            .await
            .map_err(|e| AdminError::Rejected {
                topic: spec.name.clone(),
                reason: e.to_string(),
            })?;

        for result in results {
            match result {
                Ok(_) => {}
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    info!("Topic {topic} already exists, continuing");
                }
                Err((topic, code)) => {
                    return Err(AdminError::Rejected {
                        topic,
                        reason: code.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_maps_to_queue_full() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull);
        assert_eq!(send_error_kind(&err), SendErrorKind::QueueFull);
        assert!(send_error_kind(&err).is_retryable());
    }

    #[test]
    fn oversized_message_is_not_retried() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge);
        let kind = send_error_kind(&err);
        assert_eq!(kind, SendErrorKind::InvalidPayload("message too large".into()));
        assert!(!kind.is_retryable());
    }

    #[test]
    fn other_errors_are_transient() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::UnknownTopicOrPartition);
        assert!(matches!(send_error_kind(&err), SendErrorKind::Transient(_)));
        assert!(matches!(
            send_error_kind(&KafkaError::Canceled),
            SendErrorKind::Transient(_)
        ));
    }

    #[test]
    fn client_config_carries_broker_settings() {
        let mut settings = crate::config::Settings::default().broker;
        settings.brokers = "kafka-1:9092,kafka-2:9092".to_string();
        settings.queue_capacity = 500;
        settings.connect_timeout_ms = 2_500;

        let config = client_config(&settings);
        assert_eq!(
            config.get("bootstrap.servers"),
            Some("kafka-1:9092,kafka-2:9092")
        );
        assert_eq!(config.get("client.id"), Some("linepub"));
        assert_eq!(config.get("queue.buffering.max.messages"), Some("500"));
        assert_eq!(config.get("socket.timeout.ms"), Some("2500"));
    }
}
