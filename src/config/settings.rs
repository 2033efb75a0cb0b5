use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the broker connection, the target topic, the
/// publishing loop and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub topic: TopicSettings,
    pub publisher: PublisherSettings,
    pub log: LogSettings,
}

/// Which broker client implementation to use.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    WebSocket,
    Kafka,
}

/// Connection settings for the broker.
///
/// `brokers` is a WebSocket URL for the `websocket` backend and a
/// comma-separated bootstrap list for the `kafka` backend.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub backend: Backend,
    pub brokers: String,
    pub username: String,
    pub password: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Maximum number of records buffered locally without an acknowledgement.
    pub queue_capacity: usize,
}

impl BrokerSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// The topic records are published to, and how to create it when missing.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TopicSettings {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
    pub create_if_missing: bool,
}

/// Tuning for the publishing loop.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PublisherSettings {
    pub max_retries: u32,
    pub flush_timeout_ms: u64,
    pub interrupt_flush_timeout_ms: u64,
    /// Log progress every N published messages; 0 disables progress logging.
    pub progress_interval: u64,
    pub retry_backoff_ms: u64,
    pub dead_letter_path: Option<String>,
    pub dead_letter_max_per_topic: Option<usize>,
}

impl PublisherSettings {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn interrupt_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.interrupt_flush_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub topic: Option<PartialTopicSettings>,
    pub publisher: Option<PartialPublisherSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub backend: Option<Backend>,
    pub brokers: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialTopicSettings {
    pub name: Option<String>,
    pub partitions: Option<u32>,
    pub replication_factor: Option<u32>,
    pub create_if_missing: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialPublisherSettings {
    pub max_retries: Option<u32>,
    pub flush_timeout_ms: Option<u64>,
    pub interrupt_flush_timeout_ms: Option<u64>,
    pub progress_interval: Option<u64>,
    pub retry_backoff_ms: Option<u64>,
    pub dead_letter_path: Option<String>,
    pub dead_letter_max_per_topic: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Merges the partial values over `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let broker = self.broker.unwrap_or_default();
        let topic = self.topic.unwrap_or_default();
        let publisher = self.publisher.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            broker: BrokerSettings {
                backend: broker.backend.unwrap_or(defaults.broker.backend),
                brokers: broker.brokers.unwrap_or(defaults.broker.brokers),
                username: broker.username.unwrap_or(defaults.broker.username),
                password: broker.password.unwrap_or(defaults.broker.password),
                connect_timeout_ms: broker
                    .connect_timeout_ms
                    .unwrap_or(defaults.broker.connect_timeout_ms),
                request_timeout_ms: broker
                    .request_timeout_ms
                    .unwrap_or(defaults.broker.request_timeout_ms),
                queue_capacity: broker
                    .queue_capacity
                    .unwrap_or(defaults.broker.queue_capacity),
            },
            topic: TopicSettings {
                name: topic.name.unwrap_or(defaults.topic.name),
                partitions: topic.partitions.unwrap_or(defaults.topic.partitions),
                replication_factor: topic
                    .replication_factor
                    .unwrap_or(defaults.topic.replication_factor),
                create_if_missing: topic
                    .create_if_missing
                    .unwrap_or(defaults.topic.create_if_missing),
            },
            publisher: PublisherSettings {
                max_retries: publisher
                    .max_retries
                    .unwrap_or(defaults.publisher.max_retries),
                flush_timeout_ms: publisher
                    .flush_timeout_ms
                    .unwrap_or(defaults.publisher.flush_timeout_ms),
                interrupt_flush_timeout_ms: publisher
                    .interrupt_flush_timeout_ms
                    .unwrap_or(defaults.publisher.interrupt_flush_timeout_ms),
                progress_interval: publisher
                    .progress_interval
                    .unwrap_or(defaults.publisher.progress_interval),
                retry_backoff_ms: publisher
                    .retry_backoff_ms
                    .unwrap_or(defaults.publisher.retry_backoff_ms),
                dead_letter_path: publisher
                    .dead_letter_path
                    .or(defaults.publisher.dead_letter_path),
                dead_letter_max_per_topic: publisher
                    .dead_letter_max_per_topic
                    .or(defaults.publisher.dead_letter_max_per_topic),
            },
            log: LogSettings {
                level: log.level.unwrap_or(defaults.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// The application runs against a local broker on the default port with no
/// configuration file at all.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                backend: Backend::WebSocket,
                brokers: "ws://127.0.0.1:8080".to_string(),
                username: "admin".to_string(),
                password: "password".to_string(),
                connect_timeout_ms: 10_000,
                request_timeout_ms: 30_000,
                queue_capacity: 100_000,
            },
            topic: TopicSettings {
                name: "orders".to_string(),
                partitions: 1,
                replication_factor: 1,
                create_if_missing: true,
            },
            publisher: PublisherSettings {
                max_retries: 3,
                flush_timeout_ms: 30_000,
                interrupt_flush_timeout_ms: 5_000,
                progress_interval: 100,
                retry_backoff_ms: 0,
                dead_letter_path: None,
                dead_letter_max_per_topic: None,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
