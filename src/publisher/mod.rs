//! Reliable line publisher
//!
//! Reads newline-delimited messages and hands each one to a [`BrokerClient`],
//! in input order, from a single loop:
//! - an exactly empty line ends the input; whitespace-only lines are skipped
//! - a full local buffer is relieved by one blocking flush and a resubmit
//! - other retryable errors are retried up to `max_retries` attempts
//! - every message ends up counted once, as published or failed
//!
//! Delivery reports are drained after each submission and once more after the
//! final flush. They are logged and tallied but never change the submission
//! counters.

pub mod retry;
pub mod stats;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerClient, DeliveryReports, FlushOutcome, Record};
use crate::config::PublisherSettings;
use crate::persistence::DeadLetterStore;
use crate::shutdown::Shutdown;

pub use retry::{RetryDecision, RetryState};
pub use stats::PublishStatistics;

/// Terminal state of a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Failed { attempts: u32, reason: String },
}

pub struct Publisher<B: BrokerClient> {
    broker: B,
    reports: DeliveryReports,
    topic: String,
    settings: PublisherSettings,
    dead_letters: Option<DeadLetterStore>,
    stats: PublishStatistics,
}

impl<B: BrokerClient> Publisher<B> {
    pub fn new(
        broker: B,
        reports: DeliveryReports,
        topic: impl Into<String>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            broker,
            reports,
            topic: topic.into(),
            settings,
            dead_letters: None,
            stats: PublishStatistics::new(),
        }
    }

    /// Keep a copy of every message that ends in the failed state.
    pub fn with_dead_letters(mut self, store: DeadLetterStore) -> Self {
        self.dead_letters = Some(store);
        self
    }

    /// Publishes every line of `input` and returns the final statistics.
    ///
    /// The broker handle is flushed and closed before returning, whether the
    /// input ran out, the sentinel line was read, or `shutdown` fired.
    pub async fn publish_all<R>(mut self, input: R, mut shutdown: Shutdown) -> PublishStatistics
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    self.stats.interrupted = true;
                    break;
                }
                next = lines.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read input, stopping: {e}");
                    break;
                }
            };

            if line.is_empty() {
                debug!("End-of-input marker read");
                break;
            }
            let message = line.trim();
            if message.is_empty() {
                continue;
            }

            let record = Record::new(self.topic.as_str(), message);
            self.publish_one(record, &mut shutdown).await;
            self.drain_reports();
            if shutdown.is_triggered() {
                self.stats.interrupted = true;
                break;
            }
        }

        self.finish().await
    }

    /// Drives one record to a terminal state and updates the counters.
    ///
    /// A shutdown that fires while the record waits on a retry backoff or a
    /// buffer flush ends it as failed with reason `interrupted`.
    pub async fn publish_one(&mut self, record: Record, shutdown: &mut Shutdown) -> Outcome {
        let outcome = self.submit_with_retry(record, shutdown).await;

        match &outcome {
            Outcome::Accepted => {
                let published = self.stats.record_published();
                if stats::progress_due(published, self.settings.progress_interval) {
                    info!("Published {published} messages to '{}'", self.topic);
                }
            }
            Outcome::Failed { .. } => self.stats.record_failed(),
        }
        outcome
    }

    async fn submit_with_retry(&mut self, mut record: Record, shutdown: &mut Shutdown) -> Outcome {
        let mut state = RetryState::new(self.settings.max_retries);

        loop {
            let err = match self.broker.send(record) {
                Ok(()) => return Outcome::Accepted,
                Err(err) => err,
            };
            record = err.record;

            match state.on_error(&err.kind) {
                RetryDecision::FlushAndResubmit => {
                    warn!(
                        "Local queue full ({} in flight), flushing before resubmitting",
                        self.broker.in_flight_count()
                    );
                    let flushed = tokio::select! {
                        biased;
                        _ = shutdown.wait() => None,
                        flushed = self.broker.flush(self.settings.flush_timeout()) => Some(flushed),
                    };
                    match flushed {
                        Some(FlushOutcome::Drained) => {}
                        Some(FlushOutcome::TimedOut { in_flight }) => {
                            warn!("Flush timed out with {in_flight} message(s) still in flight")
                        }
                        None => return self.interrupted(&record, state.attempts()),
                    }
                }
                RetryDecision::Retry => {
                    warn!(
                        "Submit failed (attempt {}/{}): {}",
                        state.attempts(),
                        self.settings.max_retries,
                        err.kind
                    );
                    let backoff = self.settings.retry_backoff();
                    if !backoff.is_zero() {
                        tokio::select! {
                            biased;
                            _ = shutdown.wait() => {
                                return self.interrupted(&record, state.attempts());
                            }
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
                RetryDecision::GiveUp => {
                    let reason = err.kind.to_string();
                    error!(
                        "Giving up on message after {} attempt(s): {reason}",
                        state.attempts()
                    );
                    self.dead_letter(&record, &reason, state.attempts());
                    return Outcome::Failed {
                        attempts: state.attempts(),
                        reason,
                    };
                }
            }
        }
    }

    fn interrupted(&mut self, record: &Record, attempts: u32) -> Outcome {
        warn!("Interrupted while retrying {}, counting it as failed", record.id);
        self.stats.interrupted = true;
        let reason = "interrupted".to_string();
        self.dead_letter(record, &reason, attempts);
        Outcome::Failed { attempts, reason }
    }

    fn dead_letter(&self, record: &Record, reason: &str, attempts: u32) {
        if let Some(store) = &self.dead_letters {
            if let Err(e) = store.record(&record.topic, &record.payload, reason, attempts) {
                error!("Failed to store dead letter for {}: {e}", record.id);
            }
        }
    }

    fn drain_reports(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            match &report.result {
                Ok(()) => {
                    debug!("Delivered {} to '{}'", report.record_id, report.topic);
                    self.stats.record_delivery(true);
                }
                Err(reason) => {
                    warn!(
                        "Delivery of {} to '{}' failed: {reason}",
                        report.record_id, report.topic
                    );
                    self.stats.record_delivery(false);
                }
            }
        }
    }

    async fn finish(mut self) -> PublishStatistics {
        let timeout = if self.stats.interrupted {
            self.settings.interrupt_flush_timeout()
        } else {
            self.settings.flush_timeout()
        };

        info!(
            "Flushing {} outstanding message(s) (timeout {timeout:?})",
            self.broker.in_flight_count()
        );
        match self.broker.flush(timeout).await {
            FlushOutcome::Drained => debug!("All messages acknowledged"),
            FlushOutcome::TimedOut { in_flight } => {
                warn!("Flush timed out, {in_flight} message(s) may not have been delivered")
            }
        }
        self.drain_reports();
        self.broker.close().await;
        // closing fails whatever the flush left in flight
        self.drain_reports();

        if let Some(store) = &self.dead_letters {
            if let Err(e) = store.flush() {
                error!("Failed to flush dead letter store: {e}");
            }
        }

        self.stats
    }
}
