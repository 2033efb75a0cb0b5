use std::fmt;

/// Counters owned by the publishing loop for the duration of one run.
///
/// `published` and `failed` describe submission outcomes: a message is
/// `published` as soon as the broker client accepts it. `delivered` and
/// `delivery_failed` tally the delivery reports that arrived before the run
/// ended, so the gap between `published` and `delivered` is visible in the
/// summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishStatistics {
    pub published: u64,
    pub failed: u64,
    pub delivered: u64,
    pub delivery_failed: u64,
    pub interrupted: bool,
}

impl PublishStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an accepted submission and returns the new published count.
    pub fn record_published(&mut self) -> u64 {
        self.published += 1;
        self.published
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn record_delivery(&mut self, ok: bool) {
        if ok {
            self.delivered += 1;
        } else {
            self.delivery_failed += 1;
        }
    }

    pub fn processed(&self) -> u64 {
        self.published + self.failed
    }

    /// Percentage of processed messages that were published, or `None` when
    /// nothing was processed.
    pub fn success_rate(&self) -> Option<f64> {
        match self.processed() {
            0 => None,
            total => Some(self.published as f64 / total as f64 * 100.0),
        }
    }
}

/// Whether reaching `published` messages should emit a progress event.
pub fn progress_due(published: u64, interval: u64) -> bool {
    interval > 0 && published > 0 && published % interval == 0
}

impl fmt::Display for PublishStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "published={} failed={} ", self.published, self.failed)?;
        match self.success_rate() {
            Some(rate) => write!(f, "success_rate={rate:.1}%")?,
            None => write!(f, "success_rate=n/a (no messages)")?,
        }
        write!(
            f,
            " delivered={} delivery_failed={}",
            self.delivered, self.delivery_failed
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}
