//! Per-message retry bookkeeping.
//!
//! A message moves `Submitted -> Accepted` on success. A full local buffer
//! earns one flush-and-resubmit that does not touch the attempt budget; every
//! other retryable error consumes one attempt; non-retryable errors end the
//! message immediately.

use crate::broker::SendErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Flush the client's buffer, then submit the same record again.
    FlushAndResubmit,
    /// Submit again; the attempt has been counted.
    Retry,
    /// Stop and record the message as failed.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u32,
    max_retries: u32,
    buffer_relief_used: bool,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempts: 0,
            max_retries,
            buffer_relief_used: false,
        }
    }

    /// Failed attempts counted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_error(&mut self, kind: &SendErrorKind) -> RetryDecision {
        if *kind == SendErrorKind::QueueFull && !self.buffer_relief_used {
            self.buffer_relief_used = true;
            return RetryDecision::FlushAndResubmit;
        }

        self.attempts += 1;
        if !kind.is_retryable() || self.attempts >= self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> SendErrorKind {
        SendErrorKind::Transient("leader not available".into())
    }

    #[test]
    fn zero_retries_gives_up_on_first_error() {
        let mut state = RetryState::new(0);
        assert_eq!(state.on_error(&transient()), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 1);
    }

    #[test]
    fn transient_errors_consume_the_budget() {
        let mut state = RetryState::new(3);
        assert_eq!(state.on_error(&transient()), RetryDecision::Retry);
        assert_eq!(state.on_error(&transient()), RetryDecision::Retry);
        assert_eq!(state.on_error(&transient()), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 3);
    }

    #[test]
    fn first_queue_full_is_free() {
        let mut state = RetryState::new(1);
        assert_eq!(
            state.on_error(&SendErrorKind::QueueFull),
            RetryDecision::FlushAndResubmit
        );
        assert_eq!(state.attempts(), 0);

        // the second one is an ordinary failed attempt
        assert_eq!(state.on_error(&SendErrorKind::QueueFull), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 1);
    }

    #[test]
    fn non_retryable_errors_give_up_immediately() {
        let mut state = RetryState::new(5);
        assert_eq!(state.on_error(&SendErrorKind::Closed), RetryDecision::GiveUp);

        let mut state = RetryState::new(5);
        assert_eq!(
            state.on_error(&SendErrorKind::InvalidPayload("not utf-8".into())),
            RetryDecision::GiveUp
        );
    }
}
