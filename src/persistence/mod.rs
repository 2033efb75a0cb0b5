//! The `persistence` module keeps copies of messages that could not be
//! submitted, so a failed run can be inspected or replayed later.
//!
//! It uses `sled` as an embedded key-value store, one tree per topic.

pub mod dead_letter;

pub use dead_letter::{DeadLetter, DeadLetterStore};

#[cfg(test)]
mod tests;
