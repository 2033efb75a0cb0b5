//! Dead-letter store backed by `sled`
//!
//! Every message that ends a run in the failed state is appended to the tree
//! of its topic. Keys are ids generated by sled, stored big endian, so a scan
//! yields dead letters in the order they failed.
//!
//! `max_per_topic` caps the size of each tree; when exceeded, the oldest
//! entries are removed after the write.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use tracing::warn;

use crate::utils::Result;

const TREE_PREFIX: &str = "dead_letters/";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub topic: String,
    pub payload: String,
    pub reason: String,
    pub attempts: u32,
    /// Unix timestamp in milliseconds.
    pub failed_at: i64,
}

#[derive(Clone)]
pub struct DeadLetterStore {
    db: Db,
    max_per_topic: Option<usize>,
}

impl DeadLetterStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str, max_per_topic: Option<usize>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db, max_per_topic })
    }

    fn tree(&self, topic: &str) -> Result<Tree> {
        Ok(self.db.open_tree(format!("{TREE_PREFIX}{topic}"))?)
    }

    /// Appends a failed message to its topic's tree.
    pub fn record(&self, topic: &str, payload: &[u8], reason: &str, attempts: u32) -> Result<()> {
        let letter = DeadLetter {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            reason: reason.to_string(),
            attempts,
            failed_at: Utc::now().timestamp_millis(),
        };
        let serialized = serde_json::to_vec(&letter)?;

        let tree = self.tree(topic)?;
        let key = self.db.generate_id()?;
        tree.insert(key.to_be_bytes(), serialized)?;

        if let Some(max) = self.max_per_topic {
            let excess = tree.len().saturating_sub(max);
            if excess > 0 {
                let oldest: Vec<_> = tree
                    .iter()
                    .keys()
                    .take(excess)
                    .filter_map(|key| key.ok())
                    .collect();
                for key in oldest {
                    tree.remove(key)?;
                }
            }
        }

        Ok(())
    }

    /// Dead letters for `topic`, oldest first.
    pub fn load(&self, topic: &str) -> Result<Vec<DeadLetter>> {
        let tree = self.tree(topic)?;
        let letters = tree
            .iter()
            .values()
            .filter_map(|val| val.ok())
            .filter_map(|val| match serde_json::from_slice(&val) {
                Ok(letter) => Some(letter),
                Err(e) => {
                    warn!("Skipping unreadable dead letter in '{topic}': {e}");
                    None
                }
            })
            .collect();
        Ok(letters)
    }

    pub fn count(&self, topic: &str) -> Result<usize> {
        Ok(self.tree(topic)?.len())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for DeadLetterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetterStore")
            .field("db", &"sled::Db")
            .field("max_per_topic", &self.max_per_topic)
            .finish()
    }
}
