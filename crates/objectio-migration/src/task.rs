//! A single object's move from one set to another.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationTask {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub old_set: String,
    pub new_set: String,
    pub attempts: u32,
}

impl MigrationTask {
    #[must_use]
    pub fn new(bucket: String, key: String, size: u64, old_set: String, new_set: String) -> Self {
        Self {
            bucket,
            key,
            size,
            old_set,
            new_set,
            attempts: 0,
        }
    }
}

/// Backoff schedule for retried tasks: 100ms, 500ms, 2500ms, then give up.
pub const RETRY_BACKOFF_MS: [u64; 3] = [100, 500, 2500];
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
