//! Durable progress checkpoint for a migration job.

use crate::task::MigrationTask;
use objectio_common::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MigrationCounters {
    pub scanned: u64,
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
    pub bytes: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job_id: uuid::Uuid,
    pub generation_from: u64,
    pub generation_to: u64,
    pub counters: MigrationCounters,
    pub remaining: Vec<MigrationTask>,
}

impl Checkpoint {
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let tmp = parent.join(format!(
            ".tmp.{}.{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&serde_json::to_vec_pretty(self)?)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
        metrics::counter!("objectio_migration_checkpoints_written_total").increment(1);
        metrics::gauge!("objectio_migration_scanned").set(self.counters.scanned as f64);
        metrics::gauge!("objectio_migration_queued").set(self.counters.queued as f64);
        metrics::gauge!("objectio_migration_completed").set(self.counters.completed as f64);
        metrics::gauge!("objectio_migration_failed").set(self.counters.failed as f64);
        metrics::gauge!("objectio_migration_bytes_moved").set(self.counters.bytes as f64);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Persist every `interval_objects` completed tasks or every
/// `interval` of wall time, whichever comes first.
pub struct CheckpointPolicy {
    pub interval_objects: u64,
    pub interval: std::time::Duration,
    last_completed_count: std::sync::atomic::AtomicU64,
    last_write: parking_lot::Mutex<std::time::Instant>,
}

impl CheckpointPolicy {
    #[must_use]
    pub fn new(interval_objects: u64, interval: std::time::Duration) -> Self {
        Self {
            interval_objects,
            interval,
            last_completed_count: std::sync::atomic::AtomicU64::new(0),
            last_write: parking_lot::Mutex::new(std::time::Instant::now()),
        }
    }

    /// Returns `true` and resets internal bookkeeping if a checkpoint is
    /// due given `completed_count` tasks finished so far.
    pub fn due(&self, completed_count: u64) -> bool {
        let since_last = completed_count.saturating_sub(
            self.last_completed_count.load(std::sync::atomic::Ordering::Relaxed),
        );
        let mut last_write = self.last_write.lock();
        let time_due = last_write.elapsed() >= self.interval;
        if since_last >= self.interval_objects || time_due {
            self.last_completed_count
                .store(completed_count, std::sync::atomic::Ordering::Relaxed);
            *last_write = std::time::Instant::now();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("checkpoint.json");
        let ckpt = Checkpoint {
            job_id: uuid::Uuid::new_v4(),
            generation_from: 7,
            generation_to: 8,
            counters: MigrationCounters {
                scanned: 10,
                queued: 10,
                completed: 5,
                failed: 0,
                bytes: 4096,
            },
            remaining: vec![MigrationTask::new(
                "b".into(),
                "k".into(),
                100,
                "pool0/set0".into(),
                "pool0/set2".into(),
            )],
        };
        ckpt.write_atomic(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded.counters.completed, 5);
        assert_eq!(loaded.remaining.len(), 1);
    }

    #[test]
    fn test_policy_fires_on_object_count() {
        let policy = CheckpointPolicy::new(10, std::time::Duration::from_secs(3600));
        assert!(!policy.due(5));
        assert!(policy.due(10));
    }
}
