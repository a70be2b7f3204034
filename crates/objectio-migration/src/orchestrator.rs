//! Worker pool, retry policy, and job-level orchestration for one
//! migration from `generation_from` to `generation_to`.

use crate::checkpoint::{Checkpoint, CheckpointPolicy, MigrationCounters};
use crate::state::MigrationState;
use crate::task::{MigrationTask, RETRY_BACKOFF_MS, RETRY_MAX_ATTEMPTS};
use crate::throttle::TokenBucket;
use objectio_common::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A worker's move-one-object step: read from the task's source set,
/// write to the destination set, update the registry, delete from the
/// source. Supplied by the caller so this crate stays independent of
/// how sets and the registry are wired together.
pub trait MigrationExecutor: Send + Sync {
    /// Move the object named by `task` and return its byte size.
    fn move_object(&self, task: &MigrationTask) -> Result<u64>;
}

pub struct MigrationOrchestrator {
    pub job_id: uuid::Uuid,
    pub generation_from: u64,
    pub generation_to: u64,
    worker_count: usize,
    queue_capacity: usize,
    checkpoint_path: PathBuf,
    checkpoint_policy: CheckpointPolicy,
    state: RwLock<MigrationState>,
    counters: Mutex<MigrationCounters>,
    stop: AtomicBool,
    pub throttle: Arc<TokenBucket>,
}

impl MigrationOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generation_from: u64,
        generation_to: u64,
        worker_count: usize,
        queue_capacity: usize,
        checkpoint_path: PathBuf,
        throttle_rate_bps: u64,
        throttle_burst_bytes: u64,
        checkpoint_interval_objects: u64,
        checkpoint_interval: Duration,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4(),
            generation_from,
            generation_to,
            worker_count: worker_count.max(1),
            queue_capacity: queue_capacity.max(1),
            checkpoint_path,
            checkpoint_policy: CheckpointPolicy::new(checkpoint_interval_objects, checkpoint_interval),
            state: RwLock::new(MigrationState::Idle),
            counters: Mutex::new(MigrationCounters::default()),
            stop: AtomicBool::new(false),
            throttle: Arc::new(TokenBucket::new(throttle_rate_bps, throttle_burst_bytes)),
        }
    }

    #[must_use]
    pub fn state(&self) -> MigrationState {
        *self.state.read()
    }

    #[must_use]
    pub fn counters(&self) -> MigrationCounters {
        self.counters.lock().clone()
    }

    /// Cooperative cancellation: observed at each worker iteration and
    /// between queue pops. In-flight moves complete before exiting.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Resume a previously checkpointed job from disk.
    pub fn resume_from_checkpoint(
        checkpoint_path: PathBuf,
        worker_count: usize,
        queue_capacity: usize,
        throttle_rate_bps: u64,
        throttle_burst_bytes: u64,
        checkpoint_interval_objects: u64,
        checkpoint_interval: Duration,
    ) -> Result<(Self, Vec<MigrationTask>)> {
        let ckpt = Checkpoint::load(&checkpoint_path)?;
        let orchestrator = Self {
            job_id: ckpt.job_id,
            generation_from: ckpt.generation_from,
            generation_to: ckpt.generation_to,
            worker_count: worker_count.max(1),
            queue_capacity: queue_capacity.max(1),
            checkpoint_path,
            checkpoint_policy: CheckpointPolicy::new(checkpoint_interval_objects, checkpoint_interval),
            state: RwLock::new(MigrationState::Migrating),
            counters: Mutex::new(ckpt.counters.clone()),
            stop: AtomicBool::new(false),
            throttle: Arc::new(TokenBucket::new(throttle_rate_bps, throttle_burst_bytes)),
        };
        Ok((orchestrator, ckpt.remaining))
    }

    /// Run the worker pool over `tasks` to completion (or until
    /// [`Self::stop`] is observed), retrying each with exponential
    /// backoff, and set the terminal state according to the job's
    /// failure policy.
    pub fn run(&self, tasks: Vec<MigrationTask>, executor: Arc<dyn MigrationExecutor>) -> Result<()> {
        *self.state.write() = MigrationState::Migrating;
        self.counters.lock().queued = tasks.len() as u64;

        let (tx, rx) = crossbeam_channel::bounded::<MigrationTask>(self.queue_capacity);
        let total = tasks.len().max(1) as f64;

        std::thread::scope(|scope| {
            for t in tasks {
                if tx.send(t).is_err() {
                    break;
                }
            }
            drop(tx);

            let handles: Vec<_> = (0..self.worker_count)
                .map(|_| {
                    let rx = rx.clone();
                    let executor = executor.clone();
                    scope.spawn(move || {
                        while let Ok(mut task) = rx.recv() {
                            if self.stop.load(Ordering::SeqCst) {
                                break;
                            }
                            self.run_one(&mut task, executor.as_ref());
                            self.maybe_checkpoint(&rx);
                        }
                    })
                })
                .collect();
            for h in handles {
                let _ = h.join();
            }
        });

        let counters = self.counters();
        let failure_ratio = counters.failed as f64 / total;
        let final_state = if failure_ratio >= 0.10 {
            MigrationState::Failed
        } else {
            MigrationState::Complete
        };
        *self.state.write() = final_state;
        tracing::info!(
            job_id = %self.job_id,
            completed = counters.completed,
            failed = counters.failed,
            state = %final_state,
            "migration run finished"
        );

        if final_state == MigrationState::Failed {
            return Err(Error::internal(format!(
                "migration job {} failed: {} of {} tasks permanently failed",
                self.job_id, counters.failed, counters.queued
            )));
        }
        Ok(())
    }

    fn run_one(&self, task: &mut MigrationTask, executor: &dyn MigrationExecutor) {
        loop {
            self.throttle.acquire(task.size);
            match executor.move_object(task) {
                Ok(bytes) => {
                    let mut c = self.counters.lock();
                    c.completed += 1;
                    c.bytes += bytes;
                    metrics::counter!("objectio_migration_tasks_completed_total").increment(1);
                    metrics::counter!("objectio_migration_bytes_moved_total").increment(bytes);
                    return;
                }
                Err(e) if task.attempts < RETRY_MAX_ATTEMPTS && e.is_retryable() => {
                    let delay = RETRY_BACKOFF_MS[task.attempts as usize];
                    tracing::warn!(
                        bucket = %task.bucket,
                        key = %task.key,
                        attempt = task.attempts,
                        delay_ms = delay,
                        error = %e,
                        "migration task failed, retrying"
                    );
                    metrics::counter!("objectio_migration_task_retries_total").increment(1);
                    task.attempts += 1;
                    std::thread::sleep(Duration::from_millis(delay));
                }
                Err(e) => {
                    tracing::error!(bucket = %task.bucket, key = %task.key, error = %e, "migration task permanently failed");
                    self.counters.lock().failed += 1;
                    metrics::counter!("objectio_migration_tasks_failed_total").increment(1);
                    return;
                }
            }
        }
    }

    fn maybe_checkpoint(&self, rx: &crossbeam_channel::Receiver<MigrationTask>) {
        let counters = self.counters();
        if !self.checkpoint_policy.due(counters.completed) {
            return;
        }
        let remaining: Vec<MigrationTask> = rx.try_iter().collect();
        let ckpt = Checkpoint {
            job_id: self.job_id,
            generation_from: self.generation_from,
            generation_to: self.generation_to,
            counters,
            remaining,
        };
        let _ = ckpt.write_atomic(&self.checkpoint_path);
    }
}
