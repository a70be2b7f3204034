//! In-memory topology manager: clone-before-swap mutation under a
//! reader/writer lock, quorum-persisted to every disk in the
//! deployment, with majority-vote consensus on startup.

use crate::model::{DiskRef, PoolRecord, SetRecord, Topology};
use objectio_common::{DiskId, Error, Result, SetState};
use objectio_storage::DiskIo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const TOPOLOGY_REL_PATH: &str = "topology.json";

type ChangeCallback = Box<dyn Fn(&Topology) + Send + Sync>;

/// Owns the authoritative topology for one deployment and mediates every
/// mutation through quorum persistence.
pub struct TopologyManager {
    disks: Vec<Arc<dyn DiskIo>>,
    current: RwLock<Arc<Topology>>,
    callbacks: RwLock<Vec<ChangeCallback>>,
}

impl TopologyManager {
    /// Load `topology.json` from every disk and resolve startup
    /// consensus by content-hash majority, falling back to highest
    /// generation, per §4.6.
    pub fn load(disks: Vec<Arc<dyn DiskIo>>) -> Result<Self> {
        let candidates: Vec<Option<Topology>> = disks
            .iter()
            .map(|d| {
                d.read(Path::new(TOPOLOGY_REL_PATH))
                    .ok()
                    .and_then(|b| serde_json::from_slice::<Topology>(&b).ok())
            })
            .collect();

        let present: Vec<&Topology> = candidates.iter().filter_map(Option::as_ref).collect();
        if present.is_empty() {
            return Err(Error::NoTopologyConsensus {
                disk_count: disks.len(),
            });
        }

        let required = disks.len() / 2 + 1;
        let mut votes: HashMap<String, (usize, u64)> = HashMap::new();
        for t in &present {
            let entry = votes.entry(t.content_key()).or_insert((0, t.generation));
            entry.0 += 1;
        }

        let majority = votes
            .iter()
            .find(|(_, (count, _))| *count >= required)
            .map(|(key, _)| key.clone());

        let winning_key = match majority {
            Some(key) => key,
            None => {
                let max_gen = present.iter().map(|t| t.generation).max().unwrap();
                let at_max: Vec<&String> = votes
                    .iter()
                    .filter(|(_, (_, r#gen))| *r#gen == max_gen)
                    .map(|(key, _)| key)
                    .collect();
                if at_max.len() != 1 {
                    tracing::error!(disk_count = disks.len(), "no topology consensus among disks");
                    return Err(Error::NoTopologyConsensus {
                        disk_count: disks.len(),
                    });
                }
                tracing::warn!(generation = max_gen, "no topology majority, falling back to highest generation");
                at_max[0].clone()
            }
        };

        let topology = present
            .into_iter()
            .find(|t| t.content_key() == winning_key)
            .cloned()
            .ok_or_else(|| Error::NoTopologyConsensus {
                disk_count: disks.len(),
            })?;

        let manager = Self {
            disks,
            current: RwLock::new(Arc::new(topology)),
            callbacks: RwLock::new(Vec::new()),
        };
        manager.heal_lagging_disks(&candidates)?;
        Ok(manager)
    }

    /// Bootstrap a brand-new deployment with an empty topology.
    #[must_use]
    pub fn bootstrap(disks: Vec<Arc<dyn DiskIo>>, topology: Topology) -> Self {
        Self {
            disks,
            current: RwLock::new(Arc::new(topology)),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn current(&self) -> Arc<Topology> {
        self.current.read().clone()
    }

    pub fn on_change(&self, callback: impl Fn(&Topology) + Send + Sync + 'static) {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Clone the current topology, apply `mutate`, bump the generation,
    /// persist by quorum, then swap it in and notify subscribers.
    pub fn mutate(&self, mutate: impl FnOnce(&mut Topology)) -> Result<Arc<Topology>> {
        let mut next = (*self.current.read()).as_ref().clone();
        mutate(&mut next);
        next.generation += 1;
        let next = Arc::new(next);

        self.persist_quorum(&next)?;

        {
            let mut guard = self.current.write();
            *guard = next.clone();
        }

        tracing::info!(generation = next.generation, "topology mutated");
        for cb in self.callbacks.read().iter() {
            cb(&next);
        }

        Ok(next)
    }

    /// Add an empty pool to the topology. A no-op if the pool index is
    /// already present.
    pub fn add_pool(&self, pool_index: u32) -> Result<Arc<Topology>> {
        self.mutate(move |t| {
            if !t.pools.iter().any(|p| p.pool_index == pool_index) {
                t.pools.push(PoolRecord {
                    pool_index,
                    sets: Vec::new(),
                });
            }
        })
    }

    /// Add a new `Active` set with the given disk layout to an existing
    /// pool. A no-op if the pool doesn't exist or the set index is
    /// already present.
    pub fn add_set(&self, pool_index: u32, set_index: u32, disks: Vec<DiskRef>) -> Result<Arc<Topology>> {
        self.mutate(move |t| {
            let Some(pool) = t.pools.iter_mut().find(|p| p.pool_index == pool_index) else {
                return;
            };
            if pool.sets.iter().any(|s| s.set_index == set_index) {
                return;
            }
            pool.sets.push(SetRecord {
                set_index,
                state: SetState::Active,
                disks,
            });
        })
    }

    /// Transition a set to `Draining`: still serves reads, migration
    /// moves its objects elsewhere.
    pub fn mark_set_draining(&self, pool_index: u32, set_index: u32) -> Result<Arc<Topology>> {
        self.mutate(move |t| {
            if let Some(set) = t.find_set_mut(pool_index, set_index) {
                set.state = SetState::Draining;
            }
        })
    }

    /// Transition a set to `Removed` once migration has evacuated it;
    /// its disks are safe to decommission.
    pub fn mark_set_removed(&self, pool_index: u32, set_index: u32) -> Result<Arc<Topology>> {
        self.mutate(move |t| {
            if let Some(set) = t.find_set_mut(pool_index, set_index) {
                set.state = SetState::Removed;
            }
        })
    }

    /// Swap the disk occupying `disk_index` within a set for a new disk
    /// UUID, e.g. after a failed drive is physically replaced.
    pub fn replace_disk(
        &self,
        pool_index: u32,
        set_index: u32,
        disk_index: u32,
        new_disk_uuid: DiskId,
    ) -> Result<Arc<Topology>> {
        self.mutate(move |t| {
            let Some(set) = t.find_set_mut(pool_index, set_index) else {
                return;
            };
            if let Some(d) = set.disks.iter_mut().find(|d| d.disk_index == disk_index) {
                d.disk_uuid = new_disk_uuid;
            }
        })
    }

    fn persist_quorum(&self, topology: &Topology) -> Result<()> {
        let json = serde_json::to_vec_pretty(topology)?;
        let rel = Path::new(TOPOLOGY_REL_PATH);

        let staged: Vec<Option<std::path::PathBuf>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .disks
                .iter()
                .map(|disk| {
                    let json = &json;
                    scope.spawn(move || disk.stage(rel, json).ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let succeeded: Vec<(usize, &std::path::PathBuf)> = staged
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (i, p)))
            .collect();

        let required = self.disks.len() / 2 + 1;
        if succeeded.len() < required {
            for (i, p) in &succeeded {
                let _ = self.disks[*i].abort_stage(p);
            }
            return Err(Error::QuorumUnavailable {
                available: succeeded.len(),
                required,
            });
        }

        std::thread::scope(|scope| {
            for (i, p) in &succeeded {
                let disk = &self.disks[*i];
                scope.spawn(move || {
                    let _ = disk.commit(p, rel);
                });
            }
        });

        Ok(())
    }

    /// After startup consensus, bring any disk whose on-disk copy
    /// disagreed with the winning topology back in line.
    fn heal_lagging_disks(&self, candidates: &[Option<Topology>]) -> Result<()> {
        let winner = self.current();
        let json = serde_json::to_vec_pretty(winner.as_ref())?;
        let rel = Path::new(TOPOLOGY_REL_PATH);

        for (disk, candidate) in self.disks.iter().zip(candidates.iter()) {
            let matches = candidate
                .as_ref()
                .is_some_and(|t| t.content_key() == winner.content_key());
            if !matches {
                tracing::warn!(disk_id = %disk.disk_id(), "healing lagging disk to winning topology");
                let _ = disk.write_atomic(rel, &json);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PoolRecord, SetRecord};
    use objectio_common::{DeploymentId, DiskId, SetState};
    use objectio_storage::LocalDiskIo;

    fn disk() -> (Arc<dyn DiskIo>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let d = LocalDiskIo::new(DiskId::new(), dir.path()).unwrap();
        (Arc::new(d), dir)
    }

    #[test]
    fn test_majority_consensus_picks_majority_generation() {
        let dep = DeploymentId::new();
        let mut disks = Vec::new();
        let mut dirs = Vec::new();
        for _ in 0..5 {
            let (d, dir) = disk();
            disks.push(d);
            dirs.push(dir);
        }

        let gen5 = Topology {
            generation: 5,
            ..Topology::empty(dep)
        };
        let gen4 = Topology {
            generation: 4,
            ..Topology::empty(dep)
        };

        for disk in disks.iter().take(3) {
            disk.write_atomic(
                Path::new(TOPOLOGY_REL_PATH),
                &serde_json::to_vec(&gen5).unwrap(),
            )
            .unwrap();
        }
        for disk in disks.iter().skip(3) {
            disk.write_atomic(
                Path::new(TOPOLOGY_REL_PATH),
                &serde_json::to_vec(&gen4).unwrap(),
            )
            .unwrap();
        }

        let manager = TopologyManager::load(disks.clone()).unwrap();
        assert_eq!(manager.current().generation, 5);

        // the two lagging disks should have been healed up to generation 5
        for disk in disks.iter().skip(3) {
            let healed: Topology =
                serde_json::from_slice(&disk.read(Path::new(TOPOLOGY_REL_PATH)).unwrap()).unwrap();
            assert_eq!(healed.generation, 5);
        }
    }

    #[test]
    fn test_mutate_bumps_generation_and_notifies() {
        let dep = DeploymentId::new();
        let mut disks = Vec::new();
        let mut dirs = Vec::new();
        for _ in 0..3 {
            let (d, dir) = disk();
            disks.push(d);
            dirs.push(dir);
        }

        let manager = TopologyManager::bootstrap(disks, Topology::empty(dep));
        let notified = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let notified2 = notified.clone();
        manager.on_change(move |t| notified2.store(t.generation, std::sync::atomic::Ordering::SeqCst));

        let updated = manager
            .mutate(|t| {
                t.pools.push(PoolRecord {
                    pool_index: 0,
                    sets: vec![SetRecord {
                        set_index: 0,
                        state: SetState::Active,
                        disks: Vec::new(),
                    }],
                });
            })
            .unwrap();

        assert_eq!(updated.generation, 1);
        assert_eq!(notified.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    fn bootstrapped_manager(n_disks: usize) -> (TopologyManager, Vec<tempfile::TempDir>) {
        let dep = DeploymentId::new();
        let mut disks = Vec::new();
        let mut dirs = Vec::new();
        for _ in 0..n_disks {
            let (d, dir) = disk();
            disks.push(d);
            dirs.push(dir);
        }
        (TopologyManager::bootstrap(disks, Topology::empty(dep)), dirs)
    }

    #[test]
    fn test_add_pool_is_idempotent() {
        let (manager, _dirs) = bootstrapped_manager(3);
        let t1 = manager.add_pool(0).unwrap();
        assert_eq!(t1.pools.len(), 1);
        let t2 = manager.add_pool(0).unwrap();
        assert_eq!(t2.pools.len(), 1);
        assert_eq!(t2.generation, 2);
    }

    #[test]
    fn test_add_set_creates_active_set_in_pool() {
        let (manager, _dirs) = bootstrapped_manager(3);
        manager.add_pool(0).unwrap();
        let disks = vec![DiskRef {
            disk_uuid: DiskId::new(),
            disk_index: 0,
        }];
        let t = manager.add_set(0, 0, disks).unwrap();
        let set = &t.pools[0].sets[0];
        assert_eq!(set.set_index, 0);
        assert_eq!(set.state, SetState::Active);
    }

    #[test]
    fn test_mark_set_draining_transitions_state() {
        let (manager, _dirs) = bootstrapped_manager(3);
        manager.add_pool(0).unwrap();
        manager.add_set(0, 0, Vec::new()).unwrap();
        let t = manager.mark_set_draining(0, 0).unwrap();
        assert_eq!(t.pools[0].sets[0].state, SetState::Draining);
    }

    #[test]
    fn test_mark_set_removed_transitions_state() {
        let (manager, _dirs) = bootstrapped_manager(3);
        manager.add_pool(0).unwrap();
        manager.add_set(0, 0, Vec::new()).unwrap();
        manager.mark_set_draining(0, 0).unwrap();
        let t = manager.mark_set_removed(0, 0).unwrap();
        assert_eq!(t.pools[0].sets[0].state, SetState::Removed);
    }

    #[test]
    fn test_replace_disk_swaps_uuid_in_place() {
        let (manager, _dirs) = bootstrapped_manager(3);
        manager.add_pool(0).unwrap();
        let old_uuid = DiskId::new();
        manager
            .add_set(
                0,
                0,
                vec![DiskRef {
                    disk_uuid: old_uuid,
                    disk_index: 0,
                }],
            )
            .unwrap();

        let new_uuid = DiskId::new();
        let t = manager.replace_disk(0, 0, 0, new_uuid).unwrap();
        let disk_ref = &t.pools[0].sets[0].disks[0];
        assert_eq!(disk_ref.disk_index, 0);
        assert_eq!(disk_ref.disk_uuid, new_uuid);
        assert_ne!(disk_ref.disk_uuid, old_uuid);
    }
}
