//! Topology data model: pools of sets of disks, plus the per-disk
//! format record written once at provisioning time.

use objectio_common::{DeploymentId, DiskId, SetState};
use serde::{Deserialize, Serialize};

/// One disk's slot within a set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRef {
    pub disk_uuid: DiskId,
    pub disk_index: u32,
}

/// A fixed-width group of disks sharing one erasure shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetRecord {
    pub set_index: u32,
    pub state: SetState,
    pub disks: Vec<DiskRef>,
}

impl SetRecord {
    /// The ring identity used by `objectio-placement`: stable across
    /// disk replacement, since it names the set rather than a disk.
    #[must_use]
    pub fn ring_key(&self, pool_index: u32) -> String {
        format!("pool{pool_index}/set{}", self.set_index)
    }
}

/// A homogeneous group of sets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolRecord {
    pub pool_index: u32,
    pub sets: Vec<SetRecord>,
}

/// The authoritative deployment-wide topology, persisted to every disk's
/// `topology.json` and bumped with a new `generation` on every mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Topology {
    pub version: u32,
    pub deployment_id: DeploymentId,
    pub generation: u64,
    pub pools: Vec<PoolRecord>,
}

pub const TOPOLOGY_SCHEMA_VERSION: u32 = 1;

impl Topology {
    #[must_use]
    pub fn empty(deployment_id: DeploymentId) -> Self {
        Self {
            version: TOPOLOGY_SCHEMA_VERSION,
            deployment_id,
            generation: 0,
            pools: Vec::new(),
        }
    }

    /// Content used for startup consensus voting: disks bucket candidate
    /// topologies by content hash (xxhash-64) so two copies with identical
    /// fields vote together regardless of field order.
    #[must_use]
    pub fn content_key(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{:016x}", objectio_common::xxh64_seed(0, json.as_bytes()))
    }

    #[must_use]
    pub fn all_sets(&self) -> Vec<(&PoolRecord, &SetRecord)> {
        self.pools
            .iter()
            .flat_map(|p| p.sets.iter().map(move |s| (p, s)))
            .collect()
    }

    pub fn find_set_mut(&mut self, pool_index: u32, set_index: u32) -> Option<&mut SetRecord> {
        self.pools
            .iter_mut()
            .find(|p| p.pool_index == pool_index)?
            .sets
            .iter_mut()
            .find(|s| s.set_index == set_index)
    }
}

/// Per-disk record written once at provisioning (`format.json`), never
/// mutated afterward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormatFile {
    pub version: u32,
    pub deployment_id: DeploymentId,
    pub set_count: u32,
    pub disks_per_set: u32,
    pub sets: Vec<Vec<DiskId>>,
    pub this_disk: DiskId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_key_stable_across_disk_replacement() {
        let set = SetRecord {
            set_index: 2,
            state: SetState::Active,
            disks: vec![DiskRef {
                disk_uuid: DiskId::new(),
                disk_index: 0,
            }],
        };
        let key_before = set.ring_key(1);
        let mut set2 = set.clone();
        set2.disks[0].disk_uuid = DiskId::new();
        assert_eq!(key_before, set2.ring_key(1));
    }
}
