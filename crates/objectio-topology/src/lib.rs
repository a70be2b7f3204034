//! ObjectIO Topology - deployment-wide pool/set/disk model and the
//! manager that mediates changes to it.
//!
//! The topology is held in memory behind a reader/writer lock and
//! mutated by clone-before-swap: a writer clones the current value,
//! mutates the clone, persists it to every disk in the deployment by
//! majority quorum, then swaps it in. Readers never observe a torn
//! value. On startup, disagreeing copies of `topology.json` are
//! resolved by content-hash majority vote, falling back to highest
//! generation, per the deployment's consensus rule.

pub mod manager;
pub mod model;

pub use manager::TopologyManager;
pub use model::{DiskRef, FormatFile, PoolRecord, SetRecord, Topology, TOPOLOGY_SCHEMA_VERSION};
