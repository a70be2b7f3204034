//! ObjectIO Storage - per-set disk I/O and quorum write/read protocol
//!
//! An object set is `N = K + M` disks sharing one erasure shape. Every
//! object's version is a sidecar JSON record plus, for non-inline
//! payloads, one erasure-coded chunk per disk. Writes stage to temp
//! paths across the set before quorum decides whether to commit or
//! abort; reads resolve the sidecar by content vote and reconstruct
//! chunk data from whatever quorum of disks answered.
//!
//! # Example
//!
//! ```no_run
//! use objectio_storage::{LocalDiskIo, ObjectSet, DiskIo};
//! use objectio_common::{DeploymentId, DiskId, ErasureConfig};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! # fn main() -> objectio_common::Result<()> {
//! let ec = ErasureConfig::EC_4_2;
//! let disks: Vec<Arc<dyn DiskIo>> = (0..ec.total_chunks())
//!     .map(|_| Arc::new(LocalDiskIo::new(DiskId::new(), "/tmp/objectio-demo").unwrap()) as Arc<dyn DiskIo>)
//!     .collect();
//! let set = ObjectSet::new(disks, ec, 131072)?;
//! let dep = DeploymentId::new();
//! let outcome = set.put(dep, "photos", "cat.jpg", "image/jpeg".into(), BTreeMap::new(), b"...")?;
//! let data = set.get(dep, "photos", "cat.jpg", &outcome.version_id)?;
//! # Ok(()) }
//! ```

pub mod disk_io;
pub mod path;
pub mod quorum;
pub mod sidecar;
pub mod versioning;

pub use disk_io::{DiskIo, FileStat, LocalDiskIo};
pub use path::{chunk_path, object_dir, sidecar_file_prefix, sidecar_path};
pub use quorum::{ObjectSet, PutOutcome};
pub use sidecar::{ChunkDigestEntry, ErasureShape, Sidecar, SIDECAR_SCHEMA_VERSION};
pub use versioning::{enumerate_version_ids, list_versions, resolve_latest, VersionEntry};
