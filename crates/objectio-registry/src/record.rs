//! Location records: where one object version's erasure set lives.

use objectio_common::VersionId;
use serde::{Deserialize, Serialize};

/// Reserved bucket holding one registry object per `(bucket, key,
/// version_id)` record. Reads and writes to it go through the same
/// quorum protocol as user objects.
pub const REGISTRY_BUCKET: &str = "objectio-sys-registry";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub bucket: String,
    pub key: String,
    pub version_id: VersionId,
    pub pool_index: u32,
    pub set_index: u32,
    pub disk_count: u32,
    pub disk_indices: Vec<u32>,
    pub generation: u64,
    pub mod_time_unix_ms: i64,
    pub size: u64,
}

impl LocationRecord {
    /// The registry object's own key within [`REGISTRY_BUCKET`].
    #[must_use]
    pub fn registry_key(bucket: &str, key: &str, version_id: &VersionId) -> String {
        format!("{bucket}/{key}/{version_id}")
    }

    pub fn to_json(&self) -> objectio_common::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> objectio_common::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}
