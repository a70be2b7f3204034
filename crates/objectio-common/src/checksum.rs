//! Checksum and path-hashing utilities for ObjectIO
//!
//! Three distinct hashes are used by the surrounding crates, each for a
//! reason that does not generalize to the others:
//!
//! - BLAKE2b-256 for per-chunk digests and ETags (fast, 256-bit, no known
//!   practical collisions — this is the integrity hash that gets compared
//!   on every read).
//! - xxh64 for path-seed hashing (not a security boundary, just needs to
//!   spread object names evenly across directory prefixes).
//! - SHA-256 for content-hash voting when disks disagree on a sidecar or
//!   topology file (kept distinct from the BLAKE2b digest so a bug in one
//!   hash cannot simultaneously corrupt both the data-integrity check and
//!   the consensus check).

use blake2::Blake2b;
use blake2::digest::Digest as _;
use blake2::digest::consts::{U16, U32};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type Blake2b256 = Blake2b<U32>;
/// Half-width BLAKE2b, used only for ETags: the spec fixes the ETag at
/// 32 lower-hex characters (16 bytes), distinct from the 64-hex digests
/// recorded for chunk integrity.
type Blake2b128 = Blake2b<U16>;

/// A 32-byte BLAKE2b-256 digest, as recorded in sidecars for each chunk
/// and folded together to produce ETags.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest32(#[serde(with = "hex32")] pub [u8; 32]);

impl Digest32 {
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Blake2b256::new();
        hasher.update(data);
        let out: [u8; 32] = hasher.finalize().into();
        Self(out)
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl std::fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest32({})", self.to_hex())
    }
}

mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let v = hex::decode(&s).map_err(serde::de::Error::custom)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// BLAKE2b-128 of the concatenation of per-chunk digests, in chunk-index
/// order — this is the ETag for a multi-chunk object: 32 lower-hex
/// characters, half the width of the per-chunk integrity digest.
#[must_use]
pub fn etag_of_chunks(chunk_digests: &[Digest32]) -> String {
    let mut hasher = Blake2b128::new();
    for d in chunk_digests {
        hasher.update(d.0);
    }
    let out: [u8; 16] = hasher.finalize().into();
    hex::encode(out)
}

/// BLAKE2b-128 of an inline payload — the ETag for objects small enough
/// to be stored inline rather than chunked. 32 lower-hex characters.
#[must_use]
pub fn etag_of_inline(data: &[u8]) -> String {
    let mut hasher = Blake2b128::new();
    hasher.update(data);
    let out: [u8; 16] = hasher.finalize().into();
    hex::encode(out)
}

/// Object-hash path component: lower-hex BLAKE2b-256 of
/// `deployment_id || 0x00 || bucket || 0x00 || key`.
#[must_use]
pub fn object_hash_path(deployment_id: &[u8; 16], bucket: &str, key: &str) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update(deployment_id);
    hasher.update([0u8]);
    hasher.update(bucket.as_bytes());
    hasher.update([0u8]);
    hasher.update(key.as_bytes());
    let out: [u8; 32] = hasher.finalize().into();
    hex::encode(out)
}

/// Directory-partitioning prefixes for an object path: a 16-hex component
/// and a 2-hex component, both pure functions of
/// `(deployment_id, bucket, key)` so every disk derives the same path
/// independently.
#[must_use]
pub fn partition_prefixes(deployment_id: &[u8; 16], bucket: &str, key: &str) -> (String, String) {
    let dep_seed = xxhash_rust::xxh64::xxh64(deployment_id, 0);
    let path = format!("{bucket}/{key}");
    let wide = xxhash_rust::xxh64::xxh64(path.as_bytes(), dep_seed);
    let narrow = xxhash_rust::xxh64::xxh64(path.as_bytes(), dep_seed.wrapping_add(1));
    let hex16 = format!("{wide:016x}");
    let hex2 = format!("{:02x}", (narrow & 0xff) as u8);
    (hex2, hex16)
}

/// SHA-256 content hash used for voting when disks disagree (sidecar or
/// topology divergence). Kept distinct from the BLAKE2b integrity digest.
#[must_use]
pub fn content_hash(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// xxh64 with an explicit seed — the primitive used both for path-seed
/// derivation above and for topology-consensus bucketing.
#[must_use]
pub fn xxh64_seed(seed: u64, data: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(data, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_roundtrip() {
        let d = Digest32::of(b"abcdefghij");
        let hex = d.to_hex();
        assert_eq!(hex.len(), 64);
        let back = Digest32::from_hex(&hex).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn test_etag_inline_is_32_lower_hex_chars() {
        let data = b"abcdefghij";
        let etag = etag_of_inline(data);
        assert_eq!(etag.len(), 32);
        assert!(etag.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(etag, etag_of_inline(data));
        assert_ne!(etag, Digest32::of(data).to_hex());
    }

    #[test]
    fn test_etag_of_chunks_is_32_lower_hex_chars() {
        let chunks = vec![Digest32::of(b"a"), Digest32::of(b"b")];
        let etag = etag_of_chunks(&chunks);
        assert_eq!(etag.len(), 32);
        assert!(etag.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_partition_prefixes_deterministic() {
        let dep = [7u8; 16];
        let (h2, h16) = partition_prefixes(&dep, "photos", "cat.jpg");
        let (h2b, h16b) = partition_prefixes(&dep, "photos", "cat.jpg");
        assert_eq!(h2, h2b);
        assert_eq!(h16, h16b);
        assert_eq!(h2.len(), 2);
        assert_eq!(h16.len(), 16);
    }

    #[test]
    fn test_object_hash_path_is_full_digest() {
        let dep = [1u8; 16];
        let path = object_hash_path(&dep, "b", "k");
        assert_eq!(path.len(), 64);
    }
}
