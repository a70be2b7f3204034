//! Core type definitions for ObjectIO
//!
//! This module defines the fundamental identifiers and small value types used
//! across the placement, storage, topology, registry and migration crates.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a deployment, minted once at format time and carried by
/// every disk's `format.json` for the life of the cluster.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct DeploymentId(Uuid);

impl DeploymentId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeploymentId({})", self.0)
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version identifier for an object version. `None` in caller-facing APIs
/// means "resolve `latest`"; there is no sentinel value inside the type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct VersionId(Uuid);

impl VersionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for a disk, assigned once at format time and never
/// reused even if the underlying mount is replaced.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct DiskId(Uuid);

impl DiskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for DiskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiskId({})", self.0)
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a bucket, validated against the same naming rules
/// as the rest of the object-storage ecosystem (lowercase DNS-label style).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct BucketName(String);

impl BucketName {
    pub fn new(name: impl Into<String>) -> Result<Self, BucketNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Create without validation. Used internally for reserved system
    /// buckets whose names are chosen by us, not by callers.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), BucketNameError> {
        if name.len() < 3 {
            return Err(BucketNameError::TooShort);
        }
        if name.len() > 63 {
            return Err(BucketNameError::TooLong);
        }

        let first = name.chars().next().unwrap();
        if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
            return Err(BucketNameError::InvalidStartChar);
        }

        let last = name.chars().last().unwrap();
        if !last.is_ascii_lowercase() && !last.is_ascii_digit() {
            return Err(BucketNameError::InvalidEndChar);
        }

        for c in name.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
                return Err(BucketNameError::InvalidChar(c));
            }
        }

        if name.contains("..") {
            return Err(BucketNameError::ConsecutivePeriods);
        }

        if name.parse::<std::net::Ipv4Addr>().is_ok() {
            return Err(BucketNameError::LooksLikeIpAddress);
        }

        Ok(())
    }
}

impl fmt::Debug for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketName({:?})", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BucketNameError {
    #[error("bucket name must be at least 3 characters")]
    TooShort,
    #[error("bucket name must be at most 63 characters")]
    TooLong,
    #[error("bucket name must start with a lowercase letter or number")]
    InvalidStartChar,
    #[error("bucket name must end with a lowercase letter or number")]
    InvalidEndChar,
    #[error("bucket name contains invalid character: {0}")]
    InvalidChar(char),
    #[error("bucket name cannot contain consecutive periods")]
    ConsecutivePeriods,
    #[error("bucket name cannot be formatted as an IP address")]
    LooksLikeIpAddress,
}

/// Object key (path within a bucket).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ObjectKeyError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    #[must_use]
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(key: &str) -> Result<(), ObjectKeyError> {
        if key.len() > 1024 {
            return Err(ObjectKeyError::TooLong);
        }
        if key.is_empty() {
            return Err(ObjectKeyError::Empty);
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({:?})", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectKeyError {
    #[error("object key cannot be empty")]
    Empty,
    #[error("object key cannot exceed 1024 bytes")]
    TooLong,
}

/// Reed-Solomon shape: `k` data chunks and `m` parity chunks. MDS only —
/// any `k` of the resulting `k+m` chunks reconstruct the original payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data chunks (k)
    pub k: u8,
    /// Number of parity chunks (m)
    pub m: u8,
}

impl ErasureConfig {
    #[must_use]
    pub const fn new(k: u8, m: u8) -> Self {
        Self { k, m }
    }

    #[must_use]
    pub const fn total_chunks(&self) -> u8 {
        self.k + self.m
    }

    #[must_use]
    pub fn efficiency(&self) -> f64 {
        f64::from(self.k) / f64::from(self.total_chunks())
    }

    /// Write quorum: `K + ceil(M/2)` chunks/sidecars must be durably
    /// committed for the write to be reported successful.
    #[must_use]
    pub const fn write_quorum(&self) -> u8 {
        self.k + self.m.div_ceil(2)
    }

    /// Read quorum for chunk decode: exactly `K`.
    #[must_use]
    pub const fn read_quorum(&self) -> u8 {
        self.k
    }

    /// Sidecar agreement quorum: `floor(N/2) + 1`.
    #[must_use]
    pub const fn sidecar_quorum(&self) -> u8 {
        self.total_chunks() / 2 + 1
    }

    pub const EC_4_2: Self = Self::new(4, 2);
    pub const EC_8_4: Self = Self::new(8, 4);
    pub const EC_12_4: Self = Self::new(12, 4);
    pub const EC_16_4: Self = Self::new(16, 4);
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self::EC_4_2
    }
}

/// Lifecycle state of a set within a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetState {
    /// Accepting both reads and writes.
    #[default]
    Active,
    /// Serving reads; migration is draining objects off this set.
    Draining,
    /// No longer part of the topology; safe to decommission its disks.
    Removed,
}

impl fmt::Display for SetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Draining => write!(f, "draining"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_id() {
        let id = DeploymentId::new();
        assert_eq!(id.as_bytes().len(), 16);
    }

    #[test]
    fn test_bucket_name_valid() {
        assert!(BucketName::new("my-bucket").is_ok());
        assert!(BucketName::new("bucket123").is_ok());
        assert!(BucketName::new("a.b.c").is_ok());
    }

    #[test]
    fn test_bucket_name_invalid() {
        assert!(BucketName::new("ab").is_err());
        assert!(BucketName::new("-bucket").is_err());
        assert!(BucketName::new("bucket-").is_err());
        assert!(BucketName::new("Bucket").is_err());
        assert!(BucketName::new("bucket..name").is_err());
        assert!(BucketName::new("192.168.1.1").is_err());
    }

    #[test]
    fn test_erasure_config_quorums() {
        let ec = ErasureConfig::EC_4_2;
        assert_eq!(ec.total_chunks(), 6);
        assert_eq!(ec.write_quorum(), 5);
        assert_eq!(ec.read_quorum(), 4);
        assert_eq!(ec.sidecar_quorum(), 4);
    }
}
