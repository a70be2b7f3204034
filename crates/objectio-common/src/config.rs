//! Configuration types for ObjectIO
//!
//! Loaded through the `config` crate's layered file/env support; every
//! field has a default so a bare `Config::default()` is a usable
//! single-node development configuration.

use crate::types::ErasureConfig;
use serde::{Deserialize, Serialize};

/// Root configuration for the core data-placement and durability engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub placement: PlacementConfig,
    pub registry: RegistryConfig,
    pub migration: MigrationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            placement: PlacementConfig::default(),
            registry: RegistryConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a layered source: a base file, an optional
    /// environment-specific override file, then `OBJECTIO_`-prefixed
    /// environment variables, following the donor's `NodeConfig` loading
    /// convention.
    pub fn load(config_dir: &str, env: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{config_dir}/{env}")).required(false))
            .add_source(config::Environment::with_prefix("OBJECTIO").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}

/// Chunk and sidecar storage behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Objects at or below this size are stored inline in the sidecar
    /// rather than as separate chunk files.
    pub inline_threshold: u64,
    /// Default erasure shape for new sets.
    pub default_ec: ErasureConfig,
    /// Recompute and compare BLAKE2b-256 digests on every chunk read.
    pub verify_checksums: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 128 * 1024,
            default_ec: ErasureConfig::EC_4_2,
            verify_checksums: true,
        }
    }
}

/// Consistent hash ring tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Virtual nodes contributed per physical node.
    pub vnodes_per_node: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            vnodes_per_node: 150,
        }
    }
}

/// Location registry cache tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub enable_cache: bool,
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_size: 1_000_000,
            cache_ttl_secs: 300,
        }
    }
}

/// Migration engine tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub retry_max: u32,
    pub throttle_rate_bps: u64,
    pub throttle_burst_bytes: u64,
    pub checkpoint_interval_objects: u64,
    pub checkpoint_interval_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            worker_count: 16,
            queue_capacity: 10_000,
            retry_max: 3,
            throttle_rate_bps: 0,
            throttle_burst_bytes: 64 * 1024 * 1024,
            checkpoint_interval_objects: 1_000,
            checkpoint_interval_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.default_ec, ErasureConfig::EC_4_2);
        assert_eq!(config.storage.inline_threshold, 128 * 1024);
        assert_eq!(config.migration.worker_count, 16);
    }
}
