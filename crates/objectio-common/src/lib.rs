//! ObjectIO Common - Shared types and utilities
//!
//! This crate provides common types, error definitions, checksum/path
//! helpers, and configuration used across all core ObjectIO components.

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use checksum::{Digest32, content_hash, etag_of_chunks, etag_of_inline, object_hash_path, partition_prefixes, xxh64_seed};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
