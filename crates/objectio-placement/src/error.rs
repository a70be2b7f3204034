//! Error types for placement operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlacementError>;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("placement ring has no nodes")]
    EmptyRing,

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("jump consistent hash requires at least one bucket")]
    ZeroBuckets,
}
