//! ObjectIO Core - wires placement, topology, erasure storage, the
//! location registry and migration into one `ObjectStore` surface.
//!
//! This crate has no network transport of its own; an S3-compatible
//! frontend (or any other protocol surface) is expected to sit on top
//! of [`store::ObjectStore`].

pub mod bucket;
pub mod store;

pub use bucket::BucketCatalog;
pub use store::{
    DeleteResult, GetResult, ListEntry, ListResult, ObjectIoCore, ObjectMetadata, ObjectStore,
    PutResult,
};
