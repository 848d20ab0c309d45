//! Relaycast Storage Library
//!
//! Durable intermediate storage for source videos while a publish run is in
//! flight. The [`Storage`] trait abstracts the backing store (S3 or the local
//! filesystem); [`StorageStager`] builds the run-facing staging operations on
//! top of it and hands back [`LocalArtifact`]s for the publish step.
//!
//! # Staged key format
//!
//! `{prefix}/{utc timestamp}-{random suffix}`, e.g.
//! `staging/20260101T120000123Z-3f1c0e...`. Keys are never reused across runs.
//! Keys must not contain `..` or a leading `/`.

pub mod artifact;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod stager;
pub mod traits;

pub use artifact::LocalArtifact;
pub use factory::create_storage;
pub use keys::StagedKey;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use relaycast_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use stager::{ObjectStager, StagerError, StorageStager};
pub use traits::{ChunkStream, Storage, StorageError, StorageResult};
