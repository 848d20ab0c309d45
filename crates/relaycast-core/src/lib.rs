//! Relaycast Core Library
//!
//! Domain models, error types, configuration and token encryption shared by
//! every Relaycast crate.

pub mod config;
pub mod encryption;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod stream;

pub use config::{BaseConfig, Config, PublisherConfig};
pub use encryption::EncryptionService;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
pub use stream::ByteStream;
