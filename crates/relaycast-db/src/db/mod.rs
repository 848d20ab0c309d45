//! Database repositories
//!
//! Repositories use dynamic `sqlx::query` calls so the crate builds without a
//! live database or an offline query cache.

pub mod credentials;

pub use credentials::{CredentialStore, PgCredentialRepository};
