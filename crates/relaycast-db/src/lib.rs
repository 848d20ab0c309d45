//! Relaycast database layer
//!
//! Persistent storage of delegated user credentials.

pub mod db;

pub use db::{CredentialStore, PgCredentialRepository};
