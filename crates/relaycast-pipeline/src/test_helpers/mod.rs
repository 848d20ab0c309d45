//! Test helpers for pipeline tests
//!
//! In-memory stand-ins for the four collaborators of a publish run. Each one
//! records the calls it receives so tests can assert on what a run touched.
//! No database, object store or network is needed.

pub mod fixtures;
pub mod mock_services;
pub mod mock_stager;
pub mod mock_store;

pub use fixtures::*;
pub use mock_services::{FakeFetcher, FakePublisher};
pub use mock_stager::InMemoryStager;
pub use mock_store::InMemoryCredentialStore;
