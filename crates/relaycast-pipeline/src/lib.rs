//! Relaycast Pipeline
//!
//! Orchestrates the transfer-and-publish run: credential load, remote fetch,
//! staging, local materialization, publish and unconditional cleanup.
//!
//! ```text
//! Idle -> Authenticating -> Fetching -> Staging -> Materializing
//!      -> Publishing -> CleaningUp -> Completed | Failed(reason)
//! ```

pub mod error;
pub mod orchestrator;
pub mod refresh;
pub mod run;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::PipelineError;
pub use orchestrator::{PipelineSettings, PublishPipeline};
pub use refresh::CredentialRefresher;
pub use run::{CleanupFailure, RunReport, RunState};
