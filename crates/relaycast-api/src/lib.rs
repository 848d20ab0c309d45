//! Relaycast API Library
//!
//! HTTP surface of the publishing service: handlers, application state and
//! startup wiring.

mod api_doc;
mod handlers;

pub mod error;
pub mod setup;
pub mod state;

pub use error::{HttpAppError, ValidatedJson};
pub use relaycast_infra::ErrorResponse;
pub use state::{AppState, OAuthStateStore};
