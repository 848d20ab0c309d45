//! Data models shared across crates

mod credential;
mod publish;

pub use credential::*;
pub use publish::*;
