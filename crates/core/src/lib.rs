//! Chainwatch Core - shared domain types, event bus and local persistence.
//!
//! This crate has no knowledge of HTTP endpoints or timers. The intel and
//! sync crates build on the types and traits defined here.

pub mod context;
pub mod credential;
pub mod errors;
pub mod events;
pub mod intel;
pub mod modules;
pub mod scope;
pub mod storage;
pub mod targets;
pub mod utils;

pub use context::AppContext;
pub use credential::Credential;
pub use scope::ScopeId;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
