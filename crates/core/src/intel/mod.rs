//! Intelligence snapshot model and derived projections.

mod intel_model;
mod roster;

pub use intel_model::*;
pub use roster::*;
