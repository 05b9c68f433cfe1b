//! Shared target model.

mod targets_model;

pub use targets_model::*;
