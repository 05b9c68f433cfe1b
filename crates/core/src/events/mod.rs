//! In-process event bus.
//!
//! Components never call each other directly; they publish JSON payloads on
//! named topics and subscribe to the topics they consume.

mod bus;
mod topics;

pub use bus::*;
pub use topics::*;
