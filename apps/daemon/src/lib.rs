pub mod config;
mod main_lib;

pub use main_lib::{build_daemon, init_tracing, Daemon};
