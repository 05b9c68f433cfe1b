//! Chainwatch Intel - client and scheduler for the remote intelligence API.
//!
//! The [`IntelClient`] enforces credential presence and a process-wide
//! minimum spacing between requests. The [`PollScheduler`] decides once per
//! second whether to fetch, speeding up while a chain is about to break, and
//! publishes each snapshot on the `RAW_INTEL` topic.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chainwatch_intel::{IntelClient, PollScheduler, ReqwestTransport, SchedulerConfig};
//!
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(15))?);
//! let client = Arc::new(IntelClient::new(&ctx, transport, "https://api.torn.com"));
//! let scheduler = PollScheduler::new(&ctx, client, SchedulerConfig::default());
//! registry.register(Arc::new(scheduler))?;
//! ```

mod client;
mod rate_gate;
mod request;
mod scheduler;
mod transport;
mod wire;

pub use client::IntelClient;
pub use rate_gate::{RateGate, MIN_REQUEST_SPACING};
pub use request::IntelRequest;
pub use scheduler::{PollScheduler, PollState, SchedulerConfig};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
pub use wire::decode_snapshot;
