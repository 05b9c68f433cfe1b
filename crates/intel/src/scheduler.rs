//! Adaptive polling scheduler.
//!
//! Ticks once per second and fetches a fresh snapshot every N ticks, where N
//! depends on how urgent the current chain is:
//!
//! | state                      | cadence |
//! |----------------------------|---------|
//! | active, timeout < 45 s     | 1       |
//! | active                     | 3       |
//! | idle                       | 15      |
//!
//! A failed fetch leaves the chain state untouched; the cadence it implies
//! may be stale until the next successful fetch.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use chainwatch_core::events::{EventBus, RAW_INTEL};
use chainwatch_core::intel::{ChainState, IntelligenceSnapshot};
use chainwatch_core::modules::{ModuleId, OverlayModule};
use chainwatch_core::{AppContext, Error, Result};

use crate::client::IntelClient;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub tick: Duration,
    /// Remaining chain seconds below which every tick fetches.
    pub urgent_timeout_secs: i64,
    pub urgent_cadence: u32,
    pub active_cadence: u32,
    pub idle_cadence: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            urgent_timeout_secs: 45,
            urgent_cadence: 1,
            active_cadence: 3,
            idle_cadence: 15,
        }
    }
}

/// Chain-derived urgency plus the tick counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollState {
    pub active: bool,
    /// Seconds remaining on the chain.
    pub timeout: i64,
    ticks: u32,
}

impl PollState {
    pub fn new(active: bool, timeout: i64) -> Self {
        Self {
            active,
            timeout,
            ticks: 0,
        }
    }

    /// Number of ticks between fetches in the current state.
    pub fn cadence(&self, config: &SchedulerConfig) -> u32 {
        if self.active && self.timeout < config.urgent_timeout_secs {
            config.urgent_cadence
        } else if self.active {
            config.active_cadence
        } else {
            config.idle_cadence
        }
    }

    /// Count one tick. Returns true (and resets the counter) when a fetch is due.
    pub fn on_tick(&mut self, config: &SchedulerConfig) -> bool {
        self.ticks += 1;
        if self.ticks >= self.cadence(config).max(1) {
            self.ticks = 0;
            true
        } else {
            false
        }
    }

    pub fn apply_chain(&mut self, chain: &ChainState) {
        self.active = chain.is_active();
        self.timeout = chain.time_left;
    }
}

struct SchedulerInner {
    client: Arc<IntelClient>,
    bus: EventBus,
    config: SchedulerConfig,
    state: Mutex<PollState>,
}

impl SchedulerInner {
    fn lock_state(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    async fn poll_once(&self) -> Result<IntelligenceSnapshot> {
        let snapshot = self.client.fetch_snapshot().await?;

        self.lock_state().apply_chain(&snapshot.chain);
        self.bus.publish_json(RAW_INTEL, &snapshot);
        Ok(snapshot)
    }

    /// Evaluate one tick; fetch if due. Failures are logged and swallowed.
    async fn tick(&self) -> bool {
        let due = self.lock_state().on_tick(&self.config);
        if !due {
            return false;
        }

        match self.poll_once().await {
            Ok(snapshot) => debug!(
                "Intel poll ok: chain {} hits, {}s left",
                snapshot.chain.hits, snapshot.chain.time_left
            ),
            Err(Error::RateLimited) => debug!("Intel poll skipped: rate limited"),
            Err(e) if e.is_transient() => info!("Intel poll failed: {}", e),
            Err(e) => warn!("Intel poll failed: {}", e),
        }
        true
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("Intel scheduler started");

        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; use it for the
        // startup fetch so the overlay does not wait a full idle cadence.
        interval.tick().await;
        if let Err(e) = self.poll_once().await {
            warn!("Initial intel poll failed: {}", e);
        }

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Intel scheduler shutting down");
    }
}

/// Drives [`IntelClient`] on an adaptive cadence and publishes `RAW_INTEL`.
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(ctx: &AppContext, client: Arc<IntelClient>, config: SchedulerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                client,
                bus: ctx.bus.clone(),
                config,
                state: Mutex::new(PollState::default()),
            }),
            shutdown,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollState {
        *self.inner.lock_state()
    }

    pub fn cadence(&self) -> u32 {
        self.state().cadence(&self.inner.config)
    }

    /// Fetch immediately, bypassing the tick counter.
    pub async fn poll_once(&self) -> Result<IntelligenceSnapshot> {
        self.inner.poll_once().await
    }

    /// Evaluate a single tick. Returns true if a fetch was attempted.
    pub async fn tick(&self) -> bool {
        self.inner.tick().await
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl OverlayModule for PollScheduler {
    fn id(&self) -> ModuleId {
        ModuleId::IntelScheduler
    }

    async fn start(&self) -> Result<()> {
        if !self.inner.client.has_credential() {
            return Err(Error::NoCredential);
        }

        let mut task = self.lock_task();
        if task.is_some() {
            return Ok(());
        }
        self.shutdown.send_replace(false);
        let receiver = self.shutdown.subscribe();
        *task = Some(tokio::spawn(self.inner.clone().run(receiver)));
        Ok(())
    }

    async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = self.lock_task().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Intel scheduler task ended abnormally: {}", e);
            }
        }
    }
}
