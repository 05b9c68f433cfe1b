//! Shared-state synchronization engine.
//!
//! Atomic units, each guarded by the engine state mutex:
//! - scope change + poll timer re-arm
//! - list replace + persist (publish follows, gated by revision)
//!
//! The write queue guards its own append/flush unit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::time::Instant;

use chainwatch_core::events::{
    EventBus, Subscription, COMMANDER_ORDERS, RAW_INTEL, REQUEST_ADD_SHARED_TARGET,
    SHARED_TARGETS_UPDATED,
};
use chainwatch_core::intel::{project_roster, IntelligenceSnapshot};
use chainwatch_core::modules::{ModuleId, OverlayModule};
use chainwatch_core::storage::{load_shared_targets, save_shared_targets, LocalStore};
use chainwatch_core::targets::{canonical_json, targets_from_remote, upsert_target, SharedTarget};
use chainwatch_core::utils::time_utils::now_millis;
use chainwatch_core::{AppContext, Error, Result, ScopeId};

use crate::document_store::DocumentStore;
use crate::timer::TimerHandle;
use crate::write_queue::{WriteQueue, DEFAULT_DEBOUNCE};

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Period of the remote pull (targets + orders).
    pub poll_period: Duration,
    /// Minimum spacing between roster mirrors.
    pub mirror_period: Duration,
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_secs(5),
            mirror_period: Duration::from_secs(5),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

struct EngineState {
    scope: Option<ScopeId>,
    targets: Vec<SharedTarget>,
    /// Bumped on every list mutation; orders list publications.
    revision: u64,
    last_mirror: Option<Instant>,
    poll_timer: Option<TimerHandle>,
}

struct EngineInner {
    bus: EventBus,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn DocumentStore>,
    queue: WriteQueue,
    config: SyncConfig,
    runtime: Handle,
    state: Mutex<EngineState>,
    /// Highest revision published so far.
    published: AtomicU64,
}

impl EngineInner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Sync engine state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Publish `targets` unless a newer revision already went out.
    ///
    /// No lock is held while subscribers run, so a handler may add targets
    /// re-entrantly.
    fn publish_targets(&self, revision: u64, targets: &[SharedTarget]) {
        let previous = self.published.fetch_max(revision, Ordering::SeqCst);
        if revision <= previous {
            debug!("Skipping stale target list publication (rev {})", revision);
            return;
        }
        self.bus.publish_json(SHARED_TARGETS_UPDATED, &targets);
    }

    fn persist(&self, targets: &[SharedTarget]) {
        if let Err(e) = save_shared_targets(self.local.as_ref(), targets) {
            warn!("Failed to persist shared targets: {}", e);
        }
    }

    fn handle_intel(self: &Arc<Self>, snapshot: &IntelligenceSnapshot) {
        let Some(scope) = snapshot.scope_id() else {
            return;
        };
        self.adopt_scope(scope);
        self.mirror_roster(scope, snapshot);
    }

    /// Switch to `scope` if it differs from the active one, replacing the
    /// poll timer. Returns true on a change.
    fn adopt_scope(self: &Arc<Self>, scope: ScopeId) -> bool {
        let mut state = self.lock_state();
        if state.scope == Some(scope) {
            return false;
        }

        match state.scope {
            Some(old) => info!("Sync scope changed {} -> {}", old, scope),
            None => info!("Sync scope discovered: {}", scope),
        }
        state.scope = Some(scope);
        // Dropping the previous handle cancels the old scope's poll loop.
        state.poll_timer = None;

        let weak = Arc::downgrade(self);
        state.poll_timer = Some(TimerHandle::every(
            &self.runtime,
            self.config.poll_period,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.poll_tick(scope).await;
                    }
                }
            },
        ));
        true
    }

    fn mirror_roster(&self, scope: ScopeId, snapshot: &IntelligenceSnapshot) {
        {
            let mut state = self.lock_state();
            let now = Instant::now();
            if let Some(last) = state.last_mirror {
                if now.duration_since(last) < self.config.mirror_period {
                    return;
                }
            }
            state.last_mirror = Some(now);
        }

        let roster = project_roster(&snapshot.faction_members, now_millis());
        let value = match serde_json::to_value(&roster) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize roster: {}", e);
                return;
            }
        };
        let remote = self.remote.clone();
        let path = scope.members_path();
        debug!("Mirroring {} roster entries to {}", roster.len(), path);
        self.runtime.spawn(async move {
            if let Err(e) = remote.patch(&path, &value).await {
                warn!("Roster mirror to '{}' failed: {}", path, e);
            }
        });
    }

    /// One poll period: read targets and orders for `scope` concurrently.
    async fn poll_tick(&self, scope: ScopeId) {
        let targets_path = scope.targets_path();
        let orders_path = scope.orders_path();
        let (targets, orders) = futures::join!(
            self.remote.read(&targets_path),
            self.remote.read(&orders_path),
        );

        if self.lock_state().scope != Some(scope) {
            debug!("Dropping poll results for stale scope {}", scope);
            return;
        }

        match targets {
            Ok(value) => {
                if let Err(e) = self.merge_remote(&value) {
                    warn!("Failed to merge remote targets: {}", e);
                }
            }
            Err(e) => warn!("Remote targets read failed: {}", e),
        }

        match orders {
            Ok(Value::Null) => {}
            Ok(value) => self.bus.publish(COMMANDER_ORDERS, value),
            Err(e) => warn!("Remote orders read failed: {}", e),
        }
    }

    /// Replace the local list with the remote one if they differ.
    fn merge_remote(&self, remote: &Value) -> Result<bool> {
        let remote_targets = targets_from_remote(remote)?;
        let remote_json = canonical_json(&remote_targets)?;

        let (revision, snapshot) = {
            let mut state = self.lock_state();
            if canonical_json(&state.targets)? == remote_json {
                return Ok(false);
            }
            state.targets = remote_targets;
            state.revision += 1;
            self.persist(&state.targets);
            (state.revision, state.targets.clone())
        };

        info!("Remote target list replaced local ({} entries)", snapshot.len());
        self.publish_targets(revision, &snapshot);
        Ok(true)
    }

    fn add_shared_target(&self, payload: &Value) -> bool {
        let Some(target) = SharedTarget::from_request(payload, now_millis()) else {
            debug!("Ignoring shared target request without id or name");
            return false;
        };

        let (revision, snapshot, scope) = {
            let mut state = self.lock_state();
            upsert_target(&mut state.targets, target.clone());
            state.revision += 1;
            self.persist(&state.targets);
            (state.revision, state.targets.clone(), state.scope)
        };

        self.publish_targets(revision, &snapshot);

        match (scope, serde_json::to_value(&target)) {
            (Some(scope), Ok(value)) => self.queue.enqueue(scope.target_path(&target.id), value),
            (None, _) => debug!("No scope yet; target {} kept local only", target.id),
            (_, Err(e)) => warn!("Failed to serialize target {}: {}", target.id, e),
        }
        true
    }
}

/// Keeps the shared target list in eventual agreement with the remote store.
pub struct SyncEngine {
    inner: Arc<EngineInner>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SyncEngine {
    /// Build the engine and load the persisted list. Must be called from
    /// within a Tokio runtime; timers and writes are spawned onto it.
    pub fn new(ctx: &AppContext, remote: Arc<dyn DocumentStore>, config: SyncConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Config(format!("Sync engine needs a Tokio runtime: {}", e)))?;
        let targets = load_shared_targets(ctx.store.as_ref());
        let queue = WriteQueue::new(remote.clone(), runtime.clone(), config.debounce);

        Ok(Self {
            inner: Arc::new(EngineInner {
                bus: ctx.bus.clone(),
                local: ctx.store.clone(),
                remote,
                queue,
                config,
                runtime,
                state: Mutex::new(EngineState {
                    scope: None,
                    targets,
                    revision: 0,
                    last_mirror: None,
                    poll_timer: None,
                }),
                published: AtomicU64::new(0),
            }),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.inner.lock_state().scope
    }

    pub fn targets(&self) -> Vec<SharedTarget> {
        self.inner.lock_state().targets.clone()
    }

    pub fn pending_writes(&self) -> usize {
        self.inner.queue.pending()
    }

    /// Process one intelligence snapshot: scope discovery and roster mirror.
    pub fn handle_intel(&self, snapshot: &IntelligenceSnapshot) {
        self.inner.handle_intel(snapshot);
    }

    /// Apply a local add, persist, publish and queue the remote write.
    ///
    /// Returns false (and does nothing) when the id or name is missing.
    pub fn add_shared_target(&self, payload: &Value) -> bool {
        self.inner.add_shared_target(payload)
    }

    /// Run one poll period immediately for the current scope.
    pub async fn poll_now(&self) {
        if let Some(scope) = self.scope() {
            self.inner.poll_tick(scope).await;
        }
    }

    /// Merge a remote `targets` subtree. Returns true when local changed.
    pub fn merge_remote(&self, remote: &Value) -> Result<bool> {
        self.inner.merge_remote(remote)
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl OverlayModule for SyncEngine {
    fn id(&self) -> ModuleId {
        ModuleId::SharedSync
    }

    async fn start(&self) -> Result<()> {
        {
            let mut subscriptions = self.lock_subscriptions();
            if !subscriptions.is_empty() {
                return Ok(());
            }

            let inner = self.inner.clone();
            subscriptions.push(self.inner.bus.subscribe(RAW_INTEL, move |payload| {
                let snapshot: IntelligenceSnapshot = serde_json::from_value(payload.clone())?;
                inner.handle_intel(&snapshot);
                Ok(())
            }));

            let inner = self.inner.clone();
            subscriptions.push(
                self.inner
                    .bus
                    .subscribe(REQUEST_ADD_SHARED_TARGET, move |payload| {
                        inner.add_shared_target(payload);
                        Ok(())
                    }),
            );
        }

        // Hand the persisted list to late subscribers right away.
        let (revision, snapshot) = {
            let mut state = self.inner.lock_state();
            state.revision += 1;
            (state.revision, state.targets.clone())
        };
        self.inner.publish_targets(revision, &snapshot);
        Ok(())
    }

    async fn stop(&self) {
        let subscriptions = std::mem::take(&mut *self.lock_subscriptions());
        for sub in &subscriptions {
            sub.unsubscribe();
        }

        let timer = self.inner.lock_state().poll_timer.take();
        if let Some(timer) = timer {
            timer.cancel();
        }

        self.inner.queue.flush_now().await;
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
