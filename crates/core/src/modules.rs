//! Typed module interface and registry.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::errors::{Error, Result};

/// The fixed set of long-running components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleId {
    IntelScheduler,
    SharedSync,
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleId::IntelScheduler => f.write_str("intel-scheduler"),
            ModuleId::SharedSync => f.write_str("shared-sync"),
        }
    }
}

/// A component with a defined init/teardown lifecycle.
#[async_trait]
pub trait OverlayModule: Send + Sync {
    fn id(&self) -> ModuleId;

    /// Subscribe to topics and arm timers. Must not block.
    async fn start(&self) -> Result<()>;

    /// Cancel timers and release subscriptions. Must be safe to call twice.
    async fn stop(&self);
}

/// Explicit registry keyed by [`ModuleId`]. At most one module per id.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn OverlayModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<dyn OverlayModule>) -> Result<()> {
        let id = module.id();
        if self.get(id).is_some() {
            return Err(Error::Config(format!("module '{}' registered twice", id)));
        }
        self.modules.push(module);
        Ok(())
    }

    pub fn get(&self, id: ModuleId) -> Option<Arc<dyn OverlayModule>> {
        self.modules.iter().find(|m| m.id() == id).cloned()
    }

    /// Start modules in registration order. On failure, modules already
    /// started are stopped again before the error is returned.
    pub async fn start_all(&self) -> Result<()> {
        for (idx, module) in self.modules.iter().enumerate() {
            if let Err(e) = module.start().await {
                warn!("Module '{}' failed to start: {}", module.id(), e);
                for started in self.modules[..idx].iter().rev() {
                    started.stop().await;
                }
                return Err(e);
            }
            info!("Module '{}' started", module.id());
        }
        Ok(())
    }

    /// Stop modules in reverse registration order.
    pub async fn stop_all(&self) {
        for module in self.modules.iter().rev() {
            module.stop().await;
            info!("Module '{}' stopped", module.id());
        }
    }
}
