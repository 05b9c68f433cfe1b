use std::sync::Arc;

use chainwatch_core::events::EventBus;
use chainwatch_core::modules::{ModuleId, ModuleRegistry};
use chainwatch_core::storage::{save_credential, FileLocalStore, LocalStore};
use chainwatch_core::{AppContext, Credential};
use chainwatch_intel::{IntelClient, PollScheduler, ReqwestTransport, SchedulerConfig};
use chainwatch_sync::{
    DocumentStore, HttpDocumentStore, MemoryDocumentStore, SyncConfig, SyncEngine,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat};

const DEFAULT_LOG_FILTER: &str = "info";

pub struct Daemon {
    pub ctx: AppContext,
    pub registry: ModuleRegistry,
}

impl Daemon {
    pub async fn start(&self) -> anyhow::Result<()> {
        self.registry.start_all().await?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.registry.stop_all().await;
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// records from the libraries' `log` calls are bridged in.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let output = match format {
        LogFormat::Json => fmt::layer().json().flatten_event(true).boxed(),
        LogFormat::Text => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()?;
    Ok(())
}

pub async fn build_daemon(config: &Config) -> anyhow::Result<Daemon> {
    let store: Arc<dyn LocalStore> = Arc::new(FileLocalStore::new(config.data_file.clone()));
    tracing::info!("Local data file: {}", config.data_file.display());

    // A key supplied through the environment replaces the stored one.
    if let Some(credential) = config.api_key.as_deref().and_then(Credential::new) {
        save_credential(store.as_ref(), &credential)?;
    }

    let ctx = AppContext::new(EventBus::new(), store)?;

    let remote: Arc<dyn DocumentStore> = match &config.sync_url {
        Some(url) => {
            tracing::info!("Shared state backend: {}", url);
            Arc::new(HttpDocumentStore::new(
                url,
                config.sync_auth.clone(),
                config.request_timeout,
            )?)
        }
        None => {
            tracing::warn!("CW_SYNC_URL not set; shared targets stay local to this instance");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    let mut registry = ModuleRegistry::new();
    // Sync registers first so it is subscribed before the first snapshot.
    registry.register(Arc::new(SyncEngine::new(&ctx, remote, SyncConfig::default())?))?;

    if ctx.credential().is_some() {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        let client = Arc::new(IntelClient::new(&ctx, transport, &config.api_base_url));
        registry.register(Arc::new(PollScheduler::new(
            &ctx,
            client,
            SchedulerConfig::default(),
        )))?;
    } else {
        tracing::warn!(
            "No API key stored; '{}' is disabled until CW_API_KEY is provided",
            ModuleId::IntelScheduler
        );
    }

    Ok(Daemon { ctx, registry })
}
