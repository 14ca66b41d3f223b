use super::config::{ConfigError, EngagementConfig};
use crate::clients::EngagementClient;
use crate::engagement_actor::{self, EngagementContext};
use crate::system_of_record::InMemorySystemOfRecord;
use entity_actor::{FileStateStore, MemoryStateStore, StateStore};
use std::sync::Arc;
use tracing::info;

/// The runtime orchestrator of the engagement layer.
///
/// `EngagementSystem` is responsible for:
/// - **Wiring**: the snapshot store, the System-of-Record, and the actor host
/// - **Dependency Injection**: the System-of-Record's read path goes into every actor's
///   context so fresh entities can be seeded
/// - **Graceful Shutdown**: every active actor gets a final flush and snapshot
///
/// # Example
///
/// ```ignore
/// let system = EngagementSystem::new(EngagementConfig::from_env()?)?;
///
/// system.client.interact(InteractionRequest::new("42", Some("u1"), "like")).await?;
///
/// system.shutdown().await;
/// ```
pub struct EngagementSystem {
    /// Client for the engagement actors
    pub client: EngagementClient,

    /// The System-of-Record the actors flush into
    pub record: Arc<InMemorySystemOfRecord>,
}

impl EngagementSystem {
    /// Creates the system with the store selected by `config.state_dir`.
    pub fn new(config: EngagementConfig) -> Result<Self, ConfigError> {
        let store: Arc<dyn StateStore> = match &config.state_dir {
            Some(dir) => {
                let store = FileStateStore::open(dir).map_err(|source| ConfigError::StateDir {
                    path: dir.clone(),
                    source,
                })?;
                info!(dir = %dir.display(), "Using file snapshot store");
                Arc::new(store)
            }
            None => {
                info!("Using in-memory snapshot store");
                Arc::new(MemoryStateStore::new())
            }
        };
        Ok(Self::with_parts(config, store, Arc::new(InMemorySystemOfRecord::new())))
    }

    /// Creates the system over existing stores, e.g. to simulate a restart.
    pub fn with_parts(
        config: EngagementConfig,
        store: Arc<dyn StateStore>,
        record: Arc<InMemorySystemOfRecord>,
    ) -> Self {
        let context = if config.seed_from_record {
            EngagementContext::seeded_from(record.clone())
        } else {
            EngagementContext::default()
        };
        let client = engagement_actor::new(config.actor.clone(), store, record.clone(), context);
        info!(
            flush_interval = ?config.actor.flush_interval,
            flush_threshold = config.actor.flush_threshold,
            idle_timeout = ?config.actor.idle_timeout,
            seed_from_record = config.seed_from_record,
            "Engagement system started"
        );
        Self { client, record }
    }

    /// Stops every active actor. Each one drains its write-behind queue and writes a
    /// final snapshot before this returns.
    pub async fn shutdown(self) {
        info!("Shutting down engagement system...");
        self.client.host().shutdown().await;
        info!("Engagement system stopped");
    }
}
