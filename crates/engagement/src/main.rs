//! # Engagement Aggregation Demo
//!
//! Runs a short engagement scenario against an in-process System-of-Record.
//!
//! ## Core Components
//!
//! - **[entity_actor]**: The generic actor runtime: one [`EntityActor`](entity_actor::EntityActor)
//!   per entity, a write-behind batcher, live subscribers, snapshots.
//! - **model**: Pure data structures (`EntityState`, `Interaction`, `LiveUpdate`).
//! - **clients**: `EngagementClient` hides message passing.
//! - **lifecycle**: `EngagementSystem` wires stores and the host together.
//!
//! ## Quick Start
//!
//! ```text
//! RUST_LOG=info cargo run -p engagement -- --article 42 --state-dir /tmp/engagement
//! ```
//!
//! Running twice with the same `--state-dir` shows the counts surviving a restart.

use clap::Parser;
use engagement::lifecycle::{EngagementConfig, EngagementSystem};
use engagement::model::{EmptyEntityId, EntityId, Interaction, LiveUpdate, ANONYMOUS};
use entity_actor::tracing::setup_tracing;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Instrument};

#[derive(Parser, Debug)]
#[command(name = "engagement", about = "Real-time engagement aggregation demo")]
struct Cli {
    /// Article to interact with
    #[arg(long, default_value = "42")]
    article: String,

    /// Persist snapshots in this directory instead of memory
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Debounce window of the write-behind queue, in milliseconds
    #[arg(long)]
    flush_interval_ms: Option<u64>,

    /// Queue length that triggers an immediate flush
    #[arg(long)]
    flush_threshold: Option<usize>,

    /// Do not seed new entities from the System-of-Record
    #[arg(long)]
    no_seed: bool,
}

impl Cli {
    fn config(&self) -> Result<EngagementConfig, String> {
        let mut config = EngagementConfig::from_env().map_err(|e| e.to_string())?;
        if let Some(dir) = &self.state_dir {
            config.state_dir = Some(dir.clone());
        }
        if let Some(ms) = self.flush_interval_ms {
            config.actor.flush_interval = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.flush_threshold {
            config.actor.flush_threshold = threshold.max(1);
        }
        if self.no_seed {
            config.seed_from_record = false;
        }
        Ok(config)
    }

    /// The entity every step of the scenario addresses, parsed like a wire id.
    fn entity(&self) -> Result<EntityId, String> {
        self.article.parse().map_err(|e: EmptyEntityId| e.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    // Setup tracing once for the entire application
    setup_tracing();

    let cli = Cli::parse();
    let config = cli.config()?;
    info!(?config, "Starting engagement system");

    let system = EngagementSystem::new(config).map_err(|e| e.to_string())?;
    let client = system.client.clone();
    let article = cli.entity()?;

    // A live reader sees the snapshot first, then every change
    let mut live = client.subscribe(&article).await.map_err(|e| e.to_string())?;
    if let Some(LiveUpdate::Snapshot { counts, .. }) = live.recv().await {
        info!(?counts, "Live connection opened");
    }

    let span = tracing::info_span!("reader_session", article = %article);
    async {
        let session = [
            Interaction::like("alice"),
            Interaction::like("bob"),
            Interaction::like("alice"),
            Interaction::save("alice"),
            Interaction::share(ANONYMOUS).with_metadata("channel", "email"),
            Interaction::unlike("bob"),
        ];
        for interaction in session {
            let subject = interaction.subject_id.clone();
            let kind = interaction.kind.to_string();
            let outcome = client
                .apply(&article, interaction)
                .await
                .map_err(|e| e.to_string())?;
            info!(%subject, %kind, member = outcome.member, counts = ?outcome.counts, "Interaction applied");
        }
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    while let Some(update) = live.try_recv() {
        let json = update.to_json().map_err(|e| e.to_string())?;
        info!(%json, "Live update");
    }

    // Platform-wide metrics clamp at zero
    for delta in [5, -2, -10] {
        let value = client
            .record_metric("totalLikes", delta)
            .await
            .map_err(|e| e.to_string())?;
        info!(delta, value, "Platform metric updated");
    }

    let view = client
        .state(&article, Some("alice"))
        .await
        .map_err(|e| e.to_string())?;
    info!(counts = ?view.counts, liked = view.liked, saved = view.saved, "Article state");

    let record = system.record.clone();
    system.shutdown().await;

    // After shutdown every record has reached the System-of-Record
    info!(counts = ?record.aggregate(&article), "System-of-Record aggregate");
    info!(counts = ?record.aggregate(&EntityId::Platform), "Platform aggregate");

    Ok(())
}
