use async_trait::async_trait;
use engagement::engagement_actor::{self, membership_consistent, EngagementContext, EngagementError};
use engagement::lifecycle::{EngagementConfig, EngagementSystem};
use engagement::model::{EntityId, EntityState, InteractionRequest, LiveUpdate, LIKES, SAVES, SHARES, VIEWS};
use engagement::system_of_record::{EntitySeed, InMemorySystemOfRecord, SeedSource};
use entity_actor::{ActorConfig, MemoryStateStore, StateStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// No timer-driven flushes or evictions; everything reaches the System-of-Record on shutdown.
fn quiet_config() -> EngagementConfig {
    EngagementConfig {
        actor: ActorConfig {
            flush_interval: Duration::from_secs(3600),
            idle_timeout: None,
            ..ActorConfig::default()
        },
        ..EngagementConfig::default()
    }
}

fn in_memory(config: EngagementConfig) -> (EngagementSystem, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let system = EngagementSystem::with_parts(config, store.clone(), Arc::new(InMemorySystemOfRecord::new()));
    (system, store)
}

fn like(subject: &str) -> InteractionRequest {
    InteractionRequest::new("42", Some(subject), "like")
}

fn unlike(subject: &str) -> InteractionRequest {
    InteractionRequest::new("42", Some(subject), "unlike")
}

/// Full end-to-end run of likes and unlikes on one article.
#[tokio::test]
async fn test_article_like_unlike_scenario() {
    let (system, _) = in_memory(quiet_config());
    let client = system.client.clone();
    let article = EntityId::article("42");

    let outcome = client.interact(like("u1")).await.expect("like u1");
    assert_eq!(outcome.counts[LIKES], 1);
    assert!(outcome.member);

    // Repeated like is idempotent
    let outcome = client.interact(like("u1")).await.expect("like u1 again");
    assert_eq!(outcome.counts[LIKES], 1);
    assert!(outcome.member);

    let outcome = client.interact(like("u2")).await.expect("like u2");
    assert_eq!(outcome.counts[LIKES], 2);

    let outcome = client.interact(unlike("u1")).await.expect("unlike u1");
    assert_eq!(outcome.counts[LIKES], 1);
    assert!(!outcome.member);

    let outcome = client.interact(unlike("u1")).await.expect("unlike u1 again");
    assert_eq!(outcome.counts[LIKES], 1);

    let view = client.state(&article, Some("u1")).await.unwrap();
    assert!(!view.liked);
    let view = client.state(&article, Some("u2")).await.unwrap();
    assert!(view.liked);
    assert!(!view.saved);
    assert!(view.last_updated.is_some());

    // Only the three real transitions were queued
    let status = client.status(&article).await.unwrap();
    assert_eq!(status.pending, 3);

    let record = system.record.clone();
    system.shutdown().await;

    assert_eq!(record.aggregate(&article)[LIKES], 1);
    assert!(record.is_member(&article, "u2", "like"));
    assert!(!record.is_member(&article, "u1", "like"));
}

#[tokio::test]
async fn test_platform_metric_clamps_and_mirrors_effective_delta() {
    let (system, _) = in_memory(quiet_config());
    let client = system.client.clone();

    assert_eq!(client.record_metric("totalLikes", 5).await.unwrap(), 5);
    assert_eq!(client.record_metric("totalLikes", -2).await.unwrap(), 3);
    assert_eq!(client.record_metric("totalLikes", -10).await.unwrap(), 0);

    // Already at zero: nothing to record
    assert_eq!(client.record_metric("totalLikes", -1).await.unwrap(), 0);
    assert_eq!(client.status(&EntityId::Platform).await.unwrap().pending, 3);

    let record = system.record.clone();
    system.shutdown().await;

    // +5, -2, -3 downstream, so the aggregate agrees with the actor
    assert_eq!(record.aggregate(&EntityId::Platform)["totalLikes"], 0);
}

#[tokio::test]
async fn test_invalid_interactions_are_rejected_without_side_effects() {
    let (system, store) = in_memory(quiet_config());
    let client = system.client.clone();

    let err = client
        .interact(InteractionRequest::new("platform", Some("u1"), "like"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::Validation(_)));

    let err = client
        .interact(InteractionRequest::counter_delta("42", LIKES, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::Validation(_)));

    let err = client
        .interact(InteractionRequest::new("42", Some("u1"), "bookmark"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::UnknownKind(_)));

    let err = client
        .interact(InteractionRequest::new("42", None, "save"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::MissingSubject { .. }));

    let view = client.state(&EntityId::article("42"), None).await.unwrap();
    assert!(view.counts.values().all(|count| *count == 0));
    assert_eq!(client.status(&EntityId::article("42")).await.unwrap().pending, 0);
    assert_eq!(store.save_count(), 0);

    system.shutdown().await;
}

#[tokio::test]
async fn test_threshold_flushes_reach_system_of_record() {
    let mut config = quiet_config();
    config.actor.flush_threshold = 4;
    let (system, _) = in_memory(config);
    let client = system.client.clone();
    let article = EntityId::article("42");

    for _ in 0..10 {
        client
            .interact(InteractionRequest::new("42", None, "share"))
            .await
            .expect("share");
    }
    client
        .interact(InteractionRequest::counter_delta("42", VIEWS, 25))
        .await
        .expect("views");

    let expected = client.state(&article, None).await.unwrap().counts;
    let record = system.record.clone();
    system.shutdown().await;

    // 11 records in batches of at most 4
    assert_eq!(record.batch_count(), 3);
    let aggregate = record.aggregate(&article);
    assert_eq!(aggregate, expected);
    assert_eq!(aggregate[SHARES], 10);
    assert_eq!(aggregate[VIEWS], 25);
}

#[tokio::test]
async fn test_state_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = EngagementConfig {
        state_dir: Some(dir.path().to_path_buf()),
        ..quiet_config()
    };
    let article = EntityId::article("42");

    let system = EngagementSystem::new(config.clone()).expect("system");
    system.client.interact(like("u1")).await.unwrap();
    system.client.interact(like("u2")).await.unwrap();
    system
        .client
        .interact(InteractionRequest::new("42", Some("u1"), "save"))
        .await
        .unwrap();
    system
        .client
        .interact(InteractionRequest::new("42", Some("u3"), "share"))
        .await
        .unwrap();
    system.shutdown().await;

    // Fresh process: new System-of-Record, snapshots on disk
    let system = EngagementSystem::new(config).expect("system");
    let view = system.client.state(&article, Some("u1")).await.unwrap();
    assert_eq!(view.counts[LIKES], 2);
    assert_eq!(view.counts[SAVES], 1);
    assert_eq!(view.counts[SHARES], 1);
    assert!(view.liked);
    assert!(view.saved);

    // Membership came back too, so a repeated like stays a no-op
    let outcome = system.client.interact(like("u2")).await.unwrap();
    assert_eq!(outcome.counts[LIKES], 2);
    system.shutdown().await;
}

#[tokio::test]
async fn test_records_survive_outage_and_restart() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
    let record = Arc::new(InMemorySystemOfRecord::new());
    let article = EntityId::article("42");

    record.set_unavailable(true);
    let system = EngagementSystem::with_parts(quiet_config(), store.clone(), record.clone());
    for subject in ["u1", "u2", "u3"] {
        system.client.interact(like(subject)).await.unwrap();
    }
    system.client.flush(&article).await.unwrap();
    system.shutdown().await;

    assert_eq!(record.batch_count(), 0);
    assert_eq!(record.aggregate(&article)[LIKES], 0);

    // The records were kept in the snapshot and are re-queued on activation
    record.set_unavailable(false);
    let system = EngagementSystem::with_parts(quiet_config(), store, record.clone());
    let status = system.client.status(&article).await.unwrap();
    assert_eq!(status.pending, 3);
    let view = system.client.state(&article, None).await.unwrap();
    assert_eq!(view.counts[LIKES], 3);
    system.shutdown().await;

    assert_eq!(record.aggregate(&article)[LIKES], 3);
    for subject in ["u1", "u2", "u3"] {
        assert!(record.is_member(&article, subject, "like"));
    }
}

#[tokio::test]
async fn test_partial_batch_failure_commits_no_record_twice() {
    let mut config = quiet_config();
    config.actor.flush_threshold = 5;
    let (system, _) = in_memory(config);
    let record = system.record.clone();
    let article = EntityId::article("42");

    record.fail_next_batch_after(2);
    for _ in 0..5 {
        system
            .client
            .interact(InteractionRequest::new("42", None, "share"))
            .await
            .unwrap();
    }
    system.shutdown().await;

    assert_eq!(record.aggregate(&article)[SHARES], 5);
}

#[tokio::test]
async fn test_new_entity_is_seeded_from_system_of_record() {
    let record = Arc::new(InMemorySystemOfRecord::new());
    let article = EntityId::article("7");

    let mut existing = EntityState::new(article.clone());
    for subject in ["a", "b"] {
        existing
            .membership
            .entry(LIKES.to_string())
            .or_default()
            .insert(subject.to_string());
    }
    existing.counts.insert(VIEWS.to_string(), 7);
    record.import(&existing);

    let system = EngagementSystem::with_parts(quiet_config(), Arc::new(MemoryStateStore::new()), record.clone());
    let client = system.client.clone();

    let view = client.state(&article, Some("a")).await.unwrap();
    assert_eq!(view.counts[LIKES], 2);
    assert_eq!(view.counts[VIEWS], 7);
    assert!(view.liked);

    let outcome = client
        .interact(InteractionRequest::new("7", Some("a"), "like"))
        .await
        .unwrap();
    assert_eq!(outcome.counts[LIKES], 2);
    let outcome = client
        .interact(InteractionRequest::new("7", Some("c"), "like"))
        .await
        .unwrap();
    assert_eq!(outcome.counts[LIKES], 3);

    let state_view = client.state(&article, None).await.unwrap();
    let mut state = EntityState::new(article.clone());
    state.counts = state_view.counts;
    state.membership.insert(
        LIKES.to_string(),
        ["a", "b", "c"].iter().map(|s| s.to_string()).collect(),
    );
    assert!(membership_consistent(&state));

    system.shutdown().await;
    assert_eq!(record.aggregate(&article)[LIKES], 3);
}

/// Seed reads fail until `failures` runs out.
struct FlakySeed {
    record: Arc<InMemorySystemOfRecord>,
    failures: AtomicUsize,
}

#[async_trait]
impl SeedSource for FlakySeed {
    async fn seed(&self, entity: &EntityId) -> Result<Option<EntitySeed>, EngagementError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngagementError::Unavailable("seed read failed".into()));
        }
        self.record.seed(entity).await
    }
}

#[tokio::test]
async fn test_failed_seed_read_is_retried_on_next_request() {
    let record = Arc::new(InMemorySystemOfRecord::new());
    let article = EntityId::article("42");
    let mut existing = EntityState::new(article.clone());
    existing
        .membership
        .insert(LIKES.to_string(), ["a", "b", "c"].iter().map(|s| s.to_string()).collect());
    record.import(&existing);

    let seed = Arc::new(FlakySeed {
        record: record.clone(),
        failures: AtomicUsize::new(1),
    });
    let client = engagement_actor::new(
        quiet_config().actor,
        Arc::new(MemoryStateStore::new()),
        record.clone(),
        EngagementContext::seeded_from(seed),
    );

    // The activation is abandoned instead of starting from zero
    let err = client.interact(like("u1")).await.unwrap_err();
    assert!(matches!(err, EngagementError::Unavailable(_)));

    let outcome = client.interact(like("u1")).await.unwrap();
    assert_eq!(outcome.counts[LIKES], 4);

    assert!(client.evict(&article).await.unwrap());
    let view = client.state(&article, Some("a")).await.unwrap();
    assert_eq!(view.counts[LIKES], 4);
    assert!(view.liked);
    assert_eq!(record.aggregate(&article)[LIKES], 4);
}

#[tokio::test]
async fn test_seeding_can_be_disabled() {
    let record = Arc::new(InMemorySystemOfRecord::new());
    let mut existing = EntityState::new(EntityId::article("7"));
    existing.counts.insert(VIEWS.to_string(), 7);
    record.import(&existing);

    let config = EngagementConfig {
        seed_from_record: false,
        ..quiet_config()
    };
    let system = EngagementSystem::with_parts(config, Arc::new(MemoryStateStore::new()), record);
    let view = system.client.state(&EntityId::article("7"), None).await.unwrap();
    assert_eq!(view.counts[VIEWS], 0);
    system.shutdown().await;
}

#[tokio::test]
async fn test_subscriber_gets_snapshot_then_deltas() {
    let (system, _) = in_memory(quiet_config());
    let client = system.client.clone();
    let article = EntityId::article("42");

    let mut live = client.subscribe(&article).await.unwrap();
    match live.recv().await {
        Some(LiveUpdate::Snapshot { entity_id, counts, .. }) => {
            assert_eq!(entity_id, article);
            assert_eq!(counts[LIKES], 0);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    client.interact(like("u1")).await.unwrap();
    match live.recv().await {
        Some(LiveUpdate::Delta { changed, .. }) => {
            assert_eq!(changed.len(), 1);
            assert_eq!(changed[LIKES], 1);
        }
        other => panic!("expected delta, got {other:?}"),
    }

    // A no-op is not broadcast
    client.interact(like("u1")).await.unwrap();
    assert!(live.try_recv().is_none());

    assert_eq!(client.status(&article).await.unwrap().subscribers, 1);
    assert!(client.unsubscribe(&article, live.id).await.unwrap());
    assert_eq!(client.status(&article).await.unwrap().subscribers, 0);

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_actor_is_evicted_and_rehydrated() {
    let config = EngagementConfig {
        actor: ActorConfig {
            flush_interval: Duration::from_secs(3),
            idle_timeout: Some(Duration::from_secs(60)),
            ..ActorConfig::default()
        },
        ..EngagementConfig::default()
    };
    let (system, store) = in_memory(config);
    let client = system.client.clone();
    let article = EntityId::article("42");

    client.interact(like("u1")).await.unwrap();
    assert_eq!(client.active_actors().await, 1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(client.active_actors().await, 0);
    assert_eq!(system.record.aggregate(&article)[LIKES], 1);
    assert!(store.save_count() >= 1);

    // Next request re-activates from the snapshot
    let view = client.state(&article, Some("u1")).await.unwrap();
    assert_eq!(view.counts[LIKES], 1);
    assert!(view.liked);
    assert_eq!(client.active_actors().await, 1);

    system.shutdown().await;
}

#[tokio::test]
async fn test_evict_flushes_and_reports_activity() {
    let (system, _) = in_memory(quiet_config());
    let client = system.client.clone();
    let article = EntityId::article("42");

    assert!(!client.evict(&article).await.unwrap());

    client.interact(like("u1")).await.unwrap();
    assert!(client.evict(&article).await.unwrap());
    assert_eq!(system.record.aggregate(&article)[LIKES], 1);
    assert_eq!(client.active_actors().await, 0);

    system.shutdown().await;
}

#[tokio::test]
async fn test_entities_are_independent() {
    let (system, _) = in_memory(quiet_config());
    let client = system.client.clone();

    let mut tasks = Vec::new();
    for article in 0..8 {
        for subject in 0..5 {
            let client = client.clone();
            tasks.push(tokio::spawn(async move {
                client
                    .interact(InteractionRequest::new(
                        article.to_string(),
                        Some(format!("u{subject}").as_str()),
                        "like",
                    ))
                    .await
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(client.active_actors().await, 8);
    for article in 0..8 {
        let view = client
            .state(&EntityId::article(article.to_string()), None)
            .await
            .unwrap();
        assert_eq!(view.counts[LIKES], 5);
    }

    system.shutdown().await;
}
