use super::{EntitySeed, SeedSource};
use crate::engagement_actor::EngagementError;
use crate::model::{EntityId, EntityState, InteractionKind, InteractionRecord, ARTICLE_COUNTERS, LIKES, SAVES};
use async_trait::async_trait;
use entity_actor::{RecordSink, SinkError};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// `(subject_id, entity_id, kind)`
type MembershipRow = (String, EntityId, &'static str);

#[derive(Default)]
struct Tables {
    membership: BTreeSet<MembershipRow>,
    counters: BTreeMap<EntityId, BTreeMap<String, u64>>,
    applied: HashSet<Uuid>,
}

impl Tables {
    fn apply(&mut self, record: &InteractionRecord) {
        let row = |kind| (record.subject_id.clone(), record.entity_id.clone(), kind);
        match &record.kind {
            InteractionKind::Like => {
                self.membership.insert(row("like"));
            }
            InteractionKind::Unlike => {
                self.membership.remove(&row("like"));
            }
            InteractionKind::Save => {
                self.membership.insert(row("save"));
            }
            InteractionKind::Unsave => {
                self.membership.remove(&row("save"));
            }
            InteractionKind::Share => {
                if self.applied.insert(record.id) {
                    self.add(&record.entity_id, "shares", 1);
                }
            }
            InteractionKind::CounterDelta { metric, value } => {
                if self.applied.insert(record.id) {
                    self.add(&record.entity_id, metric, *value);
                }
            }
        }
    }

    fn add(&mut self, entity: &EntityId, counter: &str, delta: i64) {
        let value = self
            .counters
            .entry(entity.clone())
            .or_default()
            .entry(counter.to_string())
            .or_insert(0);
        *value = value.saturating_add_signed(delta);
    }

    fn members(&self, entity: &EntityId, kind: &str) -> BTreeSet<String> {
        self.membership
            .iter()
            .filter(|(_, e, k)| e == entity && *k == kind)
            .map(|(subject, _, _)| subject.clone())
            .collect()
    }

    fn knows(&self, entity: &EntityId) -> bool {
        self.counters.contains_key(entity) || self.membership.iter().any(|(_, e, _)| e == entity)
    }
}

/// In-process System-of-Record.
///
/// Stands in for the relational database in tests and in the demo binary. Supports
/// fault injection so the write-behind retry paths can be exercised.
pub struct InMemorySystemOfRecord {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    /// Next batch commits this many records, then fails. `usize::MAX` means disarmed.
    partial: AtomicUsize,
    batches: AtomicUsize,
}

impl InMemorySystemOfRecord {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            unavailable: AtomicBool::new(false),
            partial: AtomicUsize::new(usize::MAX),
            batches: AtomicUsize::new(0),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While set, every batch fails without committing anything.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next batch fail after committing `committed` records. A shorter batch
    /// consumes the injection and succeeds.
    pub fn fail_next_batch_after(&self, committed: usize) {
        self.partial.store(committed, Ordering::SeqCst);
    }

    /// Batches fully committed so far.
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Counts as analytics would compute them: toggle counters from membership rows,
    /// everything else from the counter table.
    pub fn aggregate(&self, entity: &EntityId) -> BTreeMap<String, u64> {
        let tables = self.tables();
        let mut counts = BTreeMap::new();
        if !entity.is_platform() {
            for counter in ARTICLE_COUNTERS {
                counts.insert(counter.to_string(), 0);
            }
            counts.insert(LIKES.to_string(), tables.members(entity, "like").len() as u64);
            counts.insert(SAVES.to_string(), tables.members(entity, "save").len() as u64);
        }
        if let Some(counters) = tables.counters.get(entity) {
            counts.extend(counters.iter().map(|(name, value)| (name.clone(), *value)));
        }
        counts
    }

    pub fn is_member(&self, entity: &EntityId, subject: &str, kind: &'static str) -> bool {
        let row = (subject.to_string(), entity.clone(), kind);
        self.tables().membership.contains(&row)
    }

    /// Loads rows directly, bypassing the actors. Used to model pre-existing data.
    pub fn import(&self, state: &EntityState) {
        let mut tables = self.tables();
        for (counter, kind) in [(LIKES, "like"), (SAVES, "save")] {
            if let Some(members) = state.membership.get(counter) {
                for subject in members {
                    tables
                        .membership
                        .insert((subject.clone(), state.entity_id.clone(), kind));
                }
            }
        }
        let counters = tables.counters.entry(state.entity_id.clone()).or_default();
        for (name, value) in &state.counts {
            if name != LIKES && name != SAVES {
                counters.insert(name.clone(), *value);
            }
        }
    }
}

impl Default for InMemorySystemOfRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSink<EntityState> for InMemorySystemOfRecord {
    async fn write_batch(&self, entity: &EntityId, records: &[InteractionRecord]) -> Result<(), SinkError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SinkError::new(0, "system of record unavailable"));
        }
        let partial = self.partial.swap(usize::MAX, Ordering::SeqCst);

        let mut tables = self.tables();
        for (index, record) in records.iter().enumerate() {
            if index == partial {
                return Err(SinkError::new(index, "injected failure"));
            }
            tables.apply(record);
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        debug!(%entity, records = records.len(), "Batch committed");
        Ok(())
    }
}

#[async_trait]
impl SeedSource for InMemorySystemOfRecord {
    async fn seed(&self, entity: &EntityId) -> Result<Option<EntitySeed>, EngagementError> {
        let known = self.tables().knows(entity);
        if !known {
            return Ok(None);
        }
        let counts = self.aggregate(entity);
        let tables = self.tables();
        let mut membership = BTreeMap::new();
        if !entity.is_platform() {
            membership.insert(LIKES.to_string(), tables.members(entity, "like"));
            membership.insert(SAVES.to_string(), tables.members(entity, "save"));
        }
        Ok(Some(EntitySeed { counts, membership }))
    }
}
