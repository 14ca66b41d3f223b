use super::entity_id::EntityId;
use super::state::EntityState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Message pushed to live subscribers.
///
/// A connection always receives one `Snapshot` first, then a `Delta` per applied
/// change. Deltas carry the new absolute value of every counter that changed, so a
/// client that misses nothing never has to add anything up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveUpdate {
    Snapshot {
        entity_id: EntityId,
        counts: BTreeMap<String, u64>,
        last_updated: Option<DateTime<Utc>>,
    },
    Delta {
        entity_id: EntityId,
        changed: BTreeMap<String, u64>,
        timestamp: DateTime<Utc>,
    },
}

impl LiveUpdate {
    pub fn snapshot(state: &EntityState) -> Self {
        LiveUpdate::Snapshot {
            entity_id: state.entity_id.clone(),
            counts: state.counts.clone(),
            last_updated: state.last_updated,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
