use super::entity_id::EntityId;
use super::interaction::{ARTICLE_COUNTERS, LIKES, SAVES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Live counters of one entity.
///
/// # Actor Framework
/// This struct implements the [`ActorEntity`](entity_actor::ActorEntity) trait and is
/// owned by exactly one [`EntityActor`](entity_actor::EntityActor). It is also the body
/// of the snapshot envelope, so it only holds data meaningful after a restart.
///
/// For toggle counters (`likes`, `saves`) the count always equals the size of the
/// matching membership set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: EntityId,
    pub counts: BTreeMap<String, u64>,
    pub membership: BTreeMap<String, BTreeSet<String>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl EntityState {
    /// Zeroed state. Articles start with their standard counters, the platform with none.
    pub fn new(entity_id: EntityId) -> Self {
        let mut counts = BTreeMap::new();
        let mut membership = BTreeMap::new();
        if !entity_id.is_platform() {
            for counter in ARTICLE_COUNTERS {
                counts.insert(counter.to_string(), 0);
            }
            for counter in [LIKES, SAVES] {
                membership.insert(counter.to_string(), BTreeSet::new());
            }
        }
        Self {
            entity_id,
            counts,
            membership,
            last_updated: None,
        }
    }

    pub fn count(&self, counter: &str) -> u64 {
        self.counts.get(counter).copied().unwrap_or(0)
    }

    pub fn is_member(&self, counter: &str, subject: &str) -> bool {
        self.membership
            .get(counter)
            .is_some_and(|members| members.contains(subject))
    }

    /// Read model for one (optional) viewer.
    pub fn view(&self, subject: Option<&str>) -> StateView {
        let member = |counter| subject.is_some_and(|s| self.is_member(counter, s));
        StateView {
            entity_id: self.entity_id.clone(),
            counts: self.counts.clone(),
            liked: member(LIKES),
            saved: member(SAVES),
            last_updated: self.last_updated,
        }
    }
}

/// Reply to a successful interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub counts: BTreeMap<String, u64>,
    /// Whether the acting subject is now in the toggled set. `false` for non-toggle kinds.
    pub member: bool,
}

/// Counts of an entity as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub entity_id: EntityId,
    pub counts: BTreeMap<String, u64>,
    pub liked: bool,
    pub saved: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_starts_with_zeroed_counters() {
        let state = EntityState::new(EntityId::article("42"));
        assert_eq!(state.counts.len(), 5);
        assert!(state.counts.values().all(|c| *c == 0));
        assert!(state.last_updated.is_none());
    }

    #[test]
    fn test_platform_starts_empty() {
        let state = EntityState::new(EntityId::Platform);
        assert!(state.counts.is_empty());
        assert!(state.membership.is_empty());
        assert_eq!(state.count("totalUsers"), 0);
    }

    #[test]
    fn test_view_reports_membership_for_subject_only() {
        let mut state = EntityState::new(EntityId::article("1"));
        state.membership.get_mut(LIKES).unwrap().insert("u1".to_string());
        state.counts.insert(LIKES.to_string(), 1);

        assert!(state.view(Some("u1")).liked);
        assert!(!state.view(Some("u2")).liked);
        assert!(!state.view(None).liked);
        assert!(!state.view(Some("u1")).saved);
    }
}
