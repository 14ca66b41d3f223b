use super::error::EngagementError;
use super::rules::validate;
use super::EngagementContext;
use crate::model::{
    ApplyOutcome, EntityId, EntityState, Interaction, InteractionKind, InteractionRecord, LiveUpdate, LIKES, SAVES,
    SHARES,
};
use async_trait::async_trait;
use chrono::Utc;
use entity_actor::{ActorEntity, Applied};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Implementation of the [`ActorEntity`] trait for [`EntityState`].
///
/// - **Action**: an [`Interaction`], validated by [`validate`] before anything changes.
/// - **Record**: one [`InteractionRecord`] per real change, with the *effective* delta.
/// - **Update**: [`LiveUpdate::Delta`] with the changed counters' new values.
/// - **Context**: [`EngagementContext`], used to seed an entity with no snapshot.
#[async_trait]
impl ActorEntity for EntityState {
    type Id = EntityId;
    type Action = Interaction;
    type ActionResult = ApplyOutcome;
    type Record = InteractionRecord;
    type Update = LiveUpdate;
    type Context = EngagementContext;
    type Error = EngagementError;

    fn initial(id: &EntityId) -> Self {
        EntityState::new(id.clone())
    }

    /// Seeds a fresh entity from the System-of-Record. A local snapshot always wins.
    async fn on_hydrate(&mut self, restored: bool, ctx: &EngagementContext) -> Result<(), EngagementError> {
        if restored {
            return Ok(());
        }
        let Some(source) = &ctx.seed else {
            return Ok(());
        };
        let Some(seed) = source.seed(&self.entity_id).await? else {
            return Ok(());
        };

        self.counts.extend(seed.counts);
        for (counter, members) in seed.membership {
            self.counts.insert(counter.clone(), members.len() as u64);
            self.membership.insert(counter, members);
        }
        info!(id = %self.entity_id, counts = ?self.counts, "Seeded from system of record");
        Ok(())
    }

    async fn handle_action(
        &mut self,
        interaction: Interaction,
        _ctx: &EngagementContext,
    ) -> Result<Applied<Self>, EngagementError> {
        validate(&self.entity_id, &interaction)?;

        let mut changed = BTreeMap::new();
        let mut member = false;
        let mut recorded = interaction.clone();

        match &interaction.kind {
            InteractionKind::Like | InteractionKind::Unlike | InteractionKind::Save | InteractionKind::Unsave => {
                if let Some((counter, on)) = interaction.kind.toggle() {
                    let subject = &interaction.subject_id;
                    let transitioned = if on {
                        self.membership
                            .entry(counter.to_string())
                            .or_default()
                            .insert(subject.clone())
                    } else {
                        self.membership
                            .get_mut(counter)
                            .is_some_and(|members| members.remove(subject))
                    };
                    member = self.is_member(counter, subject);
                    if transitioned {
                        let count = self.membership.get(counter).map_or(0, |m| m.len() as u64);
                        self.counts.insert(counter.to_string(), count);
                        changed.insert(counter.to_string(), count);
                    }
                }
            }
            InteractionKind::Share => {
                let count = self.count(SHARES) + 1;
                self.counts.insert(SHARES.to_string(), count);
                changed.insert(SHARES.to_string(), count);
            }
            InteractionKind::CounterDelta { metric, value } => {
                let current = self.count(metric);
                let next = current.saturating_add_signed(*value);
                if next != current {
                    self.counts.insert(metric.clone(), next);
                    changed.insert(metric.clone(), next);
                    // Clamped deltas are mirrored downstream as what was actually applied.
                    let effective = next as i64 - current as i64;
                    recorded.kind = InteractionKind::CounterDelta {
                        metric: metric.clone(),
                        value: effective,
                    };
                }
            }
        }

        if changed.is_empty() {
            debug!(id = %self.entity_id, kind = %interaction.kind, "No-op");
            return Ok(Applied::unchanged(ApplyOutcome {
                counts: self.counts.clone(),
                member,
            }));
        }

        let now = Utc::now();
        self.last_updated = Some(now);
        let record = InteractionRecord::new(self.entity_id.clone(), recorded, now);
        let update = LiveUpdate::Delta {
            entity_id: self.entity_id.clone(),
            changed,
            timestamp: now,
        };
        Ok(Applied::changed(
            ApplyOutcome {
                counts: self.counts.clone(),
                member,
            },
            record,
            update,
        ))
    }

    fn sync_update(&self) -> LiveUpdate {
        LiveUpdate::snapshot(self)
    }
}

/// `count == |membership|` for both toggle counters.
pub fn membership_consistent(state: &EntityState) -> bool {
    [LIKES, SAVES].iter().all(|counter| {
        let members = state.membership.get(*counter).map_or(0, |m| m.len() as u64);
        state.count(counter) == members
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ANONYMOUS;

    fn ctx() -> EngagementContext {
        EngagementContext::default()
    }

    async fn apply(state: &mut EntityState, interaction: Interaction) -> Applied<EntityState> {
        state.handle_action(interaction, &ctx()).await.unwrap()
    }

    #[tokio::test]
    async fn test_like_is_idempotent_per_subject() {
        let mut state = EntityState::new(EntityId::article("42"));

        let first = apply(&mut state, Interaction::like("u1")).await;
        assert!(first.is_change());
        assert_eq!(first.result.counts["likes"], 1);
        assert!(first.result.member);

        let again = apply(&mut state, Interaction::like("u1")).await;
        assert!(!again.is_change());
        assert_eq!(again.result.counts["likes"], 1);
        assert!(again.result.member);

        let unlike = apply(&mut state, Interaction::unlike("u1")).await;
        assert!(unlike.is_change());
        assert_eq!(unlike.result.counts["likes"], 0);
        assert!(!unlike.result.member);
    }

    #[tokio::test]
    async fn test_unlike_from_non_member_is_noop() {
        let mut state = EntityState::new(EntityId::article("42"));
        let before = state.clone();

        let applied = apply(&mut state, Interaction::unsave("u1")).await;

        assert!(!applied.is_change());
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_toggle_parity_holds_for_any_sequence() {
        let mut state = EntityState::new(EntityId::article("p"));
        let script = [
            ("u1", true),
            ("u2", true),
            ("u1", true),
            ("u1", false),
            ("u3", false),
            ("u2", false),
            ("u2", true),
            ("u1", true),
            ("u1", false),
        ];
        for (subject, like) in script {
            let interaction = if like {
                Interaction::like(subject)
            } else {
                Interaction::unlike(subject)
            };
            apply(&mut state, interaction).await;
            assert!(membership_consistent(&state));
        }
        assert!(!state.is_member(LIKES, "u1"));
        assert!(state.is_member(LIKES, "u2"));
        assert_eq!(state.count(LIKES), 1);
    }

    #[tokio::test]
    async fn test_platform_delta_clamps_and_records_effective_value() {
        let mut state = EntityState::new(EntityId::Platform);

        apply(&mut state, Interaction::counter_delta("totalLikes", 5)).await;
        let down = apply(&mut state, Interaction::counter_delta("totalLikes", -2)).await;
        assert_eq!(down.result.counts["totalLikes"], 3);
        assert!(!down.result.member);

        let clamped = apply(&mut state, Interaction::counter_delta("totalLikes", -10)).await;
        assert_eq!(clamped.result.counts["totalLikes"], 0);
        let change = clamped.change.unwrap();
        assert_eq!(
            change.record.kind,
            InteractionKind::CounterDelta {
                metric: "totalLikes".to_string(),
                value: -3
            }
        );

        let floor = apply(&mut state, Interaction::counter_delta("totalLikes", -1)).await;
        assert!(!floor.is_change(), "a delta that clamps to the current value changes nothing");
    }

    #[tokio::test]
    async fn test_change_produces_record_and_delta_update() {
        let mut state = EntityState::new(EntityId::article("42"));
        let applied = apply(&mut state, Interaction::share(ANONYMOUS).with_metadata("channel", "email")).await;

        let change = applied.change.unwrap();
        assert_eq!(change.record.entity_id, EntityId::article("42"));
        assert_eq!(change.record.metadata["channel"], "email");
        assert_eq!(Some(change.record.timestamp), state.last_updated);
        match change.update {
            LiveUpdate::Delta { changed, .. } => assert_eq!(changed, BTreeMap::from([("shares".to_string(), 1)])),
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_interaction_leaves_state_untouched() {
        let mut state = EntityState::new(EntityId::article("42"));
        let before = state.clone();

        let err = state
            .handle_action(Interaction::like(ANONYMOUS), &ctx())
            .await
            .unwrap_err();

        assert!(matches!(err, EngagementError::MissingSubject { .. }));
        assert_eq!(state, before);
    }
}
