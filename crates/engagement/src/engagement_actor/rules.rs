//! Which interactions an entity accepts.
//!
//! Checked before anything is mutated, so a rejected interaction has no side effects.

use super::error::EngagementError;
use crate::model::{EntityId, Interaction, InteractionKind, COMMENTS, SHARES, VIEWS};

/// Counters an article accepts raw deltas for. Toggle counters are excluded so that
/// `likes` and `saves` always match their membership sets.
pub const ARTICLE_DELTA_METRICS: [&str; 3] = [COMMENTS, SHARES, VIEWS];

const MAX_METRIC_LEN: usize = 64;

pub fn validate(entity: &EntityId, interaction: &Interaction) -> Result<(), EngagementError> {
    let kind = &interaction.kind;
    if interaction.subject_id.trim().is_empty() || (kind.toggle().is_some() && interaction.is_anonymous()) {
        return Err(EngagementError::MissingSubject {
            kind: kind.name().to_string(),
        });
    }

    match (entity, kind) {
        (_, InteractionKind::CounterDelta { metric, value }) => {
            validate_metric(metric)?;
            if *value == 0 {
                return Err(EngagementError::Validation(format!("delta for '{metric}' is zero")));
            }
            if !entity.is_platform() && !ARTICLE_DELTA_METRICS.contains(&metric.as_str()) {
                return Err(EngagementError::Validation(format!(
                    "articles accept deltas only for {}, not '{metric}'",
                    ARTICLE_DELTA_METRICS.join(", ")
                )));
            }
            Ok(())
        }
        (EntityId::Platform, other) => Err(EngagementError::Validation(format!(
            "platform accepts only counter-delta, got '{}'",
            other.name()
        ))),
        (EntityId::Article(_), _) => Ok(()),
    }
}

fn validate_metric(metric: &str) -> Result<(), EngagementError> {
    let mut chars = metric.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid = starts_with_letter
        && metric.len() <= MAX_METRIC_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EngagementError::Validation(format!("invalid metric name '{metric}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ANONYMOUS;

    fn article() -> EntityId {
        EntityId::article("42")
    }

    #[test]
    fn test_toggle_requires_identified_subject() {
        assert!(validate(&article(), &Interaction::like("u1")).is_ok());
        assert!(matches!(
            validate(&article(), &Interaction::like(ANONYMOUS)),
            Err(EngagementError::MissingSubject { kind }) if kind == "like"
        ));
        assert!(matches!(
            validate(&article(), &Interaction::share("")),
            Err(EngagementError::MissingSubject { .. })
        ));
        assert!(validate(&article(), &Interaction::share(ANONYMOUS)).is_ok());
    }

    #[test]
    fn test_platform_accepts_only_deltas() {
        assert!(validate(&EntityId::Platform, &Interaction::counter_delta("totalUsers", 1)).is_ok());
        assert!(matches!(
            validate(&EntityId::Platform, &Interaction::like("u1")),
            Err(EngagementError::Validation(_))
        ));
    }

    #[test]
    fn test_article_deltas_exclude_toggle_counters() {
        assert!(validate(&article(), &Interaction::counter_delta("views", 1)).is_ok());
        assert!(validate(&article(), &Interaction::counter_delta("comments", -1)).is_ok());
        assert!(validate(&article(), &Interaction::counter_delta("likes", 1)).is_err());
        assert!(validate(&article(), &Interaction::counter_delta("totalUsers", 1)).is_err());
    }

    #[test]
    fn test_metric_names_and_zero_delta() {
        let platform = EntityId::Platform;
        assert!(validate(&platform, &Interaction::counter_delta("page_views_2", 1)).is_ok());
        assert!(validate(&platform, &Interaction::counter_delta("2fast", 1)).is_err());
        assert!(validate(&platform, &Interaction::counter_delta("bad-name", 1)).is_err());
        assert!(validate(&platform, &Interaction::counter_delta("", 1)).is_err());
        assert!(validate(&platform, &Interaction::counter_delta("a".repeat(65), 1)).is_err());
        assert!(validate(&platform, &Interaction::counter_delta("a".repeat(64), 1)).is_ok());
        assert!(validate(&platform, &Interaction::counter_delta("totalLikes", 0)).is_err());
    }
}
