use super::entity_id::EntityId;
use super::interaction::{Interaction, InteractionKind, ANONYMOUS};
use crate::engagement_actor::EngagementError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inbound interaction as submitted by an outer surface (HTTP, queue consumer, ...).
///
/// Everything is loosely typed here; [`InteractionRequest::parse`] turns it into an
/// addressed [`Interaction`] or a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub entity_id: String,
    #[serde(default)]
    pub subject_id: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl InteractionRequest {
    pub fn new(entity_id: impl Into<String>, subject_id: Option<&str>, kind: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            subject_id: subject_id.map(str::to_string),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn counter_delta(entity_id: impl Into<String>, metric: impl Into<String>, value: i64) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: "counter-delta".to_string(),
            metric: Some(metric.into()),
            value: Some(value),
            ..Self::default()
        }
    }

    /// Resolves the target entity and the interaction to apply.
    ///
    /// A missing subject becomes the anonymous placeholder; a present but blank one is
    /// rejected. Domain rules (which kinds an entity accepts) are checked by the actor.
    pub fn parse(self) -> Result<(EntityId, Interaction), EngagementError> {
        let entity_id: EntityId = self
            .entity_id
            .parse()
            .map_err(|e| EngagementError::Validation(format!("{e}")))?;

        let kind = match self.kind.trim() {
            "like" => InteractionKind::Like,
            "unlike" => InteractionKind::Unlike,
            "save" => InteractionKind::Save,
            "unsave" => InteractionKind::Unsave,
            "share" => InteractionKind::Share,
            "counter-delta" => {
                let metric = self
                    .metric
                    .ok_or_else(|| EngagementError::Validation("counter-delta requires a metric".to_string()))?;
                let value = self
                    .value
                    .ok_or_else(|| EngagementError::Validation("counter-delta requires a value".to_string()))?;
                InteractionKind::CounterDelta { metric, value }
            }
            other => return Err(EngagementError::UnknownKind(other.to_string())),
        };

        let subject_id = match self.subject_id {
            None => ANONYMOUS.to_string(),
            Some(subject) if subject.trim().is_empty() => {
                return Err(EngagementError::MissingSubject {
                    kind: kind.name().to_string(),
                })
            }
            Some(subject) => subject.trim().to_string(),
        };

        Ok((
            entity_id,
            Interaction {
                subject_id,
                kind,
                metadata: self.metadata,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_like_for_article() {
        let (id, interaction) = InteractionRequest::new(" 42 ", Some("u1"), "like").parse().unwrap();
        assert_eq!(id, EntityId::article("42"));
        assert_eq!(interaction, Interaction::like("u1"));
    }

    #[test]
    fn test_parse_platform_delta_defaults_to_anonymous() {
        let (id, interaction) = InteractionRequest::counter_delta("platform", "totalLikes", 5)
            .parse()
            .unwrap();
        assert_eq!(id, EntityId::Platform);
        assert_eq!(interaction, Interaction::counter_delta("totalLikes", 5));
    }

    #[test]
    fn test_parse_rejections() {
        assert!(matches!(
            InteractionRequest::new("42", Some("u1"), "poke").parse(),
            Err(EngagementError::UnknownKind(kind)) if kind == "poke"
        ));
        assert!(matches!(
            InteractionRequest::new("", Some("u1"), "like").parse(),
            Err(EngagementError::Validation(_))
        ));
        assert!(matches!(
            InteractionRequest::new("42", Some("  "), "like").parse(),
            Err(EngagementError::MissingSubject { .. })
        ));
        let missing_value = InteractionRequest {
            value: None,
            ..InteractionRequest::counter_delta("platform", "x", 1)
        };
        assert!(matches!(missing_value.parse(), Err(EngagementError::Validation(_))));
    }

    #[test]
    fn test_deserialize_from_json() {
        let request: InteractionRequest =
            serde_json::from_str(r#"{"entity_id":"42","subject_id":"u9","kind":"share","metadata":{"channel":"email"}}"#)
                .unwrap();
        let (_, interaction) = request.parse().unwrap();
        assert_eq!(interaction.kind, InteractionKind::Share);
        assert_eq!(interaction.metadata.get("channel").map(String::as_str), Some("email"));
    }
}
