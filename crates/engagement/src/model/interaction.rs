use super::entity_id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use uuid::Uuid;

/// Subject recorded when the caller did not identify itself.
pub const ANONYMOUS: &str = "anonymous";

pub const LIKES: &str = "likes";
pub const SAVES: &str = "saves";
pub const SHARES: &str = "shares";
pub const COMMENTS: &str = "comments";
pub const VIEWS: &str = "views";

/// Counters every article starts with.
pub const ARTICLE_COUNTERS: [&str; 5] = [LIKES, SAVES, SHARES, COMMENTS, VIEWS];

/// What a subject did to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InteractionKind {
    Like,
    Unlike,
    Save,
    Unsave,
    Share,
    /// Signed adjustment of a named counter.
    CounterDelta { metric: String, value: i64 },
}

impl InteractionKind {
    /// For toggle kinds, the membership counter and whether the subject turns it on.
    pub fn toggle(&self) -> Option<(&'static str, bool)> {
        match self {
            InteractionKind::Like => Some((LIKES, true)),
            InteractionKind::Unlike => Some((LIKES, false)),
            InteractionKind::Save => Some((SAVES, true)),
            InteractionKind::Unsave => Some((SAVES, false)),
            InteractionKind::Share | InteractionKind::CounterDelta { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionKind::Like => "like",
            InteractionKind::Unlike => "unlike",
            InteractionKind::Save => "save",
            InteractionKind::Unsave => "unsave",
            InteractionKind::Share => "share",
            InteractionKind::CounterDelta { .. } => "counter-delta",
        }
    }
}

impl Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::CounterDelta { metric, value } => write!(f, "counter-delta({metric}{value:+})"),
            other => f.write_str(other.name()),
        }
    }
}

/// The action an engagement actor applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub subject_id: String,
    pub kind: InteractionKind,
    /// Free-form context, e.g. the channel of a share.
    pub metadata: BTreeMap<String, String>,
}

impl Interaction {
    pub fn new(subject_id: impl Into<String>, kind: InteractionKind) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
            metadata: BTreeMap::new(),
        }
    }

    pub fn like(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, InteractionKind::Like)
    }

    pub fn unlike(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, InteractionKind::Unlike)
    }

    pub fn save(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, InteractionKind::Save)
    }

    pub fn unsave(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, InteractionKind::Unsave)
    }

    pub fn share(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, InteractionKind::Share)
    }

    /// An anonymous counter adjustment.
    pub fn counter_delta(metric: impl Into<String>, value: i64) -> Self {
        Self::new(
            ANONYMOUS,
            InteractionKind::CounterDelta {
                metric: metric.into(),
                value,
            },
        )
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject_id == ANONYMOUS
    }
}

/// Immutable fact produced by every applied change and mirrored to the System-of-Record.
///
/// `id` makes downstream writes idempotent: a record delivered twice is applied once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub subject_id: String,
    pub kind: InteractionKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl InteractionRecord {
    pub fn new(entity_id: EntityId, interaction: Interaction, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            subject_id: interaction.subject_id,
            kind: interaction.kind,
            timestamp,
            metadata: interaction.metadata,
        }
    }
}
