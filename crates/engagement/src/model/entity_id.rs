use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Wire name of the platform-wide sentinel.
pub const PLATFORM: &str = "platform";

/// Addresses one engagement actor.
///
/// On the wire an entity is a plain string: `"platform"` selects the platform-wide
/// instance, anything else is an article id. The `Display` form (`article:42`,
/// `platform`) is unambiguous and keys the actor's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityId {
    Article(String),
    Platform,
}

impl EntityId {
    pub fn article(id: impl Into<String>) -> Self {
        EntityId::Article(id.into())
    }

    pub fn is_platform(&self) -> bool {
        matches!(self, EntityId::Platform)
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Article(id) => write!(f, "article:{id}"),
            EntityId::Platform => f.write_str(PLATFORM),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entity id must not be empty")]
pub struct EmptyEntityId;

impl FromStr for EntityId {
    type Err = EmptyEntityId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(EmptyEntityId),
            PLATFORM => Ok(EntityId::Platform),
            id => Ok(EntityId::Article(id.to_string())),
        }
    }
}
