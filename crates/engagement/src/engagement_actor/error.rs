//! Error types for the engagement actor.

use entity_actor::FrameworkError;
use thiserror::Error;

/// Errors surfaced to callers of the engagement API.
///
/// Persistence problems never show up here: snapshot and flush failures are retried
/// by the actor and only logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngagementError {
    /// The interaction is malformed or not allowed on this entity.
    #[error("Invalid interaction: {0}")]
    Validation(String),

    /// The subject is empty, or anonymous on a kind that tracks membership.
    #[error("Interaction '{kind}' requires an identified subject")]
    MissingSubject { kind: String },

    #[error("Unknown interaction kind '{0}'")]
    UnknownKind(String),

    /// The entity's actor could not be reached or could not hydrate.
    #[error("Engagement service unavailable: {0}")]
    Unavailable(String),
}

impl From<FrameworkError> for EngagementError {
    fn from(e: FrameworkError) -> Self {
        match e {
            FrameworkError::EntityError(inner) => match inner.downcast::<EngagementError>() {
                Ok(domain) => *domain,
                Err(other) => EngagementError::Unavailable(other.to_string()),
            },
            other => EngagementError::Unavailable(other.to_string()),
        }
    }
}
