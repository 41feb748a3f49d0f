//! Shared error type for the authoring core.

use crate::value::ValueKind;

/// Error kinds surfaced by core operations.
///
/// Edit operations return these and leave the project unchanged; the player
/// never surfaces them (unresolved tracks are skipped per tick).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CoreError {
    /// Sample rate does not divide the tick base or is not positive.
    #[error("invalid sample rate: {rate}")]
    InvalidSampleRate { rate: i32 },

    /// Declared value type differs from what the target or payload carries.
    #[error("type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// No track with the given id.
    #[error("track not found: {id}")]
    TrackNotFound { id: String },

    /// A sibling with the same name and a compatible type already exists.
    #[error("duplicate track name: {name}")]
    DuplicateName { name: String },

    /// The track is locked against mutation.
    #[error("track is locked: {id}")]
    Locked { id: String },

    /// Reparenting would make a track its own ancestor.
    #[error("reparenting {id} would create a cycle")]
    CyclicParent { id: String },

    /// Time outside the clip duration where the operation disallows it.
    #[error("time {ticks} ticks is out of range")]
    OutOfRange { ticks: i64 },

    /// Malformed serialized payload.
    #[error("decode error: {reason}")]
    Decode { reason: String },

    /// Property write attempted while no binding is resolvable.
    #[error("no binding resolvable for track {id}")]
    NotBound { id: String },
}

impl CoreError {
    pub fn decode(reason: impl Into<String>) -> Self {
        CoreError::Decode {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Decode {
            reason: err.to_string(),
        }
    }
}
