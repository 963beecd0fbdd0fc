//! Animation runtime error types

use crate::job::{AnimationId, AnimationState};
use cadence_core::PropertyError;
use thiserror::Error;

/// Errors surfaced by fallible animation tree operations.
///
/// None of these escape the state machine itself: transitions triggered
/// from inside ticks or hooks absorb them and only log.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// The id does not refer to a live animation in this tree
    #[error("Unknown animation: {0:?}")]
    UnknownAnimation(AnimationId),

    /// A state change that the current state does not allow
    #[error("Cannot {action} an animation that is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: AnimationState,
    },

    /// A group operation on a leaf animation
    #[error("Animation is not a group: {0:?}")]
    NotAGroup(AnimationId),

    /// The animation does not belong to the given group
    #[error("Animation {child:?} is not a child of {group:?}")]
    NotAChild {
        group: AnimationId,
        child: AnimationId,
    },

    /// Inserting the animation would make a group contain itself
    #[error("Animation {child:?} cannot be added to its own subtree {group:?}")]
    GroupCycle {
        group: AnimationId,
        child: AnimationId,
    },

    /// Property handle rejected the animation
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    /// Invalid timer configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
