//! Leaf animation policies
//!
//! A leaf is the part of an animation that actually does something over
//! time. The tree owns the bookkeeping (state, loops, direction, clock
//! registration); a [`LeafAnimation`] only supplies its duration and reacts
//! to the local time the tree computes for it.

use crate::job::{AnimationState, Direction};
use cadence_core::PropertyKey;
use std::any::Any;

/// Result of advancing a leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafStep {
    /// Keep running
    Continue,
    /// The leaf is done and the tree should stop it.
    ///
    /// Uncontrolled leaves (duration `-1`) use this to signal completion.
    Finished,
}

/// Behaviour of a leaf node in the animation tree
pub trait LeafAnimation: Any {
    /// Duration of one loop in ms, `-1` when unbounded
    fn duration(&self) -> i32;

    /// Apply the animation at `current_time` within the current loop
    fn update_current_time(&mut self, current_time: i32) -> LeafStep;

    fn update_state(&mut self, _new_state: AnimationState, _old_state: AnimationState) {}

    fn update_direction(&mut self, _direction: Direction) {}

    /// The top-level animation this leaf belongs to entered a new loop
    fn top_level_loop_changed(&mut self) {}

    /// Pause leaves only occupy time. The clock counts them separately.
    fn is_pause(&self) -> bool {
        false
    }

    /// Property this leaf drives, for conflict resolution
    fn property_key(&self) -> Option<PropertyKey> {
        None
    }

    /// Whether the animated target still exists
    fn is_target_valid(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A leaf that does nothing for `duration` ms
#[derive(Clone, Copy, Debug)]
pub struct PauseAnimation {
    duration: i32,
}

impl PauseAnimation {
    pub fn new(duration: i32) -> Self {
        Self {
            duration: sanitize_duration(duration, "PauseAnimation"),
        }
    }

    pub fn set_duration(&mut self, duration: i32) {
        if duration < 0 {
            tracing::warn!(
                target: "cadence_animation::usage",
                duration,
                "PauseAnimation: cannot set a negative duration"
            );
            return;
        }
        self.duration = duration;
    }
}

impl LeafAnimation for PauseAnimation {
    fn duration(&self) -> i32 {
        self.duration
    }

    fn update_current_time(&mut self, _current_time: i32) -> LeafStep {
        LeafStep::Continue
    }

    fn is_pause(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Negative durations are a usage error and fall back to zero
pub(crate) fn sanitize_duration(duration: i32, kind: &'static str) -> i32 {
    if duration < 0 {
        tracing::warn!(
            target: "cadence_animation::usage",
            duration,
            "{}: cannot set a negative duration",
            kind
        );
        0
    } else {
        duration
    }
}
