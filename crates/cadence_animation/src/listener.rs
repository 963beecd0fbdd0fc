//! Change listeners
//!
//! Listeners are observers the tree does not own. They are stored as weak
//! references together with the set of changes they subscribed to, and are
//! called synchronously in registration order. Each callback receives the
//! tree so it may start, stop or restructure animations re-entrantly.

use crate::job::{AnimationId, AnimationState};
use crate::AnimationTree;
use bitflags::bitflags;
use std::rc::Weak;

bitflags! {
    /// Kinds of change a listener can subscribe to
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ChangeTypes: u8 {
        const COMPLETION = 0x01;
        const STATE_CHANGE = 0x02;
        const CURRENT_LOOP = 0x04;
        const CURRENT_TIME = 0x08;
    }
}

/// Observer of animation changes. Every method is optional.
pub trait AnimationListener {
    /// The animation ran to its natural end
    fn animation_finished(&self, _tree: &mut AnimationTree, _id: AnimationId) {}

    fn animation_state_changed(
        &self,
        _tree: &mut AnimationTree,
        _id: AnimationId,
        _new_state: AnimationState,
        _old_state: AnimationState,
    ) {
    }

    fn animation_current_loop_changed(&self, _tree: &mut AnimationTree, _id: AnimationId) {}

    fn animation_current_time_changed(
        &self,
        _tree: &mut AnimationTree,
        _id: AnimationId,
        _current_time: i32,
    ) {
    }
}

pub(crate) struct ListenerEntry {
    pub(crate) listener: Weak<dyn AnimationListener>,
    pub(crate) types: ChangeTypes,
}
