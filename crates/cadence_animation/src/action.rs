//! Zero-length animation running a callback

use crate::job::AnimationState;
use crate::leaf::{LeafAnimation, LeafStep};
use std::any::Any;
use std::fmt;

/// Runs an action each time it starts running.
///
/// Inside a sequential group this places a side effect between two steps.
pub struct ActionAnimation {
    action: Box<dyn FnMut()>,
    runs: u32,
}

impl ActionAnimation {
    pub fn new(action: impl FnMut() + 'static) -> Self {
        Self {
            action: Box::new(action),
            runs: 0,
        }
    }

    /// How many times the action ran
    pub fn runs(&self) -> u32 {
        self.runs
    }
}

impl fmt::Debug for ActionAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionAnimation")
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

impl LeafAnimation for ActionAnimation {
    fn duration(&self) -> i32 {
        0
    }

    fn update_current_time(&mut self, _current_time: i32) -> LeafStep {
        LeafStep::Continue
    }

    fn update_state(&mut self, new_state: AnimationState, _old_state: AnimationState) {
        if new_state == AnimationState::Running {
            self.runs += 1;
            (self.action)();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerConfig;
    use crate::time_source::ManualTimeSource;
    use crate::AnimationTree;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_runs_once_and_finishes() {
        let mut tree =
            AnimationTree::with_time_source(TimerConfig::standard(), ManualTimeSource::new());
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let anim = tree.add_leaf(ActionAnimation::new(move || counter.set(counter.get() + 1)));

        tree.start(anim);
        assert_eq!(hits.get(), 1);
        assert_eq!(tree[anim].state(), AnimationState::Stopped);
        assert_eq!(tree.leaf::<ActionAnimation>(anim).map(|a| a.runs()), Some(1));
    }

    #[test]
    fn test_runs_between_sequential_steps() {
        let mut tree =
            AnimationTree::with_time_source(TimerConfig::standard(), ManualTimeSource::new());
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let group = tree.add_sequential_group();
        let before = tree.add_pause(100);
        let action = tree.add_leaf(ActionAnimation::new(move || counter.set(counter.get() + 1)));
        let after = tree.add_pause(100);
        for child in [before, action, after] {
            tree.append_animation(group, child).unwrap();
        }

        tree.start(group);
        tree.set_current_time(group, 50);
        assert_eq!(hits.get(), 0);

        tree.set_current_time(group, 150);
        assert_eq!(hits.get(), 1);
        assert_eq!(tree.current_animation(group), Some(after));
    }
}
