//! Sequential groups
//!
//! Children run one after another. Exactly one child is current; the group's
//! loop time is mapped onto the child that owns it, and every child skipped
//! over on the way is fast-forwarded (or rewound) to its edge so its side
//! effects land in order.
//!
//! The duration is the sum of the children's total durations, or `-1` as soon
//! as one child is unbounded, even when that child already finished.

use crate::job::{AnimationId, AnimationState, Direction, Discipline, NodeKind};
use crate::AnimationTree;

/// Discipline state of a sequential group
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SequentialState {
    pub(crate) current: Option<AnimationId>,
    pub(crate) previous_loop: i32,
}

/// The child owning a point in group time
#[derive(Clone, Copy, Debug)]
struct AnimationIndex {
    animation: Option<AnimationId>,
    /// Group time at which `animation` starts
    time_offset: i32,
    /// The current child lies before `animation`
    after_current: bool,
}

impl AnimationTree {
    /// Current child of a sequential group
    pub fn current_animation(&self, group: AnimationId) -> Option<AnimationId> {
        self.sequential_state(group).current
    }

    fn sequential_state(&self, group: AnimationId) -> SequentialState {
        match self.nodes.get(group).map(|n| &n.kind) {
            Some(NodeKind::Group(node)) => match node.discipline {
                Discipline::Sequential(state) => state,
                Discipline::Parallel(_) => SequentialState::default(),
            },
            _ => SequentialState::default(),
        }
    }

    pub(crate) fn sequential_state_mut(
        &mut self,
        group: AnimationId,
    ) -> Option<&mut SequentialState> {
        match &mut self.nodes.get_mut(group)?.kind {
            NodeKind::Group(node) => match &mut node.discipline {
                Discipline::Sequential(state) => Some(state),
                Discipline::Parallel(_) => None,
            },
            NodeKind::Leaf(_) => None,
        }
    }

    pub(crate) fn sequential_duration(&self, group: AnimationId) -> i32 {
        let mut total: i32 = 0;
        for child in self.child_iter(group) {
            if self.is_uncontrolled(child) {
                return -1;
            }
            total = total.saturating_add(self.total_duration(child));
        }
        total
    }

    /// Total duration of a child, using its recorded finish time once an
    /// uncontrolled child is done
    fn animation_actual_total_duration(&self, child: AnimationId) -> i32 {
        if self.is_uncontrolled(child) {
            if let Some(node) = self.nodes.get(child) {
                let done = node.uncontrolled_finish_time;
                if done >= 0
                    && (node.loop_count - 1 == node.current_loop
                        || node.state == AnimationState::Stopped)
                {
                    return done;
                }
            }
            return -1;
        }
        self.total_duration(child)
    }

    fn index_for_current_time(&self, group: AnimationId) -> AnimationIndex {
        let (current_time, direction) = self
            .nodes
            .get(group)
            .map_or((0, Direction::Forward), |n| (n.current_time, n.direction));
        let current = self.sequential_state(group).current;

        let mut index = AnimationIndex {
            animation: None,
            time_offset: 0,
            after_current: false,
        };
        let mut duration = 0;
        for child in self.child_iter(group) {
            duration = self.animation_actual_total_duration(child);

            // The child owns the time when it is unbounded, ends after it, or
            // ends exactly on it while running backwards.
            let end = index.time_offset.saturating_add(duration);
            if duration == -1
                || current_time < end
                || (current_time == end && direction == Direction::Backward)
            {
                index.animation = Some(child);
                return index;
            }

            if Some(child) == current {
                index.after_current = true;
            }
            index.time_offset = end;
        }

        // Past the actual end of an unbounded group, or only zero-length children.
        index.time_offset -= duration;
        index.animation = self.last_child(group);
        index
    }

    fn sequential_at_end(&self, group: AnimationId) -> bool {
        let Some(node) = self.nodes.get(group) else {
            return false;
        };
        let Some(current) = self.sequential_state(group).current else {
            return false;
        };
        let Some(child) = self.nodes.get(current) else {
            return false;
        };
        node.current_loop == node.loop_count - 1
            && node.direction == Direction::Forward
            && child.next_sibling.is_none()
            && child.total_current_time == self.animation_actual_total_duration(current)
    }

    /// Make the first (or last, backwards) child current again
    fn sequential_restart(&mut self, group: AnimationId) {
        let Some(node) = self.nodes.get(group) else {
            return;
        };
        let (previous_loop, target) = match node.direction {
            Direction::Forward => (0, self.first_child(group)),
            Direction::Backward => (node.loop_count - 1, self.last_child(group)),
        };
        let current = match self.sequential_state_mut(group) {
            Some(state) => {
                state.previous_loop = previous_loop;
                state.current
            }
            None => return,
        };

        if current == target {
            self.activate_current_animation(group, false);
        } else {
            self.set_current_animation(group, target, false);
        }
    }

    fn advance_forwards(&mut self, group: AnimationId, index: &AnimationIndex) {
        let state = self.sequential_state(group);
        let current_loop = self.nodes[group].current_loop;

        if state.previous_loop < current_loop {
            // Finish the rest of the previous loop.
            let mut cursor = state.current;
            while let Some(child) = cursor {
                self.set_current_animation(group, Some(child), true);
                if !self.contains(group) {
                    return;
                }
                let end = self.animation_actual_total_duration(child);
                self.set_current_time(child, end);
                if !self.contains(group) {
                    return;
                }
                cursor = self.next_sibling_of(child);
            }

            let first = self.first_child(group);
            if first.is_some() && first == self.last_child(group) {
                // A single child is already current, force its reactivation.
                self.activate_current_animation(group, true);
            } else {
                self.set_current_animation(group, first, true);
            }
            if !self.contains(group) {
                return;
            }
        }

        let mut cursor = self.sequential_state(group).current;
        while let Some(child) = cursor {
            if Some(child) == index.animation {
                break;
            }
            self.set_current_animation(group, Some(child), true);
            if !self.contains(group) {
                return;
            }
            let end = self.animation_actual_total_duration(child);
            self.set_current_time(child, end);
            if !self.contains(group) {
                return;
            }
            cursor = self.next_sibling_of(child);
        }
    }

    fn rewind_forwards(&mut self, group: AnimationId, index: &AnimationIndex) {
        let state = self.sequential_state(group);
        let current_loop = self.nodes[group].current_loop;

        if state.previous_loop > current_loop {
            // Rewind the rest of the previous loop.
            let mut cursor = state.current;
            while let Some(child) = cursor {
                self.set_current_animation(group, Some(child), true);
                if !self.contains(group) {
                    return;
                }
                self.set_current_time(child, 0);
                if !self.contains(group) {
                    return;
                }
                cursor = self.previous_sibling_of(child);
            }

            let last = self.last_child(group);
            if last.is_some() && last == self.first_child(group) {
                self.activate_current_animation(group, true);
            } else {
                self.set_current_animation(group, last, true);
            }
            if !self.contains(group) {
                return;
            }
        }

        let mut cursor = self.sequential_state(group).current;
        while let Some(child) = cursor {
            if Some(child) == index.animation {
                break;
            }
            self.set_current_animation(group, Some(child), true);
            if !self.contains(group) {
                return;
            }
            self.set_current_time(child, 0);
            if !self.contains(group) {
                return;
            }
            cursor = self.previous_sibling_of(child);
        }
    }

    /// Switch the current child, stopping the previous one
    fn set_current_animation(
        &mut self,
        group: AnimationId,
        animation: Option<AnimationId>,
        intermediate: bool,
    ) {
        let current = self.sequential_state(group).current;
        let Some(animation) = animation else {
            debug_assert!(self.first_child(group).is_none());
            if let Some(state) = self.sequential_state_mut(group) {
                state.current = None;
            }
            return;
        };
        if current == Some(animation) {
            return;
        }

        if let Some(current) = current {
            self.stop(current);
            if !self.contains(group) {
                return;
            }
        }

        debug_assert_eq!(self.nodes.get(animation).and_then(|n| n.group), Some(group));
        if let Some(state) = self.sequential_state_mut(group) {
            state.current = Some(animation);
        }
        self.activate_current_animation(group, intermediate);
    }

    /// Restart the current child in the group's direction
    fn activate_current_animation(&mut self, group: AnimationId, intermediate: bool) {
        let Some(current) = self.sequential_state(group).current else {
            return;
        };
        let Some(node) = self.nodes.get(group) else {
            return;
        };
        if node.state == AnimationState::Stopped {
            return;
        }
        let direction = node.direction;

        self.stop(current);
        self.set_direction(current, direction);
        if self.is_uncontrolled(current) {
            self.reset_uncontrolled_animation_finish_time(current);
        }

        self.start(current);
        if !self.contains(group) {
            return;
        }
        if !intermediate
            && self.state_of(group) == AnimationState::Paused
            && self.state_of(current) == AnimationState::Running
        {
            let _ = self.pause(current);
        }
    }

    pub(crate) fn sequential_update_current_time(&mut self, group: AnimationId, current_time: i32) {
        let state = self.sequential_state(group);
        let Some(current) = state.current else {
            return;
        };

        let index = self.index_for_current_time(group);
        let current_loop = self.nodes[group].current_loop;
        let switching = Some(current) != index.animation;

        if state.previous_loop < current_loop
            || (state.previous_loop == current_loop && switching && index.after_current)
        {
            // Advancing forwards is rewinding backwards.
            self.advance_forwards(group, &index);
        } else if state.previous_loop > current_loop
            || (state.previous_loop == current_loop && switching && !index.after_current)
        {
            self.rewind_forwards(group, &index);
        }
        if !self.contains(group) {
            return;
        }

        self.set_current_animation(group, index.animation, false);
        if !self.contains(group) {
            return;
        }

        let new_current_time = current_time - index.time_offset;
        match self.sequential_state(group).current {
            Some(current) => {
                self.set_current_time(current, new_current_time);
                if !self.contains(group) {
                    return;
                }
                if self.sequential_at_end(group) {
                    // Never run past what the last child actually consumed.
                    let consumed = self
                        .nodes
                        .get(current)
                        .map_or(new_current_time, |n| n.total_current_time);
                    let node = &mut self.nodes[group];
                    node.current_time += consumed - new_current_time;
                    node.total_current_time += consumed - new_current_time;
                    self.stop(group);
                    if !self.contains(group) {
                        return;
                    }
                }
            }
            None => {
                // Every child was removed.
                self.nodes[group].current_time = 0;
                self.stop(group);
                if !self.contains(group) {
                    return;
                }
            }
        }

        let current_loop = self.nodes[group].current_loop;
        if let Some(state) = self.sequential_state_mut(group) {
            state.previous_loop = current_loop;
        }
    }

    pub(crate) fn sequential_update_state(
        &mut self,
        group: AnimationId,
        new_state: AnimationState,
        old_state: AnimationState,
    ) {
        let Some(current) = self.sequential_state(group).current else {
            return;
        };
        let current_state = self.state_of(current);

        match new_state {
            AnimationState::Stopped => self.stop(current),
            AnimationState::Paused => {
                if old_state == current_state && old_state == AnimationState::Running {
                    let _ = self.pause(current);
                } else {
                    self.sequential_restart(group);
                }
            }
            AnimationState::Running => {
                if old_state == current_state && old_state == AnimationState::Paused {
                    self.start(current);
                } else {
                    self.sequential_restart(group);
                }
            }
        }
    }

    pub(crate) fn sequential_update_direction(&mut self, group: AnimationId, direction: Direction) {
        if self.state_of(group) == AnimationState::Stopped {
            return;
        }
        if let Some(current) = self.sequential_state(group).current {
            self.set_direction(current, direction);
        }
    }

    pub(crate) fn sequential_uncontrolled_finished(
        &mut self,
        group: AnimationId,
        child: AnimationId,
    ) {
        debug_assert_eq!(self.sequential_state(group).current, Some(child));
        let Some(child_total) = self.nodes.get(child).map(|n| n.total_current_time) else {
            return;
        };
        self.set_uncontrolled_animation_finish_time(child, child_total);

        let Some(node) = self.nodes.get(group) else {
            return;
        };
        let mut total_time = node.total_current_time;
        let direction = node.direction;

        let step: fn(&AnimationTree, AnimationId) -> Option<AnimationId> = match direction {
            Direction::Forward => AnimationTree::next_sibling_of,
            Direction::Backward => AnimationTree::previous_sibling_of,
        };

        // Move on to the neighbour in the run direction.
        if let Some(neighbour) = step(self, child) {
            self.set_current_animation(group, Some(neighbour), false);
            if !self.contains(group) {
                return;
            }
        }

        // The group's end is known once nothing unbounded remains ahead.
        let mut cursor = step(self, child);
        while let Some(next) = cursor {
            if self.is_uncontrolled(next) {
                total_time = -1;
                break;
            }
            total_time = total_time.saturating_add(self.duration(next));
            cursor = step(self, next);
        }
        if total_time >= 0 {
            self.set_uncontrolled_animation_finish_time(group, total_time);
        }

        if self.sequential_at_end(group) {
            self.stop(group);
        }
    }

    pub(crate) fn sequential_animation_inserted(&mut self, group: AnimationId, child: AnimationId) {
        if self.sequential_state(group).current.is_none() {
            let first = self.first_child(group);
            self.set_current_animation(group, first, false);
            if !self.contains(group) {
                return;
            }
        }

        // Inserted right before a current child that has not started yet.
        let Some(current) = self.sequential_state(group).current else {
            return;
        };
        let unstarted = self
            .nodes
            .get(current)
            .map_or(false, |n| n.total_current_time == 0 && n.current_loop == 0);
        if self.next_sibling_of(child) == Some(current) && unstarted {
            self.set_current_animation(group, Some(child), false);
        }
    }

    pub(crate) fn sequential_animation_removed(
        &mut self,
        group: AnimationId,
        child: AnimationId,
        previous: Option<AnimationId>,
        next: Option<AnimationId>,
    ) {
        self.base_animation_removed(group, child);
        if !self.contains(group) {
            return;
        }

        let removing_current = self.sequential_state(group).current == Some(child);
        if removing_current {
            self.set_current_animation(group, next.or(previous), false);
            if !self.contains(group) {
                return;
            }
        }

        // Group time is what the children before the current one consumed.
        let current = self.sequential_state(group).current;
        let mut time: i32 = 0;
        for sibling in self.child_iter(group) {
            if Some(sibling) == current {
                break;
            }
            time = time.saturating_add(self.animation_actual_total_duration(sibling));
        }
        if !removing_current {
            if let Some(current) = current {
                time += self.nodes.get(current).map_or(0, |n| n.total_current_time);
            }
        }

        let duration = self.duration(group).max(0);
        let node = &mut self.nodes[group];
        node.current_time = time;
        node.total_current_time = time.saturating_add(node.current_loop.saturating_mul(duration));
    }
}
