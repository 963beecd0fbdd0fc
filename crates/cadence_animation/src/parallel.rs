//! Parallel groups
//!
//! All children run at once on the group's loop time. The group lasts as long
//! as its longest child; children shorter than that stop on their own and
//! are restarted when the group enters a new loop.

use crate::job::{AnimationId, AnimationState, Direction, Discipline, NodeKind};
use crate::AnimationTree;

/// Discipline state of a parallel group
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ParallelState {
    pub(crate) previous_loop: i32,
    pub(crate) previous_current_time: i32,
}

impl AnimationTree {
    fn parallel_state(&self, group: AnimationId) -> ParallelState {
        match self.nodes.get(group).map(|n| &n.kind) {
            Some(NodeKind::Group(node)) => match node.discipline {
                Discipline::Parallel(state) => state,
                Discipline::Sequential(_) => ParallelState::default(),
            },
            _ => ParallelState::default(),
        }
    }

    fn parallel_state_mut(&mut self, group: AnimationId) -> Option<&mut ParallelState> {
        match &mut self.nodes.get_mut(group)?.kind {
            NodeKind::Group(node) => match &mut node.discipline {
                Discipline::Parallel(state) => Some(state),
                Discipline::Sequential(_) => None,
            },
            NodeKind::Leaf(_) => None,
        }
    }

    /// Longest child run. An unbounded child counts with its recorded run
    /// length once it signalled its end, and makes the group unbounded before.
    pub(crate) fn parallel_duration(&self, group: AnimationId) -> i32 {
        let mut longest = 0;
        for child in self.child_iter(group) {
            let child_total = if self.is_uncontrolled(child) {
                self.uncontrolled_animation_finish_time(child)
            } else {
                self.total_duration(child)
            };
            if child_total < 0 {
                return -1;
            }
            longest = longest.max(child_total);
        }
        longest
    }

    /// Total duration of a child, `-1` for unbounded ones whatever they recorded
    fn parallel_child_total(&self, child: AnimationId) -> i32 {
        if self.is_uncontrolled(child) {
            -1
        } else {
            self.total_duration(child)
        }
    }

    /// Put `child` into the group's own state
    fn apply_group_state(&mut self, group: AnimationId, child: AnimationId) {
        match self.state_of(group) {
            AnimationState::Running => self.start(child),
            AnimationState::Paused => {
                if self.state_of(child) == AnimationState::Running {
                    let _ = self.pause(child);
                }
            }
            AnimationState::Stopped => {}
        }
    }

    fn should_animation_start(
        &self,
        group: AnimationId,
        child: AnimationId,
        start_if_at_end: bool,
    ) -> bool {
        let child_total = self.parallel_child_total(child);
        if child_total == -1 {
            return self.uncontrolled_animation_finish_time(child) == -1;
        }

        let (current_time, direction) = self
            .nodes
            .get(group)
            .map_or((0, Direction::Forward), |n| (n.current_time, n.direction));
        if start_if_at_end {
            current_time <= child_total
        } else {
            match direction {
                Direction::Forward => current_time < child_total,
                Direction::Backward => current_time != 0 && current_time <= child_total,
            }
        }
    }

    pub(crate) fn parallel_update_current_time(&mut self, group: AnimationId) {
        if self.first_child(group).is_none() {
            return;
        }
        let state = self.parallel_state(group);
        let current_loop = self.nodes[group].current_loop;

        if current_loop > state.previous_loop {
            // Let the previous loop complete.
            let duration = self.duration(group);
            if duration > 0 {
                for child in self.children(group) {
                    if self.state_of(child) != AnimationState::Stopped {
                        self.set_current_time(child, duration);
                        if !self.contains(group) {
                            return;
                        }
                    }
                }
            }
            // Unbounded children report their end again in the new loop.
            self.reset_uncontrolled_animations_finish_time(group);
        } else if current_loop < state.previous_loop {
            // Seeking backwards across a loop boundary rewinds every child.
            for child in self.children(group) {
                self.apply_group_state(group, child);
                if !self.contains(group) {
                    return;
                }
                self.set_current_time(child, 0);
                if !self.contains(group) {
                    return;
                }
                self.stop(child);
            }
        }

        for child in self.children(group) {
            if !self.contains(child) {
                continue;
            }
            let child_total = self.parallel_child_total(child);
            // Backwards runs do not start every child at once.
            if current_loop > state.previous_loop
                || self.should_animation_start(
                    group,
                    child,
                    state.previous_current_time > child_total,
                )
            {
                self.apply_group_state(group, child);
                if !self.contains(group) {
                    return;
                }
            }

            if self.state_of(child) == self.state_of(group) {
                let current_time = self.nodes[group].current_time;
                self.set_current_time(child, current_time);
                if !self.contains(group) {
                    return;
                }
                if child_total > 0 && current_time > child_total {
                    self.stop(child);
                }
            }
        }

        let (current_loop, current_time) = {
            let node = &self.nodes[group];
            (node.current_loop, node.current_time)
        };
        if let Some(state) = self.parallel_state_mut(group) {
            state.previous_loop = current_loop;
            state.previous_current_time = current_time;
        }
    }

    pub(crate) fn parallel_update_state(
        &mut self,
        group: AnimationId,
        new_state: AnimationState,
        old_state: AnimationState,
    ) {
        match new_state {
            AnimationState::Stopped => {
                for child in self.children(group) {
                    self.stop(child);
                }
            }
            AnimationState::Paused => {
                for child in self.children(group) {
                    if self.state_of(child) == AnimationState::Running {
                        let _ = self.pause(child);
                    }
                }
            }
            AnimationState::Running => {
                for child in self.children(group) {
                    let Some(node) = self.nodes.get(group) else {
                        return;
                    };
                    let (direction, loop_count) = (node.direction, node.loop_count);
                    if old_state == AnimationState::Stopped {
                        self.stop(child);
                        if let Some(state) = self.parallel_state_mut(group) {
                            state.previous_loop = match direction {
                                Direction::Forward => 0,
                                Direction::Backward => loop_count - 1,
                            };
                        }
                    }
                    self.reset_uncontrolled_animation_finish_time(child);
                    self.set_direction(child, direction);
                    let from_stopped = old_state == AnimationState::Stopped;
                    if self.should_animation_start(group, child, from_stopped) {
                        self.start(child);
                    }
                }
            }
        }
    }

    pub(crate) fn parallel_update_direction(&mut self, group: AnimationId, direction: Direction) {
        if self.state_of(group) != AnimationState::Stopped {
            for child in self.children(group) {
                self.set_direction(child, direction);
            }
            return;
        }

        let duration = self.duration(group);
        let loop_count = self.nodes.get(group).map_or(1, |n| n.loop_count);
        if let Some(state) = self.parallel_state_mut(group) {
            match direction {
                Direction::Forward => {
                    state.previous_loop = 0;
                    state.previous_current_time = 0;
                }
                Direction::Backward => {
                    // Infinite loops cannot be entered from their end.
                    state.previous_loop = if loop_count == -1 { 0 } else { loop_count - 1 };
                    state.previous_current_time = duration;
                }
            }
        }
    }

    pub(crate) fn parallel_uncontrolled_finished(
        &mut self,
        group: AnimationId,
        child: AnimationId,
    ) {
        debug_assert!(self.is_uncontrolled(child));

        let mut uncontrolled_running = 0;
        for sibling in self.children(group) {
            if sibling == child {
                let finish = self.nodes[sibling].total_current_time;
                self.set_uncontrolled_animation_finish_time(sibling, finish);
            } else if self.is_uncontrolled(sibling)
                && self.uncontrolled_animation_finish_time(sibling) == -1
            {
                uncontrolled_running += 1;
            }
        }
        if uncontrolled_running > 0 {
            return;
        }

        // Every unbounded child is done, so the group's end is known.
        let mut longest = 0;
        let mut running = false;
        for sibling in self.child_iter(group) {
            if self.state_of(sibling) == AnimationState::Running {
                running = true;
            }
            longest = longest.max(self.total_duration(sibling));
        }

        let Some(node) = self.nodes.get(group) else {
            return;
        };
        let finish = longest
            .saturating_add(node.current_loop_start_time)
            .max(node.total_current_time);
        let on_last_loop = match node.direction {
            Direction::Forward => node.current_loop == node.loop_count - 1,
            Direction::Backward => true,
        };
        self.set_uncontrolled_animation_finish_time(group, finish);

        if !running && on_last_loop {
            self.stop(group);
        }
    }
}
