//! Group membership
//!
//! Children of a group form a doubly linked list of ids stored on the child
//! nodes themselves. This module maintains that list and the behaviour both
//! disciplines share; [`sequential`](crate::sequential) and
//! [`parallel`](crate::parallel) add their timing rules on top.

use crate::error::{AnimationError, Result};
use crate::job::{AnimationId, KindTag, NodeKind};
use crate::AnimationTree;
use std::iter;

impl AnimationTree {
    // ------------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------------

    /// Append `child` to `group`, taking it out of its previous group first
    pub fn append_animation(&mut self, group: AnimationId, child: AnimationId) -> Result<()> {
        self.insert_animation(group, child, false)
    }

    /// Prepend `child` to `group`, taking it out of its previous group first
    pub fn prepend_animation(&mut self, group: AnimationId, child: AnimationId) -> Result<()> {
        self.insert_animation(group, child, true)
    }

    fn insert_animation(
        &mut self,
        group: AnimationId,
        child: AnimationId,
        front: bool,
    ) -> Result<()> {
        self.check_insert(group, child)?;

        if let Some(old_group) = self.nodes[child].group {
            self.remove_animation(old_group, child)?;
            // Removal runs policies and listeners that may have destroyed either node.
            if !self.contains(group) {
                return Err(AnimationError::UnknownAnimation(group));
            }
            if !self.contains(child) {
                return Err(AnimationError::UnknownAnimation(child));
            }
        }

        let (first, last) = self.group_ends(group);
        if front {
            self.nodes[child].next_sibling = first;
            if let Some(first) = first {
                self.nodes[first].previous_sibling = Some(child);
            }
            self.set_group_ends(group, Some(child), last.or(Some(child)));
        } else {
            self.nodes[child].previous_sibling = last;
            if let Some(last) = last {
                self.nodes[last].next_sibling = Some(child);
            }
            self.set_group_ends(group, first.or(Some(child)), Some(child));
        }
        self.nodes[child].group = Some(group);

        tracing::debug!(group = ?group, child = ?child, front, "animation added to group");
        self.animation_inserted(group, child);
        Ok(())
    }

    fn check_insert(&self, group: AnimationId, child: AnimationId) -> Result<()> {
        let node = self
            .nodes
            .get(group)
            .ok_or(AnimationError::UnknownAnimation(group))?;
        if !self.contains(child) {
            return Err(AnimationError::UnknownAnimation(child));
        }
        if !node.is_group() {
            return Err(AnimationError::NotAGroup(group));
        }
        if self.ancestors_inclusive(group).any(|ancestor| ancestor == child) {
            return Err(AnimationError::GroupCycle { group, child });
        }
        Ok(())
    }

    /// Detach `child` from `group`.
    ///
    /// The group's removal policy runs first, then a child that is still
    /// active is stopped since nothing drives it anymore.
    pub fn remove_animation(&mut self, group: AnimationId, child: AnimationId) -> Result<()> {
        let group_node = self
            .nodes
            .get(group)
            .ok_or(AnimationError::UnknownAnimation(group))?;
        if !group_node.is_group() {
            return Err(AnimationError::NotAGroup(group));
        }
        let child_node = self
            .nodes
            .get_mut(child)
            .ok_or(AnimationError::UnknownAnimation(child))?;
        if child_node.group != Some(group) {
            return Err(AnimationError::NotAChild { group, child });
        }

        let previous = child_node.previous_sibling.take();
        let next = child_node.next_sibling.take();
        child_node.group = None;

        match previous {
            Some(previous) => self.nodes[previous].next_sibling = next,
            None => {
                let (_, last) = self.group_ends(group);
                self.set_group_ends(group, next, last);
            }
        }
        match next {
            Some(next) => self.nodes[next].previous_sibling = previous,
            None => {
                let (first, _) = self.group_ends(group);
                self.set_group_ends(group, first, previous);
            }
        }

        tracing::debug!(group = ?group, child = ?child, "animation removed from group");
        self.animation_removed(group, child, previous, next);

        if self.contains(child) && !self.nodes[child].is_stopped() {
            self.stop(child);
        }
        Ok(())
    }

    /// Remove and destroy every child of `group`
    pub fn clear_animations(&mut self, group: AnimationId) -> Result<()> {
        let node = self
            .nodes
            .get(group)
            .ok_or(AnimationError::UnknownAnimation(group))?;
        if !node.is_group() {
            return Err(AnimationError::NotAGroup(group));
        }
        while let Some(child) = self.first_child(group) {
            self.remove(child);
        }
        if let Some(state) = self.sequential_state_mut(group) {
            state.previous_loop = 0;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn first_child(&self, group: AnimationId) -> Option<AnimationId> {
        self.nodes.get(group).and_then(|n| n.first_child())
    }

    pub fn last_child(&self, group: AnimationId) -> Option<AnimationId> {
        self.nodes.get(group).and_then(|n| n.last_child())
    }

    pub(crate) fn next_sibling_of(&self, id: AnimationId) -> Option<AnimationId> {
        self.nodes.get(id).and_then(|n| n.next_sibling)
    }

    pub(crate) fn previous_sibling_of(&self, id: AnimationId) -> Option<AnimationId> {
        self.nodes.get(id).and_then(|n| n.previous_sibling)
    }

    /// Children of `group` in order
    pub fn children(&self, group: AnimationId) -> Vec<AnimationId> {
        self.child_iter(group).collect()
    }

    pub(crate) fn child_iter(&self, group: AnimationId) -> impl Iterator<Item = AnimationId> + '_ {
        iter::successors(self.first_child(group), move |child| {
            self.next_sibling_of(*child)
        })
    }

    /// `id` followed by every enclosing group up to the root
    pub(crate) fn ancestors_inclusive(
        &self,
        id: AnimationId,
    ) -> impl Iterator<Item = AnimationId> + '_ {
        iter::successors(Some(id), move |node| {
            self.nodes.get(*node).and_then(|n| n.group)
        })
    }

    fn group_ends(&self, group: AnimationId) -> (Option<AnimationId>, Option<AnimationId>) {
        match self.nodes.get(group).map(|n| &n.kind) {
            Some(NodeKind::Group(node)) => (node.first_child, node.last_child),
            _ => (None, None),
        }
    }

    fn set_group_ends(
        &mut self,
        group: AnimationId,
        first: Option<AnimationId>,
        last: Option<AnimationId>,
    ) {
        if let Some(NodeKind::Group(node)) = self.nodes.get_mut(group).map(|n| &mut n.kind) {
            node.first_child = first;
            node.last_child = last;
        }
    }

    // ------------------------------------------------------------------------
    // Uncontrolled children
    // ------------------------------------------------------------------------

    /// Whether elapsed time alone cannot tell when the animation ends
    pub(crate) fn is_uncontrolled(&self, id: AnimationId) -> bool {
        self.nodes.get(id).map_or(false, |n| n.loop_count < 0) || self.has_unbounded_loop(id)
    }

    /// Whether one loop of `id` only ends when an unbounded animation inside
    /// it signals completion. Unlike `duration(id) == -1` this stays true
    /// after the signal arrives.
    pub(crate) fn has_unbounded_loop(&self, id: AnimationId) -> bool {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Leaf(leaf)) => leaf.duration() == -1,
            Some(NodeKind::Group(_)) => {
                self.child_iter(id).any(|child| self.is_uncontrolled(child))
            }
            None => false,
        }
    }

    pub fn uncontrolled_animation_finish_time(&self, id: AnimationId) -> i32 {
        self.nodes
            .get(id)
            .map_or(-1, |n| n.uncontrolled_finish_time)
    }

    pub fn set_uncontrolled_animation_finish_time(&mut self, id: AnimationId, time: i32) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.uncontrolled_finish_time = time;
        }
    }

    pub(crate) fn reset_uncontrolled_animation_finish_time(&mut self, id: AnimationId) {
        self.set_uncontrolled_animation_finish_time(id, -1);
    }

    /// Forget the recorded finish time of every uncontrolled child
    pub fn reset_uncontrolled_animations_finish_time(&mut self, group: AnimationId) {
        for child in self.children(group) {
            if self.is_uncontrolled(child) {
                self.reset_uncontrolled_animation_finish_time(child);
            }
        }
    }

    /// An uncontrolled child of `group` reached its end
    pub(crate) fn uncontrolled_animation_finished(
        &mut self,
        group: AnimationId,
        child: AnimationId,
    ) {
        match self.kind_tag(group) {
            Some(KindTag::Sequential) => self.sequential_uncontrolled_finished(group, child),
            Some(KindTag::Parallel) => self.parallel_uncontrolled_finished(group, child),
            Some(KindTag::Leaf) | None => {}
        }
    }

    // ------------------------------------------------------------------------
    // Policies
    // ------------------------------------------------------------------------

    fn animation_inserted(&mut self, group: AnimationId, child: AnimationId) {
        if self.kind_tag(group) == Some(KindTag::Sequential) {
            self.sequential_animation_inserted(group, child);
        }
    }

    fn animation_removed(
        &mut self,
        group: AnimationId,
        child: AnimationId,
        previous: Option<AnimationId>,
        next: Option<AnimationId>,
    ) {
        match self.kind_tag(group) {
            Some(KindTag::Sequential) => {
                self.sequential_animation_removed(group, child, previous, next)
            }
            Some(KindTag::Parallel) => self.base_animation_removed(group, child),
            Some(KindTag::Leaf) | None => {}
        }
    }

    /// Removal policy shared by both disciplines
    pub(crate) fn base_animation_removed(&mut self, group: AnimationId, child: AnimationId) {
        self.reset_uncontrolled_animation_finish_time(child);
        if self.first_child(group).is_none() {
            if let Some(node) = self.nodes.get_mut(group) {
                node.current_time = 0;
            }
            self.stop(group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerConfig;
    use crate::job::AnimationState;
    use crate::time_source::ManualTimeSource;

    fn tree() -> AnimationTree {
        AnimationTree::with_time_source(TimerConfig::standard(), ManualTimeSource::new())
    }

    #[test]
    fn test_append_and_prepend_order() {
        let mut tree = tree();
        let group = tree.add_parallel_group();
        let a = tree.add_pause(10);
        let b = tree.add_pause(20);
        let c = tree.add_pause(30);

        tree.append_animation(group, b).unwrap();
        tree.append_animation(group, c).unwrap();
        tree.prepend_animation(group, a).unwrap();

        assert_eq!(tree.children(group), vec![a, b, c]);
        assert_eq!(tree.first_child(group), Some(a));
        assert_eq!(tree.last_child(group), Some(c));
        assert_eq!(tree[b].previous_sibling(), Some(a));
        assert_eq!(tree[b].next_sibling(), Some(c));
        assert_eq!(tree[a].group(), Some(group));
    }

    #[test]
    fn test_append_moves_between_groups() {
        let mut tree = tree();
        let first = tree.add_parallel_group();
        let second = tree.add_sequential_group();
        let a = tree.add_pause(10);
        let b = tree.add_pause(10);
        tree.append_animation(first, a).unwrap();
        tree.append_animation(first, b).unwrap();

        tree.append_animation(second, a).unwrap();
        assert_eq!(tree.children(first), vec![b]);
        assert_eq!(tree.children(second), vec![a]);
        assert_eq!(tree[a].group(), Some(second));
        assert_eq!(tree[b].previous_sibling(), None);
    }

    #[test]
    fn test_insert_rejects_cycles_and_leaves() {
        let mut tree = tree();
        let outer = tree.add_sequential_group();
        let inner = tree.add_parallel_group();
        let leaf = tree.add_pause(10);
        tree.append_animation(outer, inner).unwrap();

        assert_eq!(
            tree.append_animation(inner, outer),
            Err(AnimationError::GroupCycle {
                group: inner,
                child: outer
            })
        );
        assert!(matches!(
            tree.append_animation(inner, inner),
            Err(AnimationError::GroupCycle { .. })
        ));
        assert_eq!(
            tree.append_animation(leaf, inner),
            Err(AnimationError::NotAGroup(leaf))
        );
    }

    #[test]
    fn test_remove_unknown_child() {
        let mut tree = tree();
        let group = tree.add_parallel_group();
        let stray = tree.add_pause(10);
        assert_eq!(
            tree.remove_animation(group, stray),
            Err(AnimationError::NotAChild {
                group,
                child: stray
            })
        );
    }

    #[test]
    fn test_removing_last_child_stops_group() {
        let mut tree = tree();
        let group = tree.add_parallel_group();
        let a = tree.add_pause(1000);
        tree.append_animation(group, a).unwrap();
        tree.start(group);
        assert_eq!(tree[a].state(), AnimationState::Running);

        tree.remove_animation(group, a).unwrap();
        assert_eq!(tree[group].state(), AnimationState::Stopped);
        assert_eq!(tree[group].current_time(), 0);
        assert_eq!(tree[a].state(), AnimationState::Stopped);
        assert_eq!(tree[a].group(), None);
    }

    #[test]
    fn test_remove_resets_finish_time() {
        let mut tree = tree();
        let group = tree.add_parallel_group();
        let a = tree.add_pause(10);
        let b = tree.add_pause(10);
        tree.append_animation(group, a).unwrap();
        tree.append_animation(group, b).unwrap();
        tree.set_uncontrolled_animation_finish_time(a, 40);

        tree.remove_animation(group, a).unwrap();
        assert_eq!(tree.uncontrolled_animation_finish_time(a), -1);
    }

    #[test]
    fn test_clear_destroys_children() {
        let mut tree = tree();
        let group = tree.add_sequential_group();
        let a = tree.add_pause(10);
        let b = tree.add_pause(10);
        tree.append_animation(group, a).unwrap();
        tree.append_animation(group, b).unwrap();

        tree.clear_animations(group).unwrap();
        assert!(tree.children(group).is_empty());
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert_eq!(tree.current_animation(group), None);
    }

    #[test]
    fn test_remove_group_destroys_subtree() {
        let mut tree = tree();
        let outer = tree.add_sequential_group();
        let inner = tree.add_parallel_group();
        let leaf = tree.add_pause(10);
        tree.append_animation(outer, inner).unwrap();
        tree.append_animation(inner, leaf).unwrap();

        tree.remove(outer);
        assert!(tree.is_empty());
    }
}
