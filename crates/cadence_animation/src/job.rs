//! Animation tree and state machine
//!
//! Every animation, leaf or group, is a node in an [`AnimationTree`] arena
//! addressed by an [`AnimationId`]. Groups link their children through
//! sibling ids; the arena owns all nodes.
//!
//! The tree drives each node through `Stopped -> Running <-> Paused ->
//! Stopped`, maps absolute elapsed time onto loops and loop-local time, and
//! registers running top-level nodes with the tree's clock.
//!
//! Transitions are versioned: every `set_state` bumps the node's version
//! and re-checks it after each hook and notification. When a hook changed
//! the state again, or removed the node, the outer transition stops there.
//!
//! ```ignore
//! use cadence_animation::{AnimationTree, PauseAnimation};
//!
//! let mut tree = AnimationTree::new();
//! let delay = tree.add_leaf(PauseAnimation::new(300));
//! tree.start(delay);
//! // host loop
//! let wakeup = tree.poll();
//! ```

use crate::config::TimerConfig;
use crate::error::{AnimationError, Result};
use crate::leaf::{LeafAnimation, LeafStep, PauseAnimation};
use crate::listener::{AnimationListener, ChangeTypes, ListenerEntry};
use crate::parallel::ParallelState;
use crate::resolver::ConflictResolver;
use crate::sequential::SequentialState;
use crate::time_source::{SystemTimeSource, TimeSource};
use crate::timer::AnimationTimer;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::fmt;
use std::ops::Index;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

new_key_type! {
    /// Handle to an animation node in an [`AnimationTree`]
    pub struct AnimationId;
}

impl AnimationId {
    /// Convert to raw u64 for use outside the tree (profiling, logging)
    pub fn to_raw(self) -> u64 {
        self.0.as_ffi()
    }

    /// Reconstruct from raw u64
    pub fn from_raw(raw: u64) -> Self {
        AnimationId::from(slotmap::KeyData::from_ffi(raw))
    }
}

static NEXT_DOMAIN: AtomicU64 = AtomicU64::new(1);

/// Identity of one animation tree, used to route cross-tree conflict stops
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(u64);

impl DomainId {
    fn next() -> Self {
        DomainId(NEXT_DOMAIN.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain-{}", self.0)
    }
}

/// State of an animation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationState {
    #[default]
    Stopped,
    Paused,
    Running,
}

/// Direction time flows in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

// ============================================================================
// Nodes
// ============================================================================

pub(crate) enum NodeKind {
    Leaf(Box<dyn LeafAnimation>),
    Group(GroupNode),
}

pub(crate) struct GroupNode {
    pub(crate) first_child: Option<AnimationId>,
    pub(crate) last_child: Option<AnimationId>,
    pub(crate) discipline: Discipline,
}

pub(crate) enum Discipline {
    Sequential(SequentialState),
    Parallel(ParallelState),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KindTag {
    Leaf,
    Sequential,
    Parallel,
}

/// Which group discipline a node uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Sequential,
    Parallel,
}

/// One node of the animation tree
pub struct Animation {
    pub(crate) kind: NodeKind,
    pub(crate) state: AnimationState,
    pub(crate) direction: Direction,
    pub(crate) loop_count: i32,
    pub(crate) total_current_time: i32,
    pub(crate) current_time: i32,
    pub(crate) current_loop: i32,
    pub(crate) current_loop_start_time: i32,
    pub(crate) uncontrolled_finish_time: i32,
    pub(crate) group: Option<AnimationId>,
    pub(crate) next_sibling: Option<AnimationId>,
    pub(crate) previous_sibling: Option<AnimationId>,
    pub(crate) has_registered_timer: bool,
    pub(crate) disable_user_control: bool,
    pub(crate) is_pause: bool,
    pub(crate) listeners: SmallVec<[ListenerEntry; 2]>,
    pub(crate) claim: Option<cadence_core::PropertyKey>,
    pub(crate) version: u64,
}

impl Animation {
    fn new(kind: NodeKind) -> Self {
        let is_pause = match &kind {
            NodeKind::Leaf(leaf) => leaf.is_pause(),
            NodeKind::Group(_) => false,
        };
        Self {
            kind,
            state: AnimationState::Stopped,
            direction: Direction::Forward,
            loop_count: 1,
            total_current_time: 0,
            current_time: 0,
            current_loop: 0,
            current_loop_start_time: 0,
            uncontrolled_finish_time: -1,
            group: None,
            next_sibling: None,
            previous_sibling: None,
            has_registered_timer: false,
            disable_user_control: false,
            is_pause,
            listeners: SmallVec::new(),
            claim: None,
            version: 0,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    /// Time within the current loop.
    ///
    /// While only pauses run the clock sleeps between wakeups and this value
    /// lags; see [`AnimationTree::ensure_timer_update`].
    pub fn current_time(&self) -> i32 {
        self.current_time
    }

    /// Time since start across all loops
    pub fn total_current_time(&self) -> i32 {
        self.total_current_time
    }

    pub fn current_loop(&self) -> i32 {
        self.current_loop
    }

    pub fn group(&self) -> Option<AnimationId> {
        self.group
    }

    pub fn next_sibling(&self) -> Option<AnimationId> {
        self.next_sibling
    }

    pub fn previous_sibling(&self) -> Option<AnimationId> {
        self.previous_sibling
    }

    pub fn first_child(&self) -> Option<AnimationId> {
        match &self.kind {
            NodeKind::Group(group) => group.first_child,
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn last_child(&self) -> Option<AnimationId> {
        match &self.kind {
            NodeKind::Group(group) => group.last_child,
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn group_kind(&self) -> Option<GroupKind> {
        match &self.kind {
            NodeKind::Group(group) => Some(match group.discipline {
                Discipline::Sequential(_) => GroupKind::Sequential,
                Discipline::Parallel(_) => GroupKind::Parallel,
            }),
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn is_pause(&self) -> bool {
        self.is_pause
    }

    /// Whether this node is registered directly with the clock
    pub fn has_registered_timer(&self) -> bool {
        self.has_registered_timer
    }

    /// Finish time recorded for an uncontrolled run, `-1` while unfinished
    pub fn uncontrolled_finish_time(&self) -> i32 {
        self.uncontrolled_finish_time
    }

    pub fn user_control_disabled(&self) -> bool {
        self.disable_user_control
    }

    pub fn is_stopped(&self) -> bool {
        self.state == AnimationState::Stopped
    }

    pub fn is_running(&self) -> bool {
        self.state == AnimationState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == AnimationState::Paused
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("group_kind", &self.group_kind())
            .field("state", &self.state)
            .field("direction", &self.direction)
            .field("loop_count", &self.loop_count)
            .field("current_time", &self.current_time)
            .field("current_loop", &self.current_loop)
            .field("total_current_time", &self.total_current_time)
            .finish()
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Arena of animation nodes together with the clock that drives them.
///
/// One tree per thread: listeners are `Rc` based and the tree is not `Send`.
pub struct AnimationTree {
    pub(crate) nodes: SlotMap<AnimationId, Animation>,
    pub(crate) timer: AnimationTimer,
    pub(crate) resolver: ConflictResolver,
    domain: DomainId,
}

impl Default for AnimationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AnimationTree {
    fn drop(&mut self) {
        // The resolver may outlive this tree when shared.
        self.resolver.release_domain(self.domain);
    }
}

impl Index<AnimationId> for AnimationTree {
    type Output = Animation;

    fn index(&self, id: AnimationId) -> &Animation {
        &self.nodes[id]
    }
}

impl AnimationTree {
    /// Create a tree ticking on wall-clock time with the standard config
    pub fn new() -> Self {
        Self::with_config(TimerConfig::standard())
    }

    pub fn with_config(config: TimerConfig) -> Self {
        Self::with_time_source(config, SystemTimeSource::new())
    }

    pub fn with_time_source(config: TimerConfig, source: impl TimeSource + 'static) -> Self {
        let domain = DomainId::next();
        tracing::debug!(%domain, interval_ms = config.interval_ms, "animation tree created");
        Self {
            nodes: SlotMap::with_key(),
            timer: AnimationTimer::new(config, Box::new(source)),
            resolver: ConflictResolver::new(),
            domain,
        }
    }

    /// Share a conflict resolver with other trees
    pub fn with_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    pub fn add_leaf(&mut self, leaf: impl LeafAnimation) -> AnimationId {
        self.add_boxed_leaf(Box::new(leaf))
    }

    pub fn add_boxed_leaf(&mut self, leaf: Box<dyn LeafAnimation>) -> AnimationId {
        self.nodes.insert(Animation::new(NodeKind::Leaf(leaf)))
    }

    /// Add a [`PauseAnimation`] of `duration` ms
    pub fn add_pause(&mut self, duration: i32) -> AnimationId {
        self.add_leaf(PauseAnimation::new(duration))
    }

    pub fn add_sequential_group(&mut self) -> AnimationId {
        self.add_group(Discipline::Sequential(SequentialState::default()))
    }

    pub fn add_parallel_group(&mut self) -> AnimationId {
        self.add_group(Discipline::Parallel(ParallelState::default()))
    }

    fn add_group(&mut self, discipline: Discipline) -> AnimationId {
        self.nodes.insert(Animation::new(NodeKind::Group(GroupNode {
            first_child: None,
            last_child: None,
            discipline,
        })))
    }

    // ------------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------------

    pub fn contains(&self, id: AnimationId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: AnimationId) -> Option<&Animation> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Typed access to a leaf policy
    pub fn leaf<T: LeafAnimation>(&self, id: AnimationId) -> Option<&T> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Leaf(leaf) => leaf.as_any().downcast_ref::<T>(),
            NodeKind::Group(_) => None,
        }
    }

    pub fn leaf_mut<T: LeafAnimation>(&mut self, id: AnimationId) -> Option<&mut T> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Leaf(leaf) => leaf.as_any_mut().downcast_mut::<T>(),
            NodeKind::Group(_) => None,
        }
    }

    pub(crate) fn state_of(&self, id: AnimationId) -> AnimationState {
        self.nodes
            .get(id)
            .map(|n| n.state)
            .unwrap_or(AnimationState::Stopped)
    }

    /// Duration of one loop, `-1` when unbounded
    pub fn duration(&self, id: AnimationId) -> i32 {
        let Some(node) = self.nodes.get(id) else {
            return 0;
        };
        match &node.kind {
            NodeKind::Leaf(leaf) => leaf.duration(),
            NodeKind::Group(group) => match group.discipline {
                Discipline::Sequential(_) => self.sequential_duration(id),
                Discipline::Parallel(_) => self.parallel_duration(id),
            },
        }
    }

    /// Duration across all loops: `-1` when unbounded or looping forever
    pub fn total_duration(&self, id: AnimationId) -> i32 {
        let dura = self.duration(id);
        if dura <= 0 {
            return dura;
        }
        let loop_count = self.nodes.get(id).map(|n| n.loop_count).unwrap_or(1);
        if loop_count < 0 {
            -1
        } else {
            dura.saturating_mul(loop_count)
        }
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Number of loops, `-1` for infinite. Zero freezes the animation.
    pub fn set_loop_count(&mut self, id: AnimationId, loop_count: i32) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.loop_count = loop_count;
        }
    }

    /// Nodes with user control disabled are driven externally and never join the clock
    pub fn set_disable_user_control(&mut self, id: AnimationId, disabled: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.disable_user_control = disabled;
        }
    }

    pub fn add_change_listener<L: AnimationListener + 'static>(
        &mut self,
        id: AnimationId,
        listener: &Rc<L>,
        types: ChangeTypes,
    ) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or(AnimationError::UnknownAnimation(id))?;
        let weak: Weak<L> = Rc::downgrade(listener);
        let weak: Weak<dyn AnimationListener> = weak;
        node.listeners.push(ListenerEntry {
            listener: weak,
            types,
        });
        Ok(())
    }

    /// Drop `types` from the listener's subscription, removing it when empty
    pub fn remove_change_listener<L: AnimationListener + 'static>(
        &mut self,
        id: AnimationId,
        listener: &Rc<L>,
        types: ChangeTypes,
    ) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let target = Rc::as_ptr(listener) as *const ();
        for entry in node.listeners.iter_mut() {
            if entry.listener.as_ptr() as *const () == target {
                entry.types.remove(types);
            }
        }
        node.listeners.retain(|e| !e.types.is_empty());
    }

    // ------------------------------------------------------------------------
    // Public state machine
    // ------------------------------------------------------------------------

    /// Start the animation. No-op when already running.
    pub fn start(&mut self, id: AnimationId) {
        if self.state_of(id) == AnimationState::Running || !self.contains(id) {
            return;
        }
        self.set_state(id, AnimationState::Running);
    }

    /// Stop the animation. No-op when already stopped.
    pub fn stop(&mut self, id: AnimationId) {
        if self.state_of(id) == AnimationState::Stopped {
            return;
        }
        self.set_state(id, AnimationState::Stopped);
    }

    /// Pause a running animation
    pub fn pause(&mut self, id: AnimationId) -> Result<()> {
        let state = self
            .nodes
            .get(id)
            .map(|n| n.state)
            .ok_or(AnimationError::UnknownAnimation(id))?;
        if state == AnimationState::Stopped {
            tracing::warn!(
                target: "cadence_animation::usage",
                animation = ?id,
                "pause: cannot pause a stopped animation"
            );
            return Err(AnimationError::InvalidTransition {
                action: "pause",
                state,
            });
        }
        self.set_state(id, AnimationState::Paused);
        Ok(())
    }

    /// Resume a paused animation
    pub fn resume(&mut self, id: AnimationId) -> Result<()> {
        let state = self
            .nodes
            .get(id)
            .map(|n| n.state)
            .ok_or(AnimationError::UnknownAnimation(id))?;
        if state != AnimationState::Paused {
            tracing::warn!(
                target: "cadence_animation::usage",
                animation = ?id,
                ?state,
                "resume: cannot resume an animation that is not paused"
            );
            return Err(AnimationError::InvalidTransition {
                action: "resume",
                state,
            });
        }
        self.set_state(id, AnimationState::Running);
        Ok(())
    }

    /// Run the animation to the end of its run in the current direction at once
    pub fn complete(&mut self, id: AnimationId) {
        let Some(direction) = self.nodes.get(id).map(|n| n.direction) else {
            return;
        };
        self.set_state(id, AnimationState::Running);
        if !self.contains(id) {
            return;
        }
        let end = match direction {
            Direction::Forward => self.total_duration(id),
            Direction::Backward => 0,
        };
        // An unbounded run has no end edge to seek to.
        if end >= 0 {
            self.set_current_time(id, end);
        }
    }

    pub fn set_direction(&mut self, id: AnimationId, direction: Direction) {
        let dura = self.duration(id);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.direction == direction {
            return;
        }

        if node.state == AnimationState::Stopped {
            match direction {
                Direction::Backward => {
                    node.current_time = dura;
                    node.current_loop = (node.loop_count - 1).max(0);
                }
                Direction::Forward => {
                    node.current_time = 0;
                    node.current_loop = 0;
                }
            }
        }

        // Catch up in the old direction before flipping.
        let registered = node.has_registered_timer;
        if registered {
            self.ensure_timer_update();
        }
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.direction = direction;
        self.dispatch_update_direction(id, direction);
        if registered {
            self.update_animation_timer();
        }
    }

    /// Move the animation to `msecs` since its start
    pub fn set_current_time(&mut self, id: AnimationId, msecs: i32) {
        let mut msecs = msecs.max(0);
        let dura = self.duration(id);
        let open_ended = self.has_unbounded_loop(id);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let old_loop = node.current_loop;
        let total_dura;

        if open_ended && node.direction == Direction::Forward {
            // Unknown length: the run ends at the recorded finish time, if any.
            let mut end = -1;
            if node.uncontrolled_finish_time >= 0 && msecs >= node.uncontrolled_finish_time {
                msecs = node.uncontrolled_finish_time;
                if node.current_loop == node.loop_count - 1 {
                    end = node.uncontrolled_finish_time;
                } else {
                    node.current_loop += 1;
                    node.current_loop_start_time = msecs;
                    node.uncontrolled_finish_time = -1;
                }
            }
            total_dura = end;
            node.total_current_time = msecs;
            node.current_time = msecs - node.current_loop_start_time;
        } else {
            total_dura = if dura <= 0 {
                dura
            } else if node.loop_count < 0 {
                -1
            } else {
                dura.saturating_mul(node.loop_count)
            };
            if total_dura != -1 {
                msecs = msecs.min(total_dura);
            }
            node.total_current_time = msecs;

            node.current_loop = if dura <= 0 { 0 } else { msecs / dura };
            if node.current_loop == node.loop_count {
                // Landed exactly on the end of the last loop.
                node.current_time = dura.max(0);
                node.current_loop = (node.loop_count - 1).max(0);
            } else if node.direction == Direction::Forward {
                node.current_time = if dura <= 0 { msecs } else { msecs % dura };
            } else {
                node.current_time = if dura <= 0 {
                    msecs
                } else {
                    ((msecs - 1) % dura) + 1
                };
                if node.current_time == dura {
                    node.current_loop -= 1;
                }
            }
        }

        let loop_changed = node.current_loop != old_loop;
        let top_level = node.group.is_none();
        let current_time = node.current_time;

        if loop_changed && top_level {
            self.top_level_loop_changed(id);
        }

        self.dispatch_update_current_time(id, current_time);
        if !self.contains(id) {
            return;
        }

        if loop_changed {
            self.notify_current_loop_changed(id);
            if !self.contains(id) {
                return;
            }
        }

        // Time-driven animations stop themselves at the end of their run.
        let node = &self.nodes[id];
        let at_end = match node.direction {
            Direction::Forward => node.total_current_time == total_dura,
            Direction::Backward => node.total_current_time == 0,
        };
        if at_end {
            self.stop(id);
            if !self.contains(id) {
                return;
            }
        }

        let current_time = self.nodes[id].current_time;
        self.notify_current_time_changed(id, current_time);
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    fn is_current(&self, id: AnimationId, version: u64) -> bool {
        self.nodes.get(id).map(|n| n.version) == Some(version)
    }

    pub(crate) fn set_state(&mut self, id: AnimationId, new_state: AnimationState) {
        let duration = self.duration(id);
        let total_duration = self.total_duration(id);
        let open_ended = self.has_unbounded_loop(id);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.state == new_state || node.loop_count == 0 {
            return;
        }

        let old_state = node.state;
        let old_current_time = node.current_time;
        let old_current_loop = node.current_loop;
        let old_direction = node.direction;
        let group = node.group;
        node.version += 1;
        let version = node.version;

        // Rewind to the direction's start edge without running any hooks.
        if new_state != AnimationState::Stopped && old_state == AnimationState::Stopped {
            let start = match node.direction {
                Direction::Forward => 0,
                Direction::Backward if node.loop_count == -1 => duration,
                Direction::Backward => total_duration,
            };
            node.total_current_time = start;
            node.current_time = start;
            node.uncontrolled_finish_time = -1;
            if group.is_none() {
                node.current_loop_start_time = start;
            }
        }

        node.state = new_state;
        let has_registered_timer = node.has_registered_timer;
        let is_top_level = group.map_or(true, |g| self.state_of(g) == AnimationState::Stopped);

        // Clock bookkeeping always precedes the hooks.
        if old_state == AnimationState::Running {
            if new_state == AnimationState::Paused && has_registered_timer {
                self.ensure_timer_update();
            }
            self.unregister_animation(id);
        } else if new_state == AnimationState::Running {
            self.register_animation(id, is_top_level);
        }
        if !self.is_current(id, version) {
            return;
        }

        // Starting qualifies as a top level loop change.
        if new_state == AnimationState::Running
            && old_state == AnimationState::Stopped
            && group.is_none()
        {
            self.top_level_loop_changed(id);
        }

        self.dispatch_update_state(id, new_state, old_state);
        if !self.is_current(id, version) {
            return;
        }

        if let Some(profiler) = self.timer.profiler.clone() {
            profiler.animation_state_changed(id.to_raw(), old_state, new_state);
        }
        self.notify_state_changed(id, new_state, old_state);
        if !self.is_current(id, version) {
            return;
        }

        match new_state {
            AnimationState::Paused => {}
            AnimationState::Running => {
                if old_state == AnimationState::Stopped {
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.current_loop = 0;
                    }
                    if is_top_level {
                        self.ensure_timer_update();
                        if !self.is_current(id, version) {
                            return;
                        }
                        let total = self.nodes[id].total_current_time;
                        self.set_current_time(id, total);
                    }
                }
            }
            AnimationState::Stopped => {
                let loop_count = self.nodes[id].loop_count;
                let finished = open_ended
                    || loop_count < 0
                    || (old_direction == Direction::Forward
                        && old_current_time.saturating_mul(old_current_loop + 1)
                            == duration.saturating_mul(loop_count))
                    || (old_direction == Direction::Backward && old_current_time == 0);
                if finished {
                    self.finished(id);
                }
            }
        }
    }

    fn finished(&mut self, id: AnimationId) {
        for listener in self.listeners_for(id, ChangeTypes::COMPLETION) {
            if !self.contains(id) {
                return;
            }
            listener.animation_finished(self, id);
        }

        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if let Some(group) = node.group {
            if self.is_uncontrolled(id) {
                // Uncontrolled: the group cannot tell from elapsed time.
                self.uncontrolled_animation_finished(group, id);
            }
        }
    }

    /// Stop without dispatching any policy hooks. Used when tearing down.
    pub(crate) fn force_stop(&mut self, id: AnimationId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.state == AnimationState::Stopped {
            return;
        }
        let old_state = node.state;
        node.state = AnimationState::Stopped;
        node.version += 1;
        if old_state == AnimationState::Running {
            self.unregister_animation(id);
        }
        self.release_claim(id);
        self.notify_state_changed(id, AnimationState::Stopped, old_state);
    }

    /// Destroy an animation. Groups destroy their children.
    ///
    /// A running animation is stopped first without running policy hooks or
    /// finish notifications, then detached from its group.
    pub fn remove(&mut self, id: AnimationId) {
        if !self.contains(id) {
            return;
        }
        self.force_stop(id);
        if let Some(group) = self.nodes.get(id).and_then(|n| n.group) {
            let _ = self.remove_animation(group, id);
        }
        self.destroy(id);
    }

    fn destroy(&mut self, id: AnimationId) {
        self.force_stop(id);
        self.release_claim(id);
        for child in self.children(id) {
            if let Some(node) = self.nodes.get_mut(child) {
                node.group = None;
                node.next_sibling = None;
                node.previous_sibling = None;
            }
            self.destroy(child);
        }
        if self.nodes.remove(id).is_some() {
            tracing::trace!(animation = ?id, "animation destroyed");
        }
    }

    // ------------------------------------------------------------------------
    // Policy dispatch
    // ------------------------------------------------------------------------

    pub(crate) fn kind_tag(&self, id: AnimationId) -> Option<KindTag> {
        self.nodes.get(id).map(|node| match &node.kind {
            NodeKind::Leaf(_) => KindTag::Leaf,
            NodeKind::Group(group) => match group.discipline {
                Discipline::Sequential(_) => KindTag::Sequential,
                Discipline::Parallel(_) => KindTag::Parallel,
            },
        })
    }

    pub(crate) fn leaf_policy_mut(&mut self, id: AnimationId) -> Option<&mut dyn LeafAnimation> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Leaf(leaf) => Some(leaf.as_mut()),
            NodeKind::Group(_) => None,
        }
    }

    pub(crate) fn leaf_policy(&self, id: AnimationId) -> Option<&dyn LeafAnimation> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Leaf(leaf) => Some(leaf.as_ref()),
            NodeKind::Group(_) => None,
        }
    }

    fn dispatch_update_current_time(&mut self, id: AnimationId, current_time: i32) {
        match self.kind_tag(id) {
            Some(KindTag::Leaf) => {
                let step = self
                    .leaf_policy_mut(id)
                    .map(|leaf| leaf.update_current_time(current_time));
                if step == Some(LeafStep::Finished) {
                    self.stop(id);
                }
            }
            Some(KindTag::Sequential) => self.sequential_update_current_time(id, current_time),
            Some(KindTag::Parallel) => self.parallel_update_current_time(id),
            None => {}
        }
    }

    fn dispatch_update_state(
        &mut self,
        id: AnimationId,
        new_state: AnimationState,
        old_state: AnimationState,
    ) {
        match self.kind_tag(id) {
            Some(KindTag::Leaf) => self.leaf_update_state(id, new_state, old_state),
            Some(KindTag::Sequential) => self.sequential_update_state(id, new_state, old_state),
            Some(KindTag::Parallel) => self.parallel_update_state(id, new_state, old_state),
            None => {}
        }
    }

    fn leaf_update_state(
        &mut self,
        id: AnimationId,
        new_state: AnimationState,
        old_state: AnimationState,
    ) {
        let starting =
            new_state == AnimationState::Running && old_state == AnimationState::Stopped;
        let dangling = match self.leaf_policy(id) {
            Some(leaf) => starting && leaf.property_key().is_some() && !leaf.is_target_valid(),
            None => return,
        };
        if dangling {
            tracing::trace!(animation = ?id, "target destroyed before start, stopping");
            self.stop(id);
            return;
        }

        if let Some(leaf) = self.leaf_policy_mut(id) {
            leaf.update_state(new_state, old_state);
        }

        if starting {
            self.claim_property(id);
        } else if new_state == AnimationState::Stopped {
            self.release_claim(id);
        }
    }

    fn dispatch_update_direction(&mut self, id: AnimationId, direction: Direction) {
        match self.kind_tag(id) {
            Some(KindTag::Leaf) => {
                if let Some(leaf) = self.leaf_policy_mut(id) {
                    leaf.update_direction(direction);
                }
            }
            Some(KindTag::Sequential) => self.sequential_update_direction(id, direction),
            Some(KindTag::Parallel) => self.parallel_update_direction(id, direction),
            None => {}
        }
    }

    /// Loop change of a top-level node, propagated down to every leaf
    pub(crate) fn top_level_loop_changed(&mut self, id: AnimationId) {
        match self.kind_tag(id) {
            Some(KindTag::Leaf) => {
                if let Some(leaf) = self.leaf_policy_mut(id) {
                    leaf.top_level_loop_changed();
                }
            }
            Some(_) => {
                for child in self.children(id) {
                    self.fire_top_level_loop_changed(child);
                }
            }
            None => {}
        }
    }

    fn fire_top_level_loop_changed(&mut self, id: AnimationId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.uncontrolled_finish_time = -1;
        if node.group.is_some() {
            node.current_loop_start_time = 0;
        }
        self.top_level_loop_changed(id);
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    fn listeners_for(
        &mut self,
        id: AnimationId,
        types: ChangeTypes,
    ) -> SmallVec<[Rc<dyn AnimationListener>; 4]> {
        let Some(node) = self.nodes.get_mut(id) else {
            return SmallVec::new();
        };
        node.listeners.retain(|e| e.listener.strong_count() > 0);
        node.listeners
            .iter()
            .filter(|e| e.types.intersects(types))
            .filter_map(|e| e.listener.upgrade())
            .collect()
    }

    fn notify_state_changed(
        &mut self,
        id: AnimationId,
        new_state: AnimationState,
        old_state: AnimationState,
    ) {
        for listener in self.listeners_for(id, ChangeTypes::STATE_CHANGE) {
            if !self.contains(id) {
                return;
            }
            listener.animation_state_changed(self, id, new_state, old_state);
        }
    }

    fn notify_current_loop_changed(&mut self, id: AnimationId) {
        for listener in self.listeners_for(id, ChangeTypes::CURRENT_LOOP) {
            if !self.contains(id) {
                return;
            }
            listener.animation_current_loop_changed(self, id);
        }
    }

    fn notify_current_time_changed(&mut self, id: AnimationId, current_time: i32) {
        for listener in self.listeners_for(id, ChangeTypes::CURRENT_TIME) {
            if !self.contains(id) {
                return;
            }
            listener.animation_current_time_changed(self, id, current_time);
        }
    }
}
