//! Animation clock
//!
//! The clock advances every registered top-level animation of its tree by
//! the time elapsed since the previous tick. Nested animations are advanced
//! by their groups and are only counted here.
//!
//! Newly registered animations are staged and committed by a deferred
//! "start animations" action, so everything started within one frame shares
//! the same first delta. When only pause animations are running, the clock
//! stops ticking every frame and sleeps until the nearest pause ends.
//!
//! The host drives the clock through [`AnimationTree::poll`], which runs the
//! deferred actions, fires a due tick, and returns the next [`Wakeup`].

use crate::config::TimerConfig;
use crate::job::{AnimationId, Direction};
use crate::profiler::AnimationProfiler;
use crate::time_source::TimeSource;
use crate::AnimationTree;
use smallvec::SmallVec;
use std::sync::Arc;

/// How the tick source is currently driven
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMode {
    /// Nothing to animate
    Inactive,
    /// Ticking every `interval_ms`
    Ticking,
    /// Only pause animations run; single wakeup at `deadline` (clock ms)
    PausedUntil { deadline: i64 },
}

/// When the host should call [`AnimationTree::poll`] next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wakeup {
    pub after_ms: i64,
    /// Short waits want a precise timer, long ones may be coarse
    pub precise: bool,
}

/// Counters describing the clock's activity
#[derive(Clone, Debug, Default)]
pub struct TimerStats {
    /// Ticks that advanced animations
    pub frames: u64,
    /// Wakeups of the pause-only timer
    pub pause_wakeups: u64,
    /// Out-of-band catch-up updates before committing new animations
    pub catch_ups: u64,
    /// Last delta applied to the animations
    pub last_delta: i64,
}

pub(crate) struct AnimationTimer {
    config: TimerConfig,
    source: Box<dyn TimeSource>,
    time_base: Option<i64>,
    mode: TimerMode,
    pub(crate) animations: Vec<AnimationId>,
    pub(crate) animations_to_start: Vec<AnimationId>,
    pub(crate) running_leaf_animations: i32,
    pub(crate) running_pause_animations: SmallVec<[AnimationId; 4]>,
    last_tick: i64,
    last_delta: i64,
    inside_tick: bool,
    current_animation_idx: isize,
    start_pending: bool,
    stop_pending: bool,
    pub(crate) profiler: Option<Arc<dyn AnimationProfiler>>,
    stats: TimerStats,
}

impl AnimationTimer {
    pub(crate) fn new(config: TimerConfig, source: Box<dyn TimeSource>) -> Self {
        Self {
            config,
            source,
            time_base: None,
            mode: TimerMode::Inactive,
            animations: Vec::new(),
            animations_to_start: Vec::new(),
            running_leaf_animations: 0,
            running_pause_animations: SmallVec::new(),
            last_tick: 0,
            last_delta: 0,
            inside_tick: false,
            current_animation_idx: 0,
            start_pending: false,
            stop_pending: false,
            profiler: None,
            stats: TimerStats::default(),
        }
    }

    /// Milliseconds since the tick source was started, 0 while inactive
    fn elapsed(&self) -> i64 {
        match self.time_base {
            Some(base) => self.source.now_ms() - base,
            None => 0,
        }
    }

    fn ensure_time_base(&mut self) {
        if self.time_base.is_none() {
            self.time_base = Some(self.source.now_ms());
            self.last_tick = 0;
        }
    }

    fn start_ticking(&mut self) {
        self.ensure_time_base();
        if self.mode != TimerMode::Ticking {
            tracing::debug!(interval_ms = self.config.interval_ms, "animation timer ticking");
        }
        self.mode = TimerMode::Ticking;
    }

    fn pause_for(&mut self, duration: i32) {
        self.ensure_time_base();
        let deadline = self.elapsed() + duration.max(0) as i64;
        tracing::debug!(duration, "animation timer paused until next pause end");
        self.mode = TimerMode::PausedUntil { deadline };
    }

    fn deactivate(&mut self) {
        if self.mode != TimerMode::Inactive {
            tracing::debug!("animation timer stopped");
        }
        self.mode = TimerMode::Inactive;
        self.time_base = None;
        self.last_tick = 0;
        self.last_delta = 0;
    }

    fn is_paused(&self) -> bool {
        matches!(self.mode, TimerMode::PausedUntil { .. })
    }
}

impl AnimationTree {
    // ------------------------------------------------------------------------
    // Inspection and configuration
    // ------------------------------------------------------------------------

    pub fn timer_mode(&self) -> TimerMode {
        self.timer.mode
    }

    pub fn timer_config(&self) -> &TimerConfig {
        &self.timer.config
    }

    pub fn timer_stats(&self) -> &TimerStats {
        &self.timer.stats
    }

    /// Top-level animations the clock currently advances
    pub fn running_animations(&self) -> &[AnimationId] {
        &self.timer.animations
    }

    /// Number of running leaf animations, pauses and groups excluded
    pub fn running_leaf_animations(&self) -> usize {
        self.timer.running_leaf_animations.max(0) as usize
    }

    pub fn running_pause_animations(&self) -> usize {
        self.timer.running_pause_animations.len()
    }

    pub fn set_consistent_timing(&mut self, enabled: bool) {
        self.timer.config.consistent_timing = enabled;
    }

    pub fn set_slow_mode(&mut self, enabled: bool) {
        self.timer.config.slow_mode = enabled;
    }

    pub fn set_slowdown_factor(&mut self, factor: f64) {
        self.timer.config.slowdown_factor = factor;
    }

    pub fn set_profiler(&mut self, profiler: Option<Arc<dyn AnimationProfiler>>) {
        self.timer.profiler = profiler;
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    pub(crate) fn register_animation(&mut self, id: AnimationId, is_top_level: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.disable_user_control {
            return;
        }

        let is_group = node.is_group();
        let is_pause = node.is_pause;
        if is_top_level {
            debug_assert!(
                !node.has_registered_timer,
                "animation registered with the clock twice"
            );
            node.has_registered_timer = true;
        }
        self.register_running_animation(id, is_group, is_pause);

        if is_top_level {
            tracing::trace!(animation = ?id, "animation staged for start");
            self.timer.animations_to_start.push(id);
            if !self.timer.start_pending {
                self.timer.start_pending = true;
            }
        }
    }

    pub(crate) fn unregister_animation(&mut self, id: AnimationId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let registered = node.has_registered_timer;
        let is_group = node.is_group();
        let is_pause = node.is_pause;
        let disabled = node.disable_user_control;
        node.has_registered_timer = false;

        if !disabled {
            self.unregister_running_animation(id, is_group, is_pause);
        }
        if !registered {
            return;
        }

        let timer = &mut self.timer;
        if let Some(idx) = timer.animations.iter().position(|a| *a == id) {
            timer.animations.remove(idx);
            // Keep an in-progress tick pointing at the next animation.
            if idx as isize <= timer.current_animation_idx {
                timer.current_animation_idx -= 1;
            }
            if timer.animations.is_empty() && !timer.stop_pending {
                timer.stop_pending = true;
            }
        } else {
            timer.animations_to_start.retain(|a| *a != id);
        }
    }

    fn register_running_animation(&mut self, id: AnimationId, is_group: bool, is_pause: bool) {
        if is_group {
            return;
        }
        if is_pause {
            self.timer.running_pause_animations.push(id);
        } else {
            self.timer.running_leaf_animations += 1;
        }
    }

    fn unregister_running_animation(&mut self, id: AnimationId, is_group: bool, is_pause: bool) {
        if is_group {
            return;
        }
        if is_pause {
            if let Some(idx) = self
                .timer
                .running_pause_animations
                .iter()
                .position(|a| *a == id)
            {
                self.timer.running_pause_animations.remove(idx);
            }
        } else {
            self.timer.running_leaf_animations -= 1;
        }
        debug_assert!(
            self.timer.running_leaf_animations >= 0,
            "running leaf animation counter underflow"
        );
    }

    // ------------------------------------------------------------------------
    // Time advancement
    // ------------------------------------------------------------------------

    /// Advance every live top-level animation by `delta` ms.
    ///
    /// Nested calls made while a tick is in progress are dropped. Iteration is
    /// by index so animations may unregister themselves during their update.
    pub(crate) fn update_animations_time(&mut self, delta: i64) {
        if self.timer.inside_tick {
            return;
        }
        self.timer.last_delta = delta;
        self.timer.stats.last_delta = delta;
        if delta == 0 {
            return;
        }

        self.timer.inside_tick = true;
        self.timer.current_animation_idx = 0;
        while self.timer.current_animation_idx >= 0
            && (self.timer.current_animation_idx as usize) < self.timer.animations.len()
        {
            let id = self.timer.animations[self.timer.current_animation_idx as usize];
            if let Some(node) = self.nodes.get(id) {
                let step = match node.direction {
                    Direction::Forward => delta,
                    Direction::Backward => -delta,
                };
                let elapsed = (node.total_current_time as i64 + step)
                    .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
                self.set_current_time(id, elapsed);
            }
            self.timer.current_animation_idx += 1;
        }
        self.timer.inside_tick = false;
        self.timer.current_animation_idx = 0;
        self.timer.stats.frames += 1;
    }

    /// Measure the time since the last tick and advance animations by it
    pub(crate) fn update_animation_timers(&mut self) {
        if self.timer.inside_tick {
            return;
        }
        let total_elapsed = self.timer.elapsed();
        // Consistent timing does not apply while the pause timer drives us.
        let mut delta = if self.timer.config.consistent_timing && !self.timer.is_paused() {
            self.timer.config.interval_ms as i64
        } else {
            total_elapsed - self.timer.last_tick
        };
        if self.timer.config.slow_mode {
            delta = if self.timer.config.slowdown_factor > 0.0 {
                (delta as f64 / self.timer.config.slowdown_factor).round() as i64
            } else {
                0
            };
        }
        self.timer.last_tick = total_elapsed;

        if delta != 0 {
            tracing::trace!(delta, running = self.timer.animations.len(), "animation tick");
            if let Some(profiler) = self.timer.profiler.clone() {
                profiler.animation_frame(delta, self.timer.animations.len());
            }
            self.update_animations_time(delta);
        }
    }

    /// Bring existing animations up to date before new ones join, so the new
    /// ones do not inherit a large stale delta
    fn maybe_update_animations_to_current_time(&mut self) {
        let since_last_tick = self.timer.elapsed() - self.timer.last_tick;
        if since_last_tick > self.timer.config.catch_up_threshold_ms as i64 {
            self.timer.stats.catch_ups += 1;
            self.update_animation_timers();
        }
    }

    /// Force animations to reflect the current time.
    ///
    /// Only needed while the pause timer is active: regular ticks are never
    /// more than one interval behind, but a sleeping clock leaves every time
    /// cursor where the last wakeup put it. Hosts reading times between
    /// wakeups call this first.
    pub fn ensure_timer_update(&mut self) {
        if self.timer.is_paused() {
            self.update_animation_timers();
        }
    }

    pub(crate) fn update_animation_timer(&mut self) {
        self.restart_animation_timer();
    }

    pub(crate) fn restart_animation_timer(&mut self) {
        let pauses_only = self.timer.running_leaf_animations == 0
            && !self.timer.running_pause_animations.is_empty();
        if pauses_only {
            let closest = self.closest_pause_animation_time_to_finish();
            self.timer.pause_for(closest);
        } else if self.timer.is_paused() || self.timer.mode == TimerMode::Inactive {
            self.timer.start_ticking();
        }
    }

    /// Smallest time until a running pause animation reaches its end
    pub fn closest_pause_animation_time_to_finish(&self) -> i32 {
        let mut closest = i32::MAX;
        for id in &self.timer.running_pause_animations {
            let Some(node) = self.nodes.get(*id) else {
                continue;
            };
            let time_to_finish = match node.direction {
                Direction::Forward => self.duration(*id) - node.current_time,
                Direction::Backward => node.current_time,
            };
            closest = closest.min(time_to_finish);
        }
        closest
    }

    // ------------------------------------------------------------------------
    // Deferred actions
    // ------------------------------------------------------------------------

    fn start_animations(&mut self) {
        if !self.timer.start_pending {
            return;
        }
        self.timer.start_pending = false;
        self.maybe_update_animations_to_current_time();

        let staged = std::mem::take(&mut self.timer.animations_to_start);
        tracing::trace!(count = staged.len(), "committing staged animations");
        self.timer.animations.extend(staged);
        if !self.timer.animations.is_empty() {
            self.restart_animation_timer();
        }
    }

    fn stop_timer(&mut self) {
        self.timer.stop_pending = false;
        let pending_start = self.timer.start_pending && !self.timer.animations_to_start.is_empty();
        if self.timer.animations.is_empty() && !pending_start {
            self.timer.deactivate();
        }
    }

    /// Run queued start/stop actions and cross-tree stop requests
    pub fn process_deferred(&mut self) {
        if self.timer.stop_pending {
            self.stop_timer();
        }
        if self.timer.start_pending {
            self.start_animations();
        }
        self.process_conflict_stops();
    }

    /// Whether deferred actions are waiting for the next poll
    pub fn has_pending_work(&self) -> bool {
        self.timer.start_pending
            || self.timer.stop_pending
            || self.resolver.has_pending_stops(self.domain())
    }

    // ------------------------------------------------------------------------
    // Host integration
    // ------------------------------------------------------------------------

    /// Handle one firing of the tick source
    pub fn timer_event(&mut self) {
        // Consistent timing processes start/stop before the tick for reproducible ordering.
        if self.timer.config.consistent_timing {
            if self.timer.stop_pending {
                self.stop_timer();
            }
            if self.timer.start_pending {
                self.start_animations();
            }
        }

        match self.timer.mode {
            TimerMode::Inactive => {}
            TimerMode::Ticking => self.update_animation_timers(),
            TimerMode::PausedUntil { .. } => {
                self.timer.stats.pause_wakeups += 1;
                self.update_animation_timers();
                self.restart_animation_timer();
            }
        }
    }

    /// When the host should call [`AnimationTree::poll`] again, `None` when idle
    pub fn next_wakeup(&self) -> Option<Wakeup> {
        if self.has_pending_work() {
            return Some(Wakeup {
                after_ms: 0,
                precise: true,
            });
        }
        match self.timer.mode {
            TimerMode::Inactive => None,
            TimerMode::Ticking => Some(Wakeup {
                after_ms: self.timer.config.interval_ms as i64,
                precise: true,
            }),
            TimerMode::PausedUntil { deadline } => {
                let after_ms = (deadline - self.timer.elapsed()).max(0);
                Some(Wakeup {
                    after_ms,
                    precise: after_ms < self.timer.config.precise_pause_threshold_ms as i64,
                })
            }
        }
    }

    /// Run deferred work and a due tick, then report the next wakeup
    pub fn poll(&mut self) -> Option<Wakeup> {
        self.process_deferred();
        let due = match self.timer.mode {
            TimerMode::Inactive => false,
            TimerMode::Ticking => true,
            TimerMode::PausedUntil { deadline } => self.timer.elapsed() >= deadline,
        };
        if due {
            self.timer_event();
            self.process_deferred();
        }
        self.next_wakeup()
    }

    /// Whether an animation is live in the clock's tick list
    pub fn is_animation_registered(&self, id: AnimationId) -> bool {
        self.timer.animations.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::AnimationState;
    use crate::leaf::{LeafAnimation, LeafStep};
    use crate::time_source::ManualTimeSource;
    use std::any::Any;

    /// Timed leaf that is not a pause
    struct Idle(i32);

    impl LeafAnimation for Idle {
        fn duration(&self) -> i32 {
            self.0
        }

        fn update_current_time(&mut self, _current_time: i32) -> LeafStep {
            LeafStep::Continue
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn manual_tree(config: TimerConfig) -> (AnimationTree, ManualTimeSource) {
        let source = ManualTimeSource::new();
        let tree = AnimationTree::with_time_source(config, source.clone());
        (tree, source)
    }

    #[test]
    fn test_registration_is_deferred() {
        let (mut tree, _) = manual_tree(TimerConfig::standard());
        let anim = tree.add_pause(100);
        tree.start(anim);

        assert!(tree[anim].has_registered_timer());
        assert!(!tree.is_animation_registered(anim));
        assert_eq!(tree.timer_mode(), TimerMode::Inactive);
        assert!(tree.has_pending_work());

        tree.process_deferred();
        assert!(tree.is_animation_registered(anim));
    }

    #[test]
    fn test_deferred_start_coalesces() {
        let (mut tree, source) = manual_tree(TimerConfig::standard());
        let a = tree.add_leaf(Idle(1000));
        let b = tree.add_leaf(Idle(1000));
        let c = tree.add_leaf(Idle(1000));
        tree.start(a);
        source.advance(5);
        tree.start(b);
        source.advance(5);
        tree.start(c);
        assert_eq!(tree.timer.animations_to_start.len(), 3);

        tree.poll();
        source.advance(16);
        tree.poll();

        for id in [a, b, c] {
            assert_eq!(tree[id].current_time(), 16);
        }
        assert_eq!(tree.running_leaf_animations(), 3);
    }

    #[test]
    fn test_pause_only_sleeps_until_nearest_finish() {
        let (mut tree, source) = manual_tree(TimerConfig::standard());
        let short = tree.add_pause(300);
        let long = tree.add_pause(5000);
        tree.start(short);
        tree.start(long);

        let wakeup = tree.poll().unwrap();
        assert_eq!(tree.timer_mode(), TimerMode::PausedUntil { deadline: 300 });
        assert_eq!(wakeup.after_ms, 300);
        assert!(wakeup.precise);

        source.advance(300);
        tree.poll();
        assert_eq!(tree[short].state(), AnimationState::Stopped);
        assert_eq!(tree[long].current_time(), 300);
        assert_eq!(tree.timer_mode(), TimerMode::PausedUntil { deadline: 5000 });

        let wakeup = tree.next_wakeup().unwrap();
        assert_eq!(wakeup.after_ms, 4700);
        assert!(!wakeup.precise);
    }

    #[test]
    fn test_sleeping_clock_catches_up_on_demand() {
        let (mut tree, source) = manual_tree(TimerConfig::standard());
        let group = tree.add_sequential_group();
        let first = tree.add_pause(100);
        let second = tree.add_pause(200);
        tree.append_animation(group, first).unwrap();
        tree.append_animation(group, second).unwrap();
        tree.start(group);
        tree.poll();
        assert_eq!(tree.timer_mode(), TimerMode::PausedUntil { deadline: 100 });

        source.advance(150);
        tree.poll();
        assert_eq!(tree[group].current_time(), 150);

        // No wakeup is due yet, so the cursor lags behind the clock.
        source.advance(20);
        tree.poll();
        assert_eq!(tree[group].current_time(), 150);

        tree.ensure_timer_update();
        assert_eq!(tree[group].current_time(), 170);
        assert_eq!(tree[second].current_time(), 70);
    }

    #[test]
    fn test_pause_mode_catches_up_before_pausing() {
        let (mut tree, source) = manual_tree(TimerConfig::standard());
        let anim = tree.add_pause(1000);
        tree.start(anim);
        tree.poll();

        source.advance(400);
        tree.pause(anim).unwrap();
        assert_eq!(tree[anim].current_time(), 400);
    }

    #[test]
    fn test_leaf_start_leaves_pause_mode() {
        let (mut tree, _) = manual_tree(TimerConfig::standard());
        let pause = tree.add_pause(1000);
        tree.start(pause);
        tree.poll();
        assert!(matches!(tree.timer_mode(), TimerMode::PausedUntil { .. }));

        let leaf = tree.add_leaf(Idle(1000));
        tree.start(leaf);
        tree.poll();
        assert_eq!(tree.timer_mode(), TimerMode::Ticking);
    }

    #[test]
    fn test_timer_stops_when_idle() {
        let (mut tree, source) = manual_tree(TimerConfig::standard());
        let anim = tree.add_pause(100);
        tree.start(anim);
        tree.poll();
        source.advance(100);
        let wakeup = tree.poll();

        assert_eq!(tree[anim].state(), AnimationState::Stopped);
        assert_eq!(tree.timer_mode(), TimerMode::Inactive);
        assert!(wakeup.is_none());
    }

    #[test]
    fn test_consistent_timing_uses_interval() {
        let (mut tree, source) = manual_tree(TimerConfig::testing());
        let anim = tree.add_leaf(Idle(1000));
        tree.start(anim);
        tree.poll();
        assert_eq!(tree[anim].current_time(), 16);

        source.advance(500);
        tree.timer_event();
        assert_eq!(tree[anim].current_time(), 32);
    }

    #[test]
    fn test_slow_mode_divides_delta() {
        let config = TimerConfig::standard()
            .with_slow_mode(true)
            .with_slowdown_factor(4.0);
        let (mut tree, source) = manual_tree(config);
        let anim = tree.add_leaf(Idle(1000));
        tree.start(anim);
        tree.poll();

        source.advance(400);
        tree.poll();
        assert_eq!(tree[anim].current_time(), 100);
        assert_eq!(tree.timer_stats().last_delta, 100);
    }

    #[test]
    fn test_unregister_mid_tick_keeps_iteration() {
        let (mut tree, source) = manual_tree(TimerConfig::standard());
        let ids: Vec<_> = [50, 100, 150]
            .into_iter()
            .map(|d| tree.add_pause(d))
            .collect();
        for id in &ids {
            tree.start(*id);
        }
        tree.poll();

        source.advance(60);
        tree.timer_event();
        assert_eq!(tree[ids[0]].state(), AnimationState::Stopped);
        assert_eq!(tree[ids[1]].current_time(), 60);
        assert_eq!(tree[ids[2]].current_time(), 60);
        assert_eq!(tree.running_animations().len(), 2);
    }

    #[test]
    fn test_closest_pause_without_pauses() {
        let (tree, _) = manual_tree(TimerConfig::standard());
        assert_eq!(tree.closest_pause_animation_time_to_finish(), i32::MAX);
    }
}
