//! Spring physics animation
//!
//! RK4-integrated spring driving a numeric property. A spring has no fixed
//! duration: it runs as an uncontrolled animation (`duration == -1`) and
//! finishes once it settles on its target.

use crate::error::Result;
use crate::job::AnimationState;
use crate::leaf::{LeafAnimation, LeafStep};
use cadence_core::{PropertyError, PropertyHandle, PropertyKey, Value, WriteFlags};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Configuration for a spring animation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
}

impl SpringConfig {
    pub fn new(stiffness: f64, damping: f64, mass: f64) -> Self {
        Self {
            stiffness,
            damping,
            mass,
        }
    }

    /// A gentle, slow spring (good for page transitions)
    pub fn gentle() -> Self {
        Self::new(120.0, 14.0, 1.0)
    }

    /// A wobbly spring with overshoot
    pub fn wobbly() -> Self {
        Self::new(180.0, 12.0, 1.0)
    }

    /// A stiff, snappy spring (good for buttons)
    pub fn stiff() -> Self {
        Self::new(400.0, 30.0, 1.0)
    }

    /// A very stiff spring with minimal oscillation
    pub fn snappy() -> Self {
        Self::new(600.0, 40.0, 1.0)
    }

    /// A slow spring with no overshoot (critically damped)
    pub fn molasses() -> Self {
        Self::new(100.0, 20.0, 1.0)
    }

    pub fn critical_damping(&self) -> f64 {
        2.0 * (self.stiffness * self.mass).sqrt()
    }

    /// Whether the spring oscillates around its target
    pub fn is_underdamped(&self) -> bool {
        self.damping < self.critical_damping()
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::stiff()
    }
}

/// A spring simulation
#[derive(Clone, Copy, Debug)]
pub struct Spring {
    config: SpringConfig,
    value: f64,
    velocity: f64,
    target: f64,
}

impl Spring {
    pub fn new(config: SpringConfig, initial: f64) -> Self {
        Self {
            config,
            value: initial,
            velocity: 0.0,
            target: initial,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Jump to `value` and come to rest
    pub fn reset(&mut self, value: f64) {
        self.value = value;
        self.velocity = 0.0;
    }

    pub fn stop_motion(&mut self) {
        self.velocity = 0.0;
    }

    /// Within half a unit of the target and slower than 5 units/s
    pub fn is_settled(&self) -> bool {
        const EPSILON: f64 = 0.5;
        const VELOCITY_EPSILON: f64 = 5.0;

        (self.value - self.target).abs() < EPSILON && self.velocity.abs() < VELOCITY_EPSILON
    }

    /// Advance the simulation by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        if self.is_settled() {
            self.value = self.target;
            self.velocity = 0.0;
            return;
        }

        let k1_v = self.acceleration(self.value, self.velocity);
        let k1_x = self.velocity;

        let k2_v = self.acceleration(
            self.value + k1_x * dt * 0.5,
            self.velocity + k1_v * dt * 0.5,
        );
        let k2_x = self.velocity + k1_v * dt * 0.5;

        let k3_v = self.acceleration(
            self.value + k2_x * dt * 0.5,
            self.velocity + k2_v * dt * 0.5,
        );
        let k3_x = self.velocity + k2_v * dt * 0.5;

        let k4_v = self.acceleration(self.value + k3_x * dt, self.velocity + k3_v * dt);
        let k4_x = self.velocity + k3_v * dt;

        self.velocity += (k1_v + 2.0 * k2_v + 2.0 * k3_v + k4_v) * dt / 6.0;
        self.value += (k1_x + 2.0 * k2_x + 2.0 * k3_x + k4_x) * dt / 6.0;
    }

    fn acceleration(&self, x: f64, v: f64) -> f64 {
        let spring_force = -self.config.stiffness * (x - self.target);
        let damping_force = -self.config.damping * v;
        (spring_force + damping_force) / self.config.mass
    }
}

/// What a running spring does when its target flips to the other side
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReversingMode {
    /// Keep the current velocity and ease into the new target
    #[default]
    Eased,
    /// Drop the velocity and head for the new target from rest
    Immediate,
    /// Jump to the new target and finish on the next update
    Sync,
}

/// Longest integration step, larger frame deltas are subdivided
const MAX_STEP_SECONDS: f64 = 1.0 / 60.0;

/// Spring-driven animation of a numeric property
pub struct SpringAnimation {
    handle: Box<dyn PropertyHandle>,
    key: PropertyKey,
    spring: Spring,
    reversing_mode: ReversingMode,
    last_time: i32,
    snap_pending: bool,
}

impl SpringAnimation {
    /// Animate the numeric property behind `handle` towards `target`
    pub fn new(
        handle: impl PropertyHandle + 'static,
        config: SpringConfig,
        target: f64,
    ) -> Result<Self> {
        let key = handle.key();
        let initial = handle.read()?;
        let Some(initial) = initial.as_f64() else {
            return Err(PropertyError::Missing(format!("{} (not numeric)", key)).into());
        };
        if !handle.is_writable() {
            return Err(PropertyError::ReadOnly(key.to_string()).into());
        }

        let mut spring = Spring::new(config, initial);
        spring.set_target(target);
        Ok(Self {
            handle: Box::new(handle),
            key,
            spring,
            reversing_mode: ReversingMode::default(),
            last_time: 0,
            snap_pending: false,
        })
    }

    pub fn with_reversing_mode(mut self, mode: ReversingMode) -> Self {
        self.reversing_mode = mode;
        self
    }

    pub fn spring(&self) -> &Spring {
        &self.spring
    }

    pub fn reversing_mode(&self) -> ReversingMode {
        self.reversing_mode
    }

    /// Retarget the spring. A target on the other side of the current
    /// motion is a reversal and handled according to the reversing mode.
    pub fn set_target(&mut self, target: f64) {
        let heading = target - self.spring.value();
        let reversing = self.spring.velocity() != 0.0
            && heading != 0.0
            && heading.signum() != self.spring.velocity().signum();
        self.spring.set_target(target);
        if !reversing {
            return;
        }

        tracing::trace!(
            property = %self.key,
            target,
            mode = ?self.reversing_mode,
            "spring reversed"
        );
        match self.reversing_mode {
            ReversingMode::Eased => {}
            ReversingMode::Immediate => self.spring.stop_motion(),
            ReversingMode::Sync => self.snap_pending = true,
        }
    }

    fn write(&self, value: f64) {
        if let Err(err) = self.handle.write(Value::Number(value), WriteFlags::ANIMATION) {
            tracing::trace!(property = %self.key, %err, "animated write rejected");
        }
    }
}

impl LeafAnimation for SpringAnimation {
    fn duration(&self) -> i32 {
        -1
    }

    fn update_current_time(&mut self, current_time: i32) -> LeafStep {
        if self.snap_pending {
            self.snap_pending = false;
            let target = self.spring.target();
            self.spring.reset(target);
            self.write(target);
            return LeafStep::Finished;
        }

        let elapsed = (current_time - self.last_time).max(0);
        self.last_time = current_time;
        let mut remaining = elapsed as f64 / 1000.0;
        while remaining > 0.0 && !self.spring.is_settled() {
            let dt = remaining.min(MAX_STEP_SECONDS);
            self.spring.step(dt);
            remaining -= dt;
        }

        if self.spring.is_settled() {
            let target = self.spring.target();
            self.spring.reset(target);
            self.write(target);
            return LeafStep::Finished;
        }
        self.write(self.spring.value());
        LeafStep::Continue
    }

    fn update_state(&mut self, new_state: AnimationState, old_state: AnimationState) {
        if new_state == AnimationState::Running && old_state == AnimationState::Stopped {
            self.last_time = 0;
            self.snap_pending = false;
            // Pick up writes made while stopped.
            if let Some(value) = self.handle.read().ok().and_then(|v| v.as_f64()) {
                self.spring.reset(value);
            }
        }
    }

    fn top_level_loop_changed(&mut self) {
        self.last_time = 0;
    }

    fn property_key(&self) -> Option<PropertyKey> {
        Some(self.key.clone())
    }

    fn is_target_valid(&self) -> bool {
        self.handle.is_valid()
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
    use cadence_core::Object;

    #[test]
    fn test_spring_settles_to_target() {
        let mut spring = Spring::new(SpringConfig::stiff(), 0.0);
        spring.set_target(100.0);

        for _ in 0..120 {
            spring.step(1.0 / 60.0);
        }

        assert!(spring.is_settled());
        assert!((spring.value() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_spring_presets() {
        assert!(SpringConfig::wobbly().is_underdamped());
        assert!(SpringConfig::gentle().is_underdamped());
        assert!(SpringConfig::stiff().is_underdamped());
    }

    #[test]
    fn test_spring_rk4_stability() {
        let mut spring = Spring::new(SpringConfig::stiff(), 0.0);
        spring.set_target(1000.0);

        for _ in 0..100 {
            spring.step(0.1);
            assert!(spring.value() < 2000.0);
            assert!(spring.value() > -500.0);
        }
    }

    fn spring_tree() -> (AnimationTree, Object) {
        let tree =
            AnimationTree::with_time_source(TimerConfig::standard(), ManualTimeSource::new());
        let rect = Object::new("rect");
        rect.define("x", Value::Number(0.0));
        (tree, rect)
    }

    #[test]
    fn test_animation_finishes_when_settled() {
        let (mut tree, rect) = spring_tree();
        let handle = rect.property("x").unwrap();
        let policy = SpringAnimation::new(handle, SpringConfig::snappy(), 100.0).unwrap();
        let anim = tree.add_leaf(policy);
        assert_eq!(tree.duration(anim), -1);

        tree.start(anim);
        let mut time = 0;
        while tree[anim].is_running() && time < 5000 {
            time += 16;
            tree.set_current_time(anim, time);
        }

        assert_eq!(tree[anim].state(), AnimationState::Stopped);
        assert_eq!(rect.get("x"), Some(Value::Number(100.0)));
        assert!(time < 5000);
    }

    #[test]
    fn test_immediate_reversal_drops_velocity() {
        let (mut tree, rect) = spring_tree();
        let handle = rect.property("x").unwrap();
        let policy = SpringAnimation::new(handle, SpringConfig::gentle(), 100.0)
            .unwrap()
            .with_reversing_mode(ReversingMode::Immediate);
        let anim = tree.add_leaf(policy);
        tree.start(anim);
        tree.set_current_time(anim, 100);

        let spring = tree.leaf_mut::<SpringAnimation>(anim).unwrap();
        assert!(spring.spring().velocity() > 0.0);
        spring.set_target(-50.0);
        assert_eq!(spring.spring().velocity(), 0.0);
    }

    #[test]
    fn test_sync_reversal_snaps_and_finishes() {
        let (mut tree, rect) = spring_tree();
        let handle = rect.property("x").unwrap();
        let policy = SpringAnimation::new(handle, SpringConfig::gentle(), 100.0)
            .unwrap()
            .with_reversing_mode(ReversingMode::Sync);
        let anim = tree.add_leaf(policy);
        tree.start(anim);
        tree.set_current_time(anim, 100);

        tree.leaf_mut::<SpringAnimation>(anim)
            .unwrap()
            .set_target(-50.0);
        tree.set_current_time(anim, 116);

        assert_eq!(tree[anim].state(), AnimationState::Stopped);
        assert_eq!(rect.get("x"), Some(Value::Number(-50.0)));
    }
}
