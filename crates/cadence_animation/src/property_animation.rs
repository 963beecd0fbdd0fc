//! Timed property animation
//!
//! Interpolates a property from a start value to an end value over a fixed
//! duration. When no start value is given, the property's value at the
//! moment the animation starts is used.

use crate::easing::Easing;
use crate::error::Result;
use crate::job::AnimationState;
use crate::leaf::{sanitize_duration, LeafAnimation, LeafStep};
use cadence_core::{PropertyError, PropertyHandle, PropertyKey, Value, WriteFlags};
use std::any::Any;

/// Interpolates one property over time
pub struct PropertyAnimation {
    handle: Box<dyn PropertyHandle>,
    key: PropertyKey,
    from: Option<Value>,
    to: Value,
    /// Start value read from the property when running without `from`
    captured: Option<Value>,
    duration: i32,
    easing: Easing,
}

impl PropertyAnimation {
    /// Animate the property behind `handle` to `to` over `duration` ms.
    ///
    /// Fails when the property is missing, its target is gone, or it cannot
    /// be written.
    pub fn new(
        handle: impl PropertyHandle + 'static,
        to: impl Into<Value>,
        duration: i32,
    ) -> Result<Self> {
        let key = handle.key();
        if !handle.is_valid() {
            // Tell a destroyed target apart from a missing property.
            handle.read()?;
            return Err(PropertyError::Missing(key.to_string()).into());
        }
        if !handle.is_writable() {
            return Err(PropertyError::ReadOnly(key.to_string()).into());
        }

        Ok(Self {
            handle: Box::new(handle),
            key,
            from: None,
            to: to.into(),
            captured: None,
            duration: sanitize_duration(duration, "PropertyAnimation"),
            easing: Easing::default(),
        })
    }

    /// Start from `from` instead of the property's current value
    pub fn with_from(mut self, from: impl Into<Value>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn from_value(&self) -> Option<&Value> {
        self.from.as_ref()
    }

    pub fn to_value(&self) -> &Value {
        &self.to
    }

    pub fn set_to(&mut self, to: impl Into<Value>) {
        self.to = to.into();
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Change the duration. Negative durations are rejected.
    pub fn set_duration(&mut self, duration: i32) {
        if duration < 0 {
            tracing::warn!(
                target: "cadence_animation::usage",
                duration,
                property = %self.key,
                "PropertyAnimation: cannot set a negative duration"
            );
            return;
        }
        self.duration = duration;
    }

    fn start_value(&self) -> Option<&Value> {
        self.from.as_ref().or(self.captured.as_ref())
    }
}

impl LeafAnimation for PropertyAnimation {
    fn duration(&self) -> i32 {
        self.duration
    }

    fn update_current_time(&mut self, current_time: i32) -> LeafStep {
        let progress = if self.duration == 0 {
            1.0
        } else {
            current_time as f64 / self.duration as f64
        };
        let Some(start) = self.start_value() else {
            return LeafStep::Continue;
        };

        let value = start.interpolate(&self.to, self.easing.apply(progress));
        if let Err(err) = self.handle.write(value, WriteFlags::ANIMATION) {
            tracing::trace!(property = %self.key, %err, "animated write rejected");
        }
        LeafStep::Continue
    }

    fn update_state(&mut self, new_state: AnimationState, old_state: AnimationState) {
        if new_state == AnimationState::Running && old_state == AnimationState::Stopped {
            self.captured = if self.from.is_none() {
                self.handle.read().ok()
            } else {
                None
            };
        }
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
