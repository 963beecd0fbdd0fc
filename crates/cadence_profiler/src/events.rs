//! Profile event types.

use cadence_animation::AnimationState;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A timestamp relative to the profiling session start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from microseconds.
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(duration.as_micros() as u64)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        self.0 / 1000
    }
}

/// Monotonic clock for session timestamps.
#[derive(Clone, Debug)]
pub struct ProfileClock {
    start: Instant,
}

impl ProfileClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since the clock was (re)started.
    pub fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.start.elapsed())
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for ProfileClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Something the animation runtime reported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileEvent {
    /// The clock advanced `running` top-level animations by `delta_ms`.
    AnimationFrame { delta_ms: i64, running: usize },
    /// An animation changed state.
    StateChanged {
        animation: u64,
        old_state: AnimationState,
        new_state: AnimationState,
    },
}

/// A profile event with its timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub timestamp: Timestamp,
    pub event: ProfileEvent,
}

impl TimestampedEvent {
    pub fn new(timestamp: Timestamp, event: ProfileEvent) -> Self {
        Self { timestamp, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversion() {
        let ts = Timestamp::from_micros(1_500_000);
        assert_eq!(ts.as_millis(), 1500);
        assert_eq!(Timestamp::from_duration(Duration::from_millis(2)).as_micros(), 2000);
    }

    #[test]
    fn test_event_json_is_tagged() -> Result<(), serde_json::Error> {
        let event = ProfileEvent::AnimationFrame {
            delta_ms: 16,
            running: 3,
        };
        let json = serde_json::to_value(&event)?;
        assert_eq!(json["type"], "animation_frame");
        assert_eq!(json["delta_ms"], 16);
        Ok(())
    }
}
