//! Profiling configuration presets.

use serde::{Deserialize, Serialize};

/// Configuration for a profiling session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Maximum number of events kept between flushes (ring buffer size).
    pub max_events: usize,
    /// Whether to record animation state transitions (frames are always recorded).
    pub record_state_changes: bool,
    /// Frames with a delta below this are not recorded (ms).
    pub min_frame_delta_ms: i64,
    /// Maximum number of messages per batch sent to the debug service.
    pub batch_size: usize,
    /// Application name reported to the debug service.
    pub app_name: String,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl ProfilerConfig {
    /// Standard configuration for general use.
    pub fn standard() -> Self {
        Self {
            max_events: 10_000,
            record_state_changes: false,
            min_frame_delta_ms: 0,
            batch_size: 256,
            app_name: "cadence_app".to_string(),
        }
    }

    /// Debug configuration recording everything.
    pub fn debug() -> Self {
        Self {
            max_events: 50_000,
            record_state_changes: true,
            min_frame_delta_ms: 0,
            batch_size: 1024,
            app_name: "cadence_app".to_string(),
        }
    }

    /// Minimal configuration for low overhead.
    pub fn minimal() -> Self {
        Self {
            max_events: 1_000,
            record_state_changes: false,
            min_frame_delta_ms: 4,
            batch_size: 64,
            app_name: "cadence_app".to_string(),
        }
    }

    /// Testing configuration optimized for test runs.
    pub fn testing() -> Self {
        Self {
            max_events: 10_000,
            record_state_changes: true,
            min_frame_delta_ms: 0,
            batch_size: 16,
            app_name: "cadence_test".to_string(),
        }
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the maximum number of buffered events.
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Enable or disable state transition recording.
    pub fn with_state_changes(mut self, record: bool) -> Self {
        self.record_state_changes = record;
        self
    }

    /// Set the batch size for debug service messages.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(!ProfilerConfig::standard().record_state_changes);
        assert!(ProfilerConfig::debug().record_state_changes);
        assert_eq!(ProfilerConfig::testing().app_name, "cadence_test");
        assert_eq!(ProfilerConfig::minimal().with_batch_size(0).batch_size, 1);
    }
}
