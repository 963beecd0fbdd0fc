//! Animation timer configuration presets.

use crate::error::{AnimationError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the animation clock of one [`AnimationTree`](crate::AnimationTree).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Interval between ticks while animations are running (ms).
    pub interval_ms: u32,
    /// Advance by exactly `interval_ms` per tick instead of measured time.
    pub consistent_timing: bool,
    /// Slow every delta down by `slowdown_factor`.
    pub slow_mode: bool,
    /// Divisor applied to deltas in slow mode.
    pub slowdown_factor: f64,
    /// Existing animations are brought up to date before new ones join the
    /// tick list when more than this many ms passed since the last tick.
    pub catch_up_threshold_ms: u32,
    /// Pause-only wakeups shorter than this use a precise timer.
    pub precise_pause_threshold_ms: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl TimerConfig {
    /// Standard configuration: 60Hz ticks driven by measured time.
    pub fn standard() -> Self {
        Self {
            interval_ms: 16,
            consistent_timing: false,
            slow_mode: false,
            slowdown_factor: 5.0,
            catch_up_threshold_ms: 50,
            precise_pause_threshold_ms: 2000,
        }
    }

    /// Debug configuration: slow motion for inspecting transitions.
    pub fn debug() -> Self {
        Self {
            slow_mode: true,
            ..Self::standard()
        }
    }

    /// Testing configuration: every tick advances by a fixed interval.
    pub fn testing() -> Self {
        Self {
            consistent_timing: true,
            ..Self::standard()
        }
    }

    /// Parse a configuration from a TOML fragment.
    ///
    /// Missing keys fall back to [`TimerConfig::standard`].
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: TimerConfig =
            toml::from_str(source).map_err(|e| AnimationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the clock cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(AnimationError::Config(
                "interval_ms must be greater than zero".to_string(),
            ));
        }
        if !self.slowdown_factor.is_finite() || self.slowdown_factor < 0.0 {
            return Err(AnimationError::Config(format!(
                "invalid slowdown_factor {}",
                self.slowdown_factor
            )));
        }
        Ok(())
    }

    /// Set the tick interval.
    pub fn with_interval(mut self, interval_ms: u32) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Enable or disable consistent timing.
    pub fn with_consistent_timing(mut self, enabled: bool) -> Self {
        self.consistent_timing = enabled;
        self
    }

    /// Enable or disable slow mode.
    pub fn with_slow_mode(mut self, enabled: bool) -> Self {
        self.slow_mode = enabled;
        self
    }

    /// Set the slow mode divisor.
    pub fn with_slowdown_factor(mut self, factor: f64) -> Self {
        self.slowdown_factor = factor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let standard = TimerConfig::standard();
        assert_eq!(standard.interval_ms, 16);
        assert!(!standard.consistent_timing);
        assert!(TimerConfig::debug().slow_mode);
        assert!(TimerConfig::testing().consistent_timing);
        assert_eq!(TimerConfig::default(), standard);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = TimerConfig::from_toml_str(
            r#"
            interval_ms = 8
            slow_mode = true
            "#,
        )
        .unwrap();
        assert_eq!(config.interval_ms, 8);
        assert!(config.slow_mode);
        assert_eq!(config.catch_up_threshold_ms, 50);
        assert_eq!(config.slowdown_factor, 5.0);
    }

    #[test]
    fn test_from_toml_rejects_zero_interval() {
        let err = TimerConfig::from_toml_str("interval_ms = 0").unwrap_err();
        assert!(matches!(err, AnimationError::Config(_)));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(TimerConfig::from_toml_str("interval_ms = \"fast\"").is_err());
    }
}
