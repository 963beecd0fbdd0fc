//! Optional profiling hook
//!
//! The clock reports every applied frame delta and every state transition to
//! an installed profiler. Nothing in the runtime depends on what the profiler
//! does with them.

use crate::job::AnimationState;

/// Telemetry sink for the animation clock
pub trait AnimationProfiler: Send + Sync {
    /// A tick advanced `running` top-level animations by `delta_ms`
    fn animation_frame(&self, delta_ms: i64, running: usize);

    /// An animation changed state. `animation` is the raw id of the node.
    fn animation_state_changed(
        &self,
        _animation: u64,
        _old_state: AnimationState,
        _new_state: AnimationState,
    ) {
    }
}
