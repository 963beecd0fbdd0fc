//! cadence_profiler - Profiling adapters for the Cadence animation runtime.
//!
//! This crate provides:
//! - A profiling session recording animation frames and state transitions
//! - The debug service boundary that buffered data is reported to
//! - Thread-local installation mirroring the one-tree-per-thread model
//!
//! # Quick Start
//!
//! ```ignore
//! use cadence_animation::AnimationTree;
//! use cadence_profiler::{
//!     attach_profiler, MemoryDebugService, ProfilerConfig, SharedProfilingSession,
//! };
//! use std::sync::Arc;
//!
//! let service = Arc::new(MemoryDebugService::new());
//! let session =
//!     Arc::new(SharedProfilingSession::new(ProfilerConfig::debug()).with_service(service));
//!
//! let mut tree = AnimationTree::new();
//! attach_profiler(&mut tree, &session);
//! session.start();
//!
//! // ... run animations ...
//!
//! // Stopping reports the buffered data to the service.
//! session.stop()?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod service;
pub mod session;

pub use config::ProfilerConfig;
pub use error::{ProfilerError, Result};
pub use events::{ProfileClock, ProfileEvent, Timestamp, TimestampedEvent};
pub use service::{DebugMessage, DebugService, MemoryDebugService};
pub use session::{
    ProfileExport, ProfilingSession, SessionState, SessionStats, SharedProfilingSession,
};

use cadence_animation::{AnimationProfiler, AnimationTree};
use parking_lot::RwLock;
use std::sync::Arc;

/// Thread-local storage for the current profiling session.
std::thread_local! {
    static PROFILER: RwLock<Option<Arc<SharedProfilingSession>>> = const { RwLock::new(None) };
}

/// Install a profiling session for the current thread.
///
/// Trees created on this thread afterwards can pick it up with
/// [`attach_installed_profiler`].
pub fn install_profiler(session: Arc<SharedProfilingSession>) {
    PROFILER.with(|p| {
        *p.write() = Some(session);
    });
}

/// Remove the profiling session from the current thread.
pub fn uninstall_profiler() {
    PROFILER.with(|p| {
        *p.write() = None;
    });
}

/// Get the current profiling session for this thread.
pub fn get_profiler() -> Option<Arc<SharedProfilingSession>> {
    PROFILER.with(|p| p.read().clone())
}

/// Check if a profiler is installed and profiling.
pub fn is_profiling() -> bool {
    get_profiler().map(|p| p.is_profiling()).unwrap_or(false)
}

/// Route a tree's clock telemetry into `session`.
pub fn attach_profiler(tree: &mut AnimationTree, session: &Arc<SharedProfilingSession>) {
    let profiler: Arc<dyn AnimationProfiler> = session.clone();
    tree.set_profiler(Some(profiler));
}

/// Attach the thread's installed session to `tree`, if there is one.
pub fn attach_installed_profiler(tree: &mut AnimationTree) -> bool {
    match get_profiler() {
        Some(session) => {
            attach_profiler(tree, &session);
            true
        }
        None => false,
    }
}

/// Detach whatever profiler the tree reports to.
pub fn detach_profiler(tree: &mut AnimationTree) {
    tree.set_profiler(None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_thread_local() {
        let session = Arc::new(SharedProfilingSession::new(ProfilerConfig::testing()));
        install_profiler(session.clone());
        assert!(get_profiler().is_some());
        assert!(!is_profiling());

        session.start();
        assert!(is_profiling());

        let elsewhere = std::thread::spawn(|| get_profiler().is_none()).join();
        assert_eq!(elsewhere.ok(), Some(true));

        uninstall_profiler();
        assert!(get_profiler().is_none());
    }
}
