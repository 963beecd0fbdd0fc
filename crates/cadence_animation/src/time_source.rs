//! Monotonic millisecond clocks feeding the animation timer

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A monotonic source of milliseconds
pub trait TimeSource {
    /// Milliseconds elapsed since an arbitrary fixed origin
    fn now_ms(&self) -> i64;
}

/// Wall-clock source backed by [`Instant`]
#[derive(Clone, Copy, Debug)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

/// Manually advanced source, shared between the tree and the test driving it
#[derive(Clone, Debug, Default)]
pub struct ManualTimeSource {
    now: Arc<AtomicI64>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `ms`
    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute reading
    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_source_is_shared() {
        let source = ManualTimeSource::new();
        let observer = source.clone();
        source.advance(40);
        source.advance(2);
        assert_eq!(observer.now_ms(), 42);
        observer.set(7);
        assert_eq!(source.now_ms(), 7);
    }

    #[test]
    fn test_system_source_is_monotonic() {
        let source = SystemTimeSource::new();
        let a = source.now_ms();
        let b = source.now_ms();
        assert!(b >= a);
    }
}
