//! Profiling session state machine.

use crate::config::ProfilerConfig;
use crate::error::Result;
use crate::events::{ProfileClock, ProfileEvent, Timestamp, TimestampedEvent};
use crate::service::{DebugMessage, DebugService};
use cadence_animation::{AnimationProfiler, AnimationState};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of the profiling session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Not profiling.
    Idle,
    /// Actively recording frames and transitions.
    Profiling,
    /// Profiling paused (can resume).
    Paused,
    /// Profiling stopped (cannot resume, only flush or export).
    Stopped,
}

/// Statistics for a profiling session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames recorded.
    pub total_frames: u64,
    /// State transitions recorded.
    pub total_state_changes: u64,
    /// Sum of all recorded frame deltas (ms).
    pub total_frame_time_ms: i64,
    /// Largest recorded frame delta (ms).
    pub max_frame_delta_ms: i64,
    /// Events dropped due to buffer overflow.
    pub events_dropped: u64,
    /// Events handed to the debug service.
    pub events_flushed: u64,
    /// Successful flushes.
    pub flushes: u64,
    /// Last event timestamp.
    pub last_event_time: Option<Timestamp>,
}

impl SessionStats {
    /// Mean frame delta in ms, 0 without frames.
    pub fn average_frame_delta_ms(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.total_frame_time_ms as f64 / self.total_frames as f64
        }
    }
}

/// A profiling session buffering animation telemetry.
pub struct ProfilingSession {
    config: ProfilerConfig,
    state: SessionState,
    clock: ProfileClock,
    /// Ring buffer of events not yet flushed.
    events: VecDeque<TimestampedEvent>,
    /// Sequence number of the next flushed message.
    next_sequence: u64,
    pause_duration: Duration,
    pause_start: Option<Instant>,
    stats: SessionStats,
}

impl ProfilingSession {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            clock: ProfileClock::new(),
            events: VecDeque::new(),
            next_sequence: 0,
            pause_duration: Duration::ZERO,
            pause_start: None,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn is_profiling(&self) -> bool {
        self.state == SessionState::Profiling
    }

    /// Start profiling, or resume when paused.
    pub fn start(&mut self) {
        match self.state {
            SessionState::Idle => {
                self.clock.reset();
                self.events.clear();
                self.next_sequence = 0;
                self.pause_duration = Duration::ZERO;
                self.stats = SessionStats::default();
                self.state = SessionState::Profiling;
                tracing::debug!(app = %self.config.app_name, "profiling started");
            }
            SessionState::Paused => {
                if let Some(pause_start) = self.pause_start.take() {
                    self.pause_duration += pause_start.elapsed();
                }
                self.state = SessionState::Profiling;
            }
            _ => {}
        }
    }

    pub fn pause(&mut self) {
        if self.state == SessionState::Profiling {
            self.pause_start = Some(Instant::now());
            self.state = SessionState::Paused;
        }
    }

    /// Stop profiling. Buffered events stay available for flushing.
    pub fn stop(&mut self) {
        if self.state == SessionState::Profiling || self.state == SessionState::Paused {
            self.state = SessionState::Stopped;
            self.pause_start = None;
            tracing::debug!(
                app = %self.config.app_name,
                frames = self.stats.total_frames,
                "profiling stopped"
            );
        }
    }

    /// Back to idle, discarding everything.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.events.clear();
        self.next_sequence = 0;
        self.pause_duration = Duration::ZERO;
        self.pause_start = None;
        self.stats = SessionStats::default();
    }

    /// Current timestamp, paused time excluded.
    pub fn current_timestamp(&self) -> Timestamp {
        let raw = self.clock.now();
        let pause_micros = self.pause_duration.as_micros() as u64;
        Timestamp::from_micros(raw.as_micros().saturating_sub(pause_micros))
    }

    pub fn record_frame(&mut self, delta_ms: i64, running: usize) {
        if self.state != SessionState::Profiling || delta_ms < self.config.min_frame_delta_ms {
            return;
        }
        self.stats.total_frames += 1;
        self.stats.total_frame_time_ms += delta_ms;
        self.stats.max_frame_delta_ms = self.stats.max_frame_delta_ms.max(delta_ms);
        self.push(ProfileEvent::AnimationFrame { delta_ms, running });
    }

    pub fn record_state_change(
        &mut self,
        animation: u64,
        old_state: AnimationState,
        new_state: AnimationState,
    ) {
        if self.state != SessionState::Profiling || !self.config.record_state_changes {
            return;
        }
        self.stats.total_state_changes += 1;
        self.push(ProfileEvent::StateChanged {
            animation,
            old_state,
            new_state,
        });
    }

    fn push(&mut self, event: ProfileEvent) {
        let timestamp = self.current_timestamp();

        // Ring buffer: remove oldest if at capacity
        if self.events.len() >= self.config.max_events {
            self.events.pop_front();
            self.stats.events_dropped += 1;
        }
        self.events.push_back(TimestampedEvent::new(timestamp, event));
        self.stats.last_event_time = Some(timestamp);
    }

    /// Events buffered since the last flush.
    pub fn events(&self) -> &VecDeque<TimestampedEvent> {
        &self.events
    }

    /// Hand buffered events to `service` in batches and return how many
    /// were delivered.
    ///
    /// Events of a batch the service rejects stay buffered for the next
    /// attempt.
    pub fn report_data(&mut self, service: &dyn DebugService) -> Result<usize> {
        let mut delivered = 0;
        while !self.events.is_empty() {
            let count = self.events.len().min(self.config.batch_size.max(1));
            let batch = self
                .events
                .iter()
                .take(count)
                .enumerate()
                .map(|(i, event)| {
                    let sequence = self.next_sequence + i as u64;
                    DebugMessage::encode(&self.config.app_name, sequence, event)
                })
                .collect::<Result<Vec<_>>>()?;

            service.send_messages(batch)?;
            self.events.drain(..count);
            self.next_sequence += count as u64;
            self.stats.events_flushed += count as u64;
            delivered += count;
        }
        if delivered > 0 {
            self.stats.flushes += 1;
            tracing::trace!(delivered, "profile data reported");
        }
        Ok(delivered)
    }

    pub fn export(&self) -> ProfileExport {
        ProfileExport {
            config: self.config.clone(),
            events: self.events.iter().cloned().collect(),
            stats: self.stats.clone(),
        }
    }
}

/// Buffered profile data for serialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileExport {
    pub config: ProfilerConfig,
    pub events: Vec<TimestampedEvent>,
    pub stats: SessionStats,
}

impl ProfileExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Thread-safe profiling session, installable as the animation clock's profiler.
pub struct SharedProfilingSession {
    inner: RwLock<ProfilingSession>,
    service: RwLock<Option<Arc<dyn DebugService>>>,
}

impl SharedProfilingSession {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            inner: RwLock::new(ProfilingSession::new(config)),
            service: RwLock::new(None),
        }
    }

    /// Flush to `service` when profiling stops.
    pub fn with_service(self, service: Arc<dyn DebugService>) -> Self {
        *self.service.write() = Some(service);
        self
    }

    pub fn set_service(&self, service: Option<Arc<dyn DebugService>>) {
        *self.service.write() = service;
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state()
    }

    pub fn is_profiling(&self) -> bool {
        self.inner.read().is_profiling()
    }

    pub fn start(&self) {
        self.inner.write().start();
    }

    pub fn pause(&self) {
        self.inner.write().pause();
    }

    /// Stop profiling and report buffered data to the debug service.
    pub fn stop(&self) -> Result<usize> {
        self.inner.write().stop();
        self.report_data()
    }

    pub fn reset(&self) {
        self.inner.write().reset();
    }

    /// Flush buffered events to the debug service, if one is attached.
    pub fn report_data(&self) -> Result<usize> {
        let Some(service) = self.service.read().clone() else {
            return Ok(0);
        };
        let result = self.inner.write().report_data(service.as_ref());
        if let Err(err) = &result {
            tracing::warn!(%err, "failed to report profile data");
        }
        result
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.read().stats().clone()
    }

    pub fn export(&self) -> ProfileExport {
        self.inner.read().export()
    }

    pub fn with_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ProfilingSession) -> R,
    {
        f(&self.inner.read())
    }
}

impl AnimationProfiler for SharedProfilingSession {
    fn animation_frame(&self, delta_ms: i64, running: usize) {
        self.inner.write().record_frame(delta_ms, running);
    }

    fn animation_state_changed(
        &self,
        animation: u64,
        old_state: AnimationState,
        new_state: AnimationState,
    ) {
        self.inner
            .write()
            .record_state_change(animation, old_state, new_state);
    }
}
