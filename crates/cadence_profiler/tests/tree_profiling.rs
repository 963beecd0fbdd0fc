//! A profiled animation tree reporting to an in-memory debug service.

use cadence_animation::{
    AnimationState, AnimationTree, ManualTimeSource, PropertyAnimation, TimerConfig,
};
use cadence_core::{Object, Value};
use cadence_profiler::{
    attach_installed_profiler, attach_profiler, install_profiler, uninstall_profiler,
    MemoryDebugService, ProfileEvent, ProfilerConfig, SessionState, SharedProfilingSession,
};
use std::sync::Arc;

#[test]
fn test_frames_and_transitions_reach_service() -> anyhow::Result<()> {
    let source = ManualTimeSource::new();
    let mut tree = AnimationTree::with_time_source(TimerConfig::standard(), source.clone());
    let service = Arc::new(MemoryDebugService::new());
    let session = Arc::new(
        SharedProfilingSession::new(ProfilerConfig::testing()).with_service(service.clone()),
    );
    attach_profiler(&mut tree, &session);
    session.start();

    let item = Object::new("item");
    item.define("x", Value::Number(0.0));
    let anim = tree.add_leaf(PropertyAnimation::new(item.property("x")?, 1.0, 100)?);
    tree.start(anim);
    tree.poll();
    for _ in 0..7 {
        source.advance(16);
        tree.poll();
    }
    assert_eq!(tree[anim].state(), AnimationState::Stopped);

    let stats = session.stats();
    assert_eq!(stats.total_frames, 7);
    assert_eq!(stats.total_state_changes, 2);
    assert_eq!(stats.average_frame_delta_ms(), 16.0);

    // Nothing reaches the service before the session stops.
    assert_eq!(service.batch_count(), 0);
    assert_eq!(session.stop()?, 9);
    assert_eq!(session.state(), SessionState::Stopped);

    let events: Vec<ProfileEvent> = service.events()?.into_iter().map(|e| e.event).collect();
    assert_eq!(events.len(), 9);
    assert_eq!(
        events.first(),
        Some(&ProfileEvent::StateChanged {
            animation: anim.to_raw(),
            old_state: AnimationState::Stopped,
            new_state: AnimationState::Running,
        })
    );
    assert_eq!(
        events[1],
        ProfileEvent::AnimationFrame {
            delta_ms: 16,
            running: 1,
        }
    );
    assert_eq!(
        events.last(),
        Some(&ProfileEvent::StateChanged {
            animation: anim.to_raw(),
            old_state: AnimationState::Running,
            new_state: AnimationState::Stopped,
        })
    );
    Ok(())
}

#[test]
fn test_installed_profiler_is_picked_up() {
    let mut tree =
        AnimationTree::with_time_source(TimerConfig::standard(), ManualTimeSource::new());
    assert!(!attach_installed_profiler(&mut tree));

    let session = Arc::new(SharedProfilingSession::new(ProfilerConfig::testing()));
    install_profiler(session.clone());
    assert!(attach_installed_profiler(&mut tree));
    session.start();

    let delay = tree.add_pause(50);
    tree.start(delay);
    assert_eq!(session.stats().total_state_changes, 1);
    uninstall_profiler();
}
