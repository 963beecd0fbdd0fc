//! Clock-driven scenarios: the host polls, the manual time source advances.

use cadence_animation::{
    AnimationId, AnimationListener, AnimationState, AnimationTree, ChangeTypes, Direction,
    ManualTimeSource, PropertyAnimation, TimerConfig, TimerMode,
};
use cadence_core::{Object, Value};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Default)]
struct FinishCounter {
    finished: Cell<u32>,
}

impl AnimationListener for FinishCounter {
    fn animation_finished(&self, _tree: &mut AnimationTree, _id: AnimationId) {
        self.finished.set(self.finished.get() + 1);
    }
}

fn manual_tree() -> (AnimationTree, ManualTimeSource) {
    let source = ManualTimeSource::new();
    let tree = AnimationTree::with_time_source(TimerConfig::standard(), source.clone());
    (tree, source)
}

fn object_with(names: &[&str]) -> Object {
    let object = Object::new("item");
    for name in names {
        object.define(name, Value::Number(0.0));
    }
    object
}

#[test]
fn test_two_loops_of_one_second() -> anyhow::Result<()> {
    let (mut tree, source) = manual_tree();
    let item = object_with(&["x"]);
    let anim = tree.add_leaf(PropertyAnimation::new(item.property("x")?, 100.0, 1000)?);
    tree.set_loop_count(anim, 2);
    let counter = Rc::new(FinishCounter::default());
    tree.add_change_listener(anim, &counter, ChangeTypes::COMPLETION)?;

    tree.start(anim);
    assert_eq!(tree[anim].state(), AnimationState::Running);
    assert_eq!(tree[anim].current_time(), 0);
    assert_eq!(tree[anim].current_loop(), 0);
    assert_eq!(tree.poll().map(|w| w.after_ms), Some(16));

    source.advance(1500);
    tree.poll();
    assert_eq!(tree[anim].current_loop(), 1);
    assert_eq!(tree[anim].current_time(), 500);
    assert_eq!(item.get("x"), Some(Value::Number(50.0)));

    source.advance(500);
    tree.poll();
    assert_eq!(tree[anim].current_loop(), 1);
    assert_eq!(tree[anim].current_time(), 1000);
    assert_eq!(tree[anim].total_current_time(), 2000);
    assert_eq!(tree[anim].state(), AnimationState::Stopped);
    assert_eq!(counter.finished.get(), 1);

    // Nothing left to drive.
    assert_eq!(tree.poll(), None);
    assert_eq!(tree.timer_mode(), TimerMode::Inactive);
    Ok(())
}

#[test]
fn test_animations_started_in_one_frame_share_first_delta() -> anyhow::Result<()> {
    let (mut tree, source) = manual_tree();
    let item = object_with(&["a", "b", "c"]);

    let first = tree.add_leaf(PropertyAnimation::new(item.property("a")?, 100.0, 1000)?);
    tree.start(first);
    tree.poll();

    // A long frame passes before the next two start.
    source.advance(400);
    let second = tree.add_leaf(PropertyAnimation::new(item.property("b")?, 100.0, 1000)?);
    let third = tree.add_leaf(PropertyAnimation::new(item.property("c")?, 100.0, 1000)?);
    tree.start(second);
    tree.start(third);
    assert!(tree.has_pending_work());

    tree.poll();
    assert_eq!(tree[first].current_time(), 400);
    assert_eq!(tree[second].current_time(), 0);
    assert_eq!(tree[third].current_time(), 0);

    source.advance(16);
    tree.poll();
    assert_eq!(tree[first].current_time(), 416);
    assert_eq!(tree[second].current_time(), 16);
    assert_eq!(tree[third].current_time(), 16);
    Ok(())
}

#[test]
fn test_backward_run_lands_at_start() -> anyhow::Result<()> {
    let (mut tree, source) = manual_tree();
    let item = object_with(&["x"]);
    let anim = tree.add_leaf(
        PropertyAnimation::new(item.property("x")?, 100.0, 300)?.with_from(0.0),
    );
    tree.set_loop_count(anim, 2);

    tree.set_direction(anim, Direction::Backward);
    assert_eq!(tree[anim].current_time(), 300);
    assert_eq!(tree[anim].current_loop(), 1);

    tree.start(anim);
    tree.poll();
    assert_eq!(tree[anim].total_current_time(), 600);

    source.advance(450);
    tree.poll();
    assert_eq!(tree[anim].current_loop(), 0);
    assert_eq!(tree[anim].current_time(), 150);
    assert_eq!(item.get("x"), Some(Value::Number(50.0)));

    source.advance(200);
    tree.poll();
    assert_eq!(tree[anim].current_loop(), 0);
    assert_eq!(tree[anim].current_time(), 0);
    assert_eq!(tree[anim].state(), AnimationState::Stopped);
    Ok(())
}

#[test]
fn test_delay_sequence_sleeps_through_pause() -> anyhow::Result<()> {
    let (mut tree, source) = manual_tree();
    let item = object_with(&["opacity"]);
    let delay = tree.add_pause(300);
    let group = tree.add_sequential_group();
    tree.append_animation(group, delay)?;

    tree.start(group);
    let wakeup = tree.poll().expect("pause keeps the clock alive");
    assert_eq!(tree.timer_mode(), TimerMode::PausedUntil { deadline: 300 });
    assert_eq!(wakeup.after_ms, 300);
    assert!(wakeup.precise);

    // Adding a real animation switches back to regular ticks.
    let fade = tree.add_leaf(PropertyAnimation::new(item.property("opacity")?, 1.0, 200)?);
    tree.append_animation(group, fade)?;
    source.advance(300);
    tree.poll();
    assert_eq!(tree.current_animation(group), Some(fade));
    assert_eq!(tree.timer_mode(), TimerMode::Ticking);

    source.advance(200);
    tree.poll();
    assert_eq!(tree[group].state(), AnimationState::Stopped);
    assert_eq!(item.get("opacity"), Some(Value::Number(1.0)));
    Ok(())
}
