//! Property conflicts within one tree and across trees on other threads.

use cadence_animation::{
    AnimationState, AnimationTree, Claim, ConflictResolver, ManualTimeSource, PropertyAnimation,
    TimerConfig,
};
use cadence_core::{
    Object, PropertyError, PropertyHandle, PropertyKey, TargetId, Value, WriteFlags,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

fn manual_tree() -> (AnimationTree, ManualTimeSource) {
    let source = ManualTimeSource::new();
    let tree = AnimationTree::with_time_source(TimerConfig::standard(), source.clone());
    (tree, source)
}

/// Thread-safe numeric property, shared by trees on different threads
#[derive(Clone)]
struct SharedSlot {
    key: PropertyKey,
    value: Arc<Mutex<f64>>,
}

impl SharedSlot {
    fn new(name: &str) -> Self {
        Self {
            key: PropertyKey::new(TargetId::next(), name),
            value: Arc::new(Mutex::new(0.0)),
        }
    }
}

impl PropertyHandle for SharedSlot {
    fn key(&self) -> PropertyKey {
        self.key.clone()
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn read(&self) -> Result<Value, PropertyError> {
        Ok(Value::Number(*self.value.lock()))
    }

    fn write(&self, value: Value, _flags: WriteFlags) -> Result<(), PropertyError> {
        if let Some(number) = value.as_f64() {
            *self.value.lock() = number;
        }
        Ok(())
    }
}

#[test]
fn test_newer_animation_stops_older_chain() -> anyhow::Result<()> {
    let (mut tree, source) = manual_tree();
    let item = Object::new("item");
    item.define("x", Value::Number(0.0));
    item.define("y", Value::Number(0.0));

    // An older sequence moving x, then y.
    let sequence = tree.add_sequential_group();
    let older = tree.add_leaf(PropertyAnimation::new(item.property("x")?, 100.0, 1000)?);
    let follow_up = tree.add_leaf(PropertyAnimation::new(item.property("y")?, 100.0, 1000)?);
    tree.append_animation(sequence, older)?;
    tree.append_animation(sequence, follow_up)?;
    tree.start(sequence);
    tree.poll();
    source.advance(100);
    tree.poll();

    let newer = tree.add_leaf(PropertyAnimation::new(item.property("x")?, -100.0, 1000)?);
    tree.start(newer);

    assert_eq!(tree[older].state(), AnimationState::Stopped);
    assert_eq!(tree[sequence].state(), AnimationState::Stopped);
    assert_eq!(tree[newer].state(), AnimationState::Running);
    let key = item.property("x")?.key();
    assert_eq!(
        tree.resolver().claimant(&key),
        Some(Claim {
            domain: tree.domain(),
            animation: newer,
        })
    );

    // The follow-up never ran, so only the newer animation drives x.
    source.advance(100);
    tree.poll();
    assert_eq!(tree[follow_up].state(), AnimationState::Stopped);
    assert_eq!(item.get("y"), Some(Value::Number(0.0)));
    Ok(())
}

#[test]
fn test_handover_inside_one_group_keeps_group_running() -> anyhow::Result<()> {
    let (mut tree, source) = manual_tree();
    let item = Object::new("item");
    item.define("x", Value::Number(0.0));

    let sequence = tree.add_sequential_group();
    let out = tree.add_leaf(PropertyAnimation::new(item.property("x")?, 100.0, 100)?);
    let back = tree.add_leaf(PropertyAnimation::new(item.property("x")?, 0.0, 100)?);
    tree.append_animation(sequence, out)?;
    tree.append_animation(sequence, back)?;

    tree.start(sequence);
    tree.poll();
    source.advance(150);
    tree.poll();

    assert_eq!(tree[sequence].state(), AnimationState::Running);
    assert_eq!(tree.current_animation(sequence), Some(back));
    assert_eq!(item.get("x"), Some(Value::Number(50.0)));
    Ok(())
}

#[test]
fn test_stop_releases_claim() -> anyhow::Result<()> {
    let (mut tree, _source) = manual_tree();
    let item = Object::new("item");
    item.define("x", Value::Number(0.0));

    let anim = tree.add_leaf(PropertyAnimation::new(item.property("x")?, 1.0, 100)?);
    tree.start(anim);
    assert_eq!(tree.resolver().len(), 1);
    tree.stop(anim);
    tree.stop(anim);
    assert!(tree.resolver().is_empty());
    Ok(())
}

#[test]
fn test_eviction_from_another_thread() -> anyhow::Result<()> {
    let resolver = ConflictResolver::new();
    let slot = SharedSlot::new("x");

    let (tree, source) = manual_tree();
    let mut tree = tree.with_resolver(resolver.clone());
    let local = tree.add_leaf(PropertyAnimation::new(slot.clone(), 100.0, 1000)?);
    tree.start(local);
    tree.poll();
    source.advance(16);
    tree.poll();
    assert_eq!(tree[local].state(), AnimationState::Running);

    let remote_resolver = resolver.clone();
    let remote_slot = slot.clone();
    let (remote, claimed) = thread::spawn(move || -> anyhow::Result<(Claim, Option<Claim>)> {
        let key = remote_slot.key();
        let mut remote_tree =
            AnimationTree::with_time_source(TimerConfig::standard(), ManualTimeSource::new())
                .with_resolver(remote_resolver);
        let anim = remote_tree.add_leaf(PropertyAnimation::new(remote_slot, -100.0, 1000)?);
        remote_tree.start(anim);
        let claim = Claim {
            domain: remote_tree.domain(),
            animation: anim,
        };
        Ok((claim, remote_tree.resolver().claimant(&key)))
    })
    .join()
    .map_err(|_| anyhow::anyhow!("remote tree panicked"))??;
    assert_eq!(claimed, Some(remote));
    // Dropping the remote tree gave up its claim.
    assert_eq!(resolver.claimant(&slot.key), None);

    // The stop waits in this tree's mailbox until the next poll.
    assert_eq!(tree[local].state(), AnimationState::Running);
    assert!(tree.has_pending_work());

    tree.poll();
    assert_eq!(tree[local].state(), AnimationState::Stopped);
    assert!(!tree.has_pending_work());
    Ok(())
}
