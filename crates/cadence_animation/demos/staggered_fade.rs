//! Staggered Fade Demo
//!
//! Fades a row of items in one after another, then springs the row into
//! place. Runs on the wall clock and sleeps between polls like a host event
//! loop would.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=cadence_animation=debug cargo run -p cadence_animation --example staggered_fade
//! ```

use cadence_animation::{
    AnimationTree, Easing, PropertyAnimation, SpringAnimation, SpringConfig, TimerConfig,
};
use cadence_core::{Object, Value};
use std::time::{Duration, Instant};

const ITEMS: usize = 4;
const STAGGER_MS: i32 = 80;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut tree = AnimationTree::with_config(TimerConfig::standard());
    let row = Object::new("row");
    row.define("offset", Value::Number(-40.0));

    let items: Vec<Object> = (0..ITEMS)
        .map(|i| {
            let item = Object::new(format!("item-{i}"));
            item.define("opacity", Value::Number(0.0));
            item
        })
        .collect();

    // Each item waits its turn, then fades in. All items run side by side.
    let fades = tree.add_parallel_group();
    for (i, item) in items.iter().enumerate() {
        let step = tree.add_sequential_group();
        let delay = tree.add_pause(STAGGER_MS * i as i32);
        let fade = tree.add_leaf(
            PropertyAnimation::new(item.property("opacity")?, 1.0, 250)?
                .with_easing(Easing::EaseOutCubic),
        );
        tree.append_animation(step, delay)?;
        tree.append_animation(step, fade)?;
        tree.append_animation(fades, step)?;
    }

    let settle = tree.add_leaf(SpringAnimation::new(
        row.property("offset")?,
        SpringConfig::wobbly(),
        0.0,
    )?);
    let intro = tree.add_sequential_group();
    tree.append_animation(intro, fades)?;
    tree.append_animation(intro, settle)?;

    let started = Instant::now();
    tree.start(intro);
    while let Some(wakeup) = tree.poll() {
        std::thread::sleep(Duration::from_millis(wakeup.after_ms.max(1) as u64));
        let opacities: Vec<String> = items
            .iter()
            .map(|item| match item.get("opacity") {
                Some(Value::Number(v)) => format!("{v:.2}"),
                _ => "-".to_string(),
            })
            .collect();
        tracing::debug!(offset = ?row.get("offset"), opacity = ?opacities, "frame");
    }

    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        frames = tree.timer_stats().frames,
        "intro finished"
    );
    Ok(())
}
