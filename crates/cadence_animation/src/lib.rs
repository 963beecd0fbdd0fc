//! Cadence Animation Runtime
//!
//! One clock per thread advancing a tree of animations with consistent
//! timing.
//!
//! # Features
//!
//! - **Animation Tree**: Arena of leaf and group animations with a
//!   `Stopped / Running / Paused` state machine, loops and direction
//! - **Unified Clock**: Ticks every running top-level animation with the same
//!   delta; sleeps through pause-only stretches instead of ticking
//! - **Groups**: Sequential and parallel disciplines, including open-ended
//!   (uncontrolled) children such as springs
//! - **Conflict Resolution**: A newer animation of a property stops the older
//!   one, also across trees on other threads
//! - **Leaf Policies**: Property tweens, pauses, actions and springs
//! - **Profiling Hook**: Frame and state telemetry for external profilers
//!
//! # Quick Start
//!
//! ```ignore
//! use cadence_animation::{AnimationTree, PropertyAnimation};
//! use cadence_core::{Object, Value};
//!
//! let rect = Object::new("rect");
//! rect.define("opacity", Value::Number(0.0));
//!
//! let mut tree = AnimationTree::new();
//! let fade = tree.add_leaf(PropertyAnimation::new(rect.property("opacity")?, 1.0, 300)?);
//! let delay = tree.add_pause(100);
//! let group = tree.add_sequential_group();
//! tree.append_animation(group, delay)?;
//! tree.append_animation(group, fade)?;
//! tree.start(group);
//!
//! while let Some(wakeup) = tree.poll() {
//!     std::thread::sleep(std::time::Duration::from_millis(wakeup.after_ms as u64));
//! }
//! ```

pub mod action;
pub mod config;
pub mod easing;
pub mod error;
pub mod group;
pub mod job;
pub mod leaf;
pub mod listener;
pub mod parallel;
pub mod profiler;
pub mod property_animation;
pub mod resolver;
pub mod sequential;
pub mod spring;
pub mod time_source;
pub mod timer;

pub use action::ActionAnimation;
pub use config::TimerConfig;
pub use easing::Easing;
pub use error::{AnimationError, Result};
pub use job::{
    Animation, AnimationId, AnimationState, AnimationTree, Direction, DomainId, GroupKind,
};
pub use leaf::{LeafAnimation, LeafStep, PauseAnimation};
pub use listener::{AnimationListener, ChangeTypes};
pub use profiler::AnimationProfiler;
pub use property_animation::PropertyAnimation;
pub use resolver::{Claim, ConflictResolver};
pub use spring::{ReversingMode, Spring, SpringAnimation, SpringConfig};
pub use time_source::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use timer::{TimerMode, TimerStats, Wakeup};
