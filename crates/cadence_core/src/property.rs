//! Property handle capability
//!
//! Animations never see the object model directly. They hold a
//! [`PropertyHandle`] which can read the current value, write a new one and
//! report whether the target still exists.

use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an animatable object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        TargetId(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        TargetId(raw)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A (target, property name) pair
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyKey {
    pub target: TargetId,
    pub name: String,
}

impl PropertyKey {
    pub fn new(target: TargetId, name: impl Into<String>) -> Self {
        Self {
            target,
            name: name.into(),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.name)
    }
}

/// How a write interacts with the target's property machinery
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteFlags {
    /// Skip value interceptors installed on the property
    pub bypass_interceptor: bool,
    /// Keep an existing binding alive instead of breaking it
    pub preserve_binding: bool,
}

impl WriteFlags {
    /// Flags used by animations: interceptors bypassed, bindings preserved
    pub const ANIMATION: WriteFlags = WriteFlags {
        bypass_interceptor: true,
        preserve_binding: true,
    };

    /// A plain user write
    pub const USER: WriteFlags = WriteFlags {
        bypass_interceptor: false,
        preserve_binding: false,
    };
}

/// Read/write capability for a single property of a target object
pub trait PropertyHandle {
    /// Identity of the animated property
    fn key(&self) -> PropertyKey;

    /// Whether the target object still exists and owns the property
    fn is_valid(&self) -> bool;

    /// Whether writes can succeed
    fn is_writable(&self) -> bool;

    /// Current value of the property
    fn read(&self) -> Result<Value>;

    /// Write a new value
    fn write(&self, value: Value, flags: WriteFlags) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ids_are_unique() {
        let a = TargetId::next();
        let b = TargetId::next();
        assert_ne!(a, b);
        assert_eq!(TargetId::from_raw(a.to_raw()), a);
    }

    #[test]
    fn test_property_key_display() {
        let key = PropertyKey::new(TargetId::from_raw(7), "opacity");
        assert_eq!(key.to_string(), "#7.opacity");
    }
}
