//! In-memory object model
//!
//! A small stand-in for a declarative runtime's objects: named property slots
//! that may be read-only, carry a write interceptor, or be driven by a
//! binding. [`ObjectProperty`] implements [`PropertyHandle`] over a weak
//! reference so animations notice when the object goes away.
//!
//! ```ignore
//! use cadence_core::{Object, Value};
//!
//! let rect = Object::new("rect");
//! rect.define("opacity", Value::Number(1.0));
//! let handle = rect.property("opacity")?;
//! ```

use crate::error::{PropertyError, Result};
use crate::property::{PropertyHandle, PropertyKey, TargetId, WriteFlags};
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Write interceptor: receives the incoming value and returns the value to store
pub type Interceptor = Box<dyn Fn(&Value) -> Value>;

struct Slot {
    value: Value,
    read_only: bool,
    bound: bool,
    interceptor: Option<Interceptor>,
    writes: u64,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            read_only: false,
            bound: false,
            interceptor: None,
            writes: 0,
        }
    }
}

struct ObjectInner {
    id: TargetId,
    name: String,
    slots: FxHashMap<String, Slot>,
}

/// A shared, single-threaded animatable object
#[derive(Clone)]
pub struct Object {
    inner: Rc<RefCell<ObjectInner>>,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Object")
            .field("id", &inner.id)
            .field("name", &inner.name)
            .field("properties", &inner.slots.len())
            .finish()
    }
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectInner {
                id: TargetId::next(),
                name: name.into(),
                slots: FxHashMap::default(),
            })),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.borrow().id
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Define (or redefine) a writable property
    pub fn define(&self, name: &str, value: Value) {
        self.inner
            .borrow_mut()
            .slots
            .insert(name.to_string(), Slot::new(value));
    }

    /// Define a property that rejects writes
    pub fn define_read_only(&self, name: &str, value: Value) {
        let mut slot = Slot::new(value);
        slot.read_only = true;
        self.inner.borrow_mut().slots.insert(name.to_string(), slot);
    }

    /// Install a write interceptor on an existing property
    pub fn set_interceptor(&self, name: &str, interceptor: Interceptor) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let slot = inner
            .slots
            .get_mut(name)
            .ok_or_else(|| PropertyError::Missing(name.to_string()))?;
        slot.interceptor = Some(interceptor);
        Ok(())
    }

    /// Mark a property as driven by a binding
    pub fn bind(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let slot = inner
            .slots
            .get_mut(name)
            .ok_or_else(|| PropertyError::Missing(name.to_string()))?;
        slot.bound = true;
        Ok(())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.inner
            .borrow()
            .slots
            .get(name)
            .map(|s| s.bound)
            .unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.borrow().slots.get(name).map(|s| s.value.clone())
    }

    /// Number of successful writes to a property
    pub fn write_count(&self, name: &str) -> u64 {
        self.inner
            .borrow()
            .slots
            .get(name)
            .map(|s| s.writes)
            .unwrap_or(0)
    }

    /// Plain user assignment: interceptors run and bindings break
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        write_slot(&self.inner, name, value, WriteFlags::USER)
    }

    /// Obtain a handle to one of this object's properties
    pub fn property(&self, name: &str) -> Result<ObjectProperty> {
        let inner = self.inner.borrow();
        if !inner.slots.contains_key(name) {
            return Err(PropertyError::Missing(format!("{}.{}", inner.name, name)));
        }
        Ok(ObjectProperty {
            target: Rc::downgrade(&self.inner),
            key: PropertyKey::new(inner.id, name),
        })
    }
}

fn write_slot(
    inner: &RefCell<ObjectInner>,
    name: &str,
    value: Value,
    flags: WriteFlags,
) -> Result<()> {
    let mut inner = inner.borrow_mut();
    let slot = inner
        .slots
        .get_mut(name)
        .ok_or_else(|| PropertyError::Missing(name.to_string()))?;
    if slot.read_only {
        return Err(PropertyError::ReadOnly(name.to_string()));
    }

    let value = match (&slot.interceptor, flags.bypass_interceptor) {
        (Some(interceptor), false) => interceptor(&value),
        _ => value,
    };
    if !flags.preserve_binding && slot.bound {
        tracing::trace!(property = name, "write breaks binding");
        slot.bound = false;
    }
    slot.value = value;
    slot.writes += 1;
    Ok(())
}

/// [`PropertyHandle`] for a property of an [`Object`]
#[derive(Clone)]
pub struct ObjectProperty {
    target: Weak<RefCell<ObjectInner>>,
    key: PropertyKey,
}

impl fmt::Debug for ObjectProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProperty")
            .field("key", &self.key)
            .field("alive", &(self.target.strong_count() > 0))
            .finish()
    }
}

impl ObjectProperty {
    fn upgrade(&self) -> Result<Rc<RefCell<ObjectInner>>> {
        self.target
            .upgrade()
            .ok_or_else(|| PropertyError::TargetDestroyed(self.key.to_string()))
    }
}

impl PropertyHandle for ObjectProperty {
    fn key(&self) -> PropertyKey {
        self.key.clone()
    }

    fn is_valid(&self) -> bool {
        match self.target.upgrade() {
            Some(inner) => {
                let valid = inner.borrow().slots.contains_key(&self.key.name);
                valid
            }
            None => false,
        }
    }

    fn is_writable(&self) -> bool {
        match self.target.upgrade() {
            Some(inner) => {
                let writable = inner
                    .borrow()
                    .slots
                    .get(&self.key.name)
                    .map(|s| !s.read_only)
                    .unwrap_or(false);
                writable
            }
            None => false,
        }
    }

    fn read(&self) -> Result<Value> {
        let inner = self.upgrade()?;
        let inner = inner.borrow();
        inner
            .slots
            .get(&self.key.name)
            .map(|s| s.value.clone())
            .ok_or_else(|| PropertyError::Missing(self.key.to_string()))
    }

    fn write(&self, value: Value, flags: WriteFlags) -> Result<()> {
        let inner = self.upgrade()?;
        write_slot(&inner, &self.key.name, value, flags)
    }
}
