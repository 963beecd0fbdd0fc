//! Cadence Core
//!
//! Shared building blocks for the Cadence animation runtime:
//!
//! - [`Value`]: dynamically typed, interpolatable property values
//! - [`PropertyHandle`]: the read/write capability animations drive
//! - [`Object`]: an in-memory object model implementing that capability

pub mod error;
pub mod object;
pub mod property;
pub mod value;

pub use error::{PropertyError, Result};
pub use object::{Interceptor, Object, ObjectProperty};
pub use property::{PropertyHandle, PropertyKey, TargetId, WriteFlags};
pub use value::{Color, Interpolate, Point, Value};
