//! Animatable property values
//!
//! [`Value`] is the dynamic representation every property handle reads and
//! writes. Numeric, point and color variants interpolate linearly; the rest
//! switch from the start value to the end value at the halfway mark.

use serde::{Deserialize, Serialize};

/// Trait for values that can be interpolated
pub trait Interpolate: Clone {
    /// Linearly interpolate between self and other by factor t (0.0 to 1.0)
    fn lerp(&self, other: &Self, t: f64) -> Self;

    /// Check if two values are approximately equal (for settling detection)
    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool;
}

impl Interpolate for f64 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self - other).abs() < epsilon
    }
}

// ============================================================================
// Point / Color
// ============================================================================

/// A 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Interpolate for Point {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Point::new(self.x.lerp(&other.x, t), self.y.lerp(&other.y, t))
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.x.approx_eq(&other.x, epsilon) && self.y.approx_eq(&other.y, epsilon)
    }
}

/// An RGBA color with components in 0.0..=1.0
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }
}

impl Interpolate for Color {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        let t = t as f32;
        Color::rgba(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        let epsilon = epsilon as f32;
        (self.r - other.r).abs() < epsilon
            && (self.g - other.g).abs() < epsilon
            && (self.b - other.b).abs() < epsilon
            && (self.a - other.a).abs() < epsilon
    }
}

// ============================================================================
// Value
// ============================================================================

/// A dynamically typed property value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Int(i64),
    Bool(bool),
    Point(Point),
    Color(Color),
    Text(String),
}

impl Value {
    /// Human readable name of the variant, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Point(_) => "point",
            Value::Color(_) => "color",
            Value::Text(_) => "text",
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Whether the two values can be blended smoothly
    pub fn is_interpolatable_with(&self, other: &Value) -> bool {
        matches!(
            (self, other),
            (Value::Number(_) | Value::Int(_), Value::Number(_) | Value::Int(_))
                | (Value::Point(_), Value::Point(_))
                | (Value::Color(_), Value::Color(_))
        )
    }

    /// Interpolate from `self` towards `to` at `progress`.
    ///
    /// Progress outside 0..=1 extrapolates for continuous variants, which lets
    /// overshooting easing curves work. Mismatched or discrete variants step.
    pub fn interpolate(&self, to: &Value, progress: f64) -> Value {
        match (self, to) {
            (Value::Int(a), Value::Int(b)) => {
                Value::Int((*a as f64).lerp(&(*b as f64), progress).round() as i64)
            }
            (Value::Number(_) | Value::Int(_), Value::Number(_) | Value::Int(_)) => {
                let a = self.as_f64().unwrap_or_default();
                let b = to.as_f64().unwrap_or_default();
                Value::Number(a.lerp(&b, progress))
            }
            (Value::Point(a), Value::Point(b)) => Value::Point(a.lerp(b, progress)),
            (Value::Color(a), Value::Color(b)) => Value::Color(a.lerp(b, progress)),
            _ => {
                if progress < 0.5 {
                    self.clone()
                } else {
                    to.clone()
                }
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Point> for Value {
    fn from(v: Point) -> Self {
        Value::Point(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}
