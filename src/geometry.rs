//! 2-D canvas space primitives.

use std::ops::{Add, AddAssign, Mul, Sub};

// -------------------------------------------------------------------------------------------------

/// A position or direction in canvas space.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing into the given direction (radians, 0 = right, clockwise in screen
    /// space as y grows downwards).
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

// -------------------------------------------------------------------------------------------------

/// An axis aligned rectangle in canvas space. Used as the simulation's canvas bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Rect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 800.0, 600.0)
    }
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Copy of the rect with non finite or negative extents fixed up, so it can be safely used
    /// in the physics step.
    pub fn sanitized(&self) -> Self {
        let finite_or = |value: f32, default: f32| {
            if value.is_finite() {
                value
            } else {
                default
            }
        };
        Self {
            x: finite_or(self.x, 0.0),
            y: finite_or(self.y, 0.0),
            width: finite_or(self.width, 0.0).max(0.0),
            height: finite_or(self.height, 0.0).max(0.0),
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vector {
        Vector::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Vector) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Clamp the given point into the rect. Non finite coordinates snap to the center.
    pub fn clamp(&self, point: Vector) -> Vector {
        let center = self.center();
        let x = if point.x.is_finite() { point.x } else { center.x };
        let y = if point.y.is_finite() { point.y } else { center.y };
        Vector::new(
            x.clamp(self.left(), self.right()),
            y.clamp(self.top(), self.bottom()),
        )
    }

    /// Point position relative to the rect in range 0..=1 on both axes.
    pub fn normalize(&self, point: Vector) -> Vector {
        let normalize_axis = |value: f32, start: f32, extent: f32| {
            if extent > 0.0 {
                ((value - start) / extent).clamp(0.0, 1.0)
            } else {
                0.5
            }
        };
        Vector::new(
            normalize_axis(point.x, self.x, self.width),
            normalize_axis(point.y, self.y, self.height),
        )
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_math() {
        let a = Vector::new(3.0, 4.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!(a + Vector::new(1.0, 1.0), Vector::new(4.0, 5.0));
        assert_eq!(a - a, Vector::ZERO);
        assert_eq!(a * 2.0, Vector::new(6.0, 8.0));
        assert!(!Vector::new(f32::NAN, 0.0).is_finite());
        let right = Vector::from_angle(0.0);
        assert_eq!(right, Vector::new(1.0, 0.0));
    }

    #[test]
    fn rect_helpers() {
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(rect.right(), 110.0);
        assert_eq!(rect.bottom(), 70.0);
        assert_eq!(rect.center(), Vector::new(60.0, 45.0));
        assert!(rect.contains(Vector::new(10.0, 70.0)));
        assert!(!rect.contains(Vector::new(9.0, 30.0)));
        assert_eq!(rect.clamp(Vector::new(500.0, -5.0)), Vector::new(110.0, 20.0));
        assert_eq!(
            rect.clamp(Vector::new(f32::NAN, f32::INFINITY)),
            Vector::new(60.0, 45.0)
        );
        assert_eq!(rect.normalize(Vector::new(60.0, 20.0)), Vector::new(0.5, 0.0));
        assert_eq!(
            Rect::new(0.0, 0.0, 0.0, 0.0).normalize(Vector::new(1.0, 1.0)),
            Vector::new(0.5, 0.5)
        );
        let sanitized = Rect::new(f32::NAN, 0.0, -5.0, f32::INFINITY).sanitized();
        assert_eq!(sanitized, Rect::new(0.0, 0.0, 0.0, 0.0));
    }
}
