use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

use crate::error::FieldError;

/// Tangent slopes smaller than this are treated as flat.
const FLAT_SLOPE: f64 = 1e-12;

/// Physical coordinate in millimetres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Point2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl Add for Point2D {
    type Output = Point2D;
    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;
    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;
    fn mul(self, rhs: f64) -> Point2D {
        Point2D::new(self.x * rhs, self.y * rhs)
    }
}

/// A reflector curve `y = a (x - h)^2 + k` with vertex `(h, k)`.
///
/// The coefficient is `1 / (4 f)` for a concave-up bowl and `-1 / (4 f)` for a
/// concave-down umbrella, so the focus sits `f` from the vertex on the concave side.
/// Values are immutable once built and cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Parabola {
    diameter: f64,
    focal_length: f64,
    vertex: Point2D,
    concave_up: bool,
    coefficient: f64,
}

impl Parabola {
    pub fn new(
        diameter: f64,
        focal_length: f64,
        vertex: Point2D,
        concave_up: bool,
    ) -> Result<Self, FieldError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(diameter) || !valid(focal_length) {
            return Err(FieldError::InvalidParabola {
                diameter,
                focal_length,
            });
        }

        let a = 1.0 / (4.0 * focal_length);
        Ok(Self {
            diameter,
            focal_length,
            vertex,
            concave_up,
            coefficient: if concave_up { a } else { -a },
        })
    }

    /// Concave-down reflector whose focus lands on `focus`.
    pub fn umbrella(diameter: f64, focal_length: f64, focus: Point2D) -> Result<Self, FieldError> {
        Self::new(
            diameter,
            focal_length,
            Point2D::new(focus.x, focus.y + focal_length),
            false,
        )
    }

    /// Concave-up reflector whose focus lands on `focus`.
    pub fn bowl(diameter: f64, focal_length: f64, focus: Point2D) -> Result<Self, FieldError> {
        Self::new(
            diameter,
            focal_length,
            Point2D::new(focus.x, focus.y - focal_length),
            true,
        )
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    pub fn vertex(&self) -> Point2D {
        self.vertex
    }

    pub fn is_concave_up(&self) -> bool {
        self.concave_up
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    pub fn focus(&self) -> Point2D {
        if self.concave_up {
            Point2D::new(self.vertex.x, self.vertex.y + self.focal_length)
        } else {
            Point2D::new(self.vertex.x, self.vertex.y - self.focal_length)
        }
    }

    pub fn y_at(&self, x: f64) -> f64 {
        let dx = x - self.vertex.x;
        self.coefficient * dx * dx + self.vertex.y
    }

    /// Whether `x` falls inside the reflector's aperture.
    pub fn spans(&self, x: f64) -> bool {
        (x - self.vertex.x).abs() <= self.diameter / 2.0
    }

    /// True when `point` is within the aperture and on the concave side of the curve.
    pub fn contains_point(&self, point: Point2D) -> bool {
        if !self.spans(point.x) {
            return false;
        }
        let curve = self.y_at(point.x);
        if self.concave_up {
            point.y >= curve
        } else {
            point.y <= curve
        }
    }

    /// True when `point` lies in the solid band of the given thickness behind the
    /// curve (the convex side), measured vertically from the curve.
    pub fn band_contains(&self, point: Point2D, thickness: f64) -> bool {
        if !self.spans(point.x) {
            return false;
        }
        let curve = self.y_at(point.x);
        if self.concave_up {
            point.y < curve && point.y >= curve - thickness
        } else {
            point.y > curve && point.y <= curve + thickness
        }
    }

    /// Tangent slope `dy/dx` at `x`.
    pub fn slope_at(&self, x: f64) -> f64 {
        2.0 * self.coefficient * (x - self.vertex.x)
    }

    /// Unit normal at `x`, always oriented towards `+y`.
    pub fn normal_at(&self, x: f64) -> Point2D {
        let slope = self.slope_at(x);
        if slope.abs() < FLAT_SLOPE {
            return Point2D::new(0.0, 1.0);
        }
        let length = (1.0 + slope * slope).sqrt();
        Point2D::new(-slope / length, 1.0 / length)
    }

    /// Specular reflection `R = I - 2 (I . N) N` of `incoming` at `point.x`.
    pub fn reflection_direction(&self, point: Point2D, incoming: Point2D) -> Point2D {
        let normal = self.normal_at(point.x);
        incoming - normal * (2.0 * incoming.dot(normal))
    }
}
