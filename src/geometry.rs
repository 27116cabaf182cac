//! Planar vector math and axis-aligned bounding boxes.

use serde::Serialize;
use std::ops::{Add, Mul, Sub};

/// A 2D point or vector in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn distance(&self, other: Vec2) -> f64 {
        (*self - other).length()
    }

    #[inline]
    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product, positive when `other` lies
    /// counter-clockwise of `self`.
    #[inline]
    pub fn determinant(&self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Unit vector in the same direction. A zero vector stays zero.
    pub fn normalized(&self) -> Vec2 {
        let length = self.length();
        if length == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(self.x / length, self.y / length)
    }

    /// Rotate this point about `pivot` by `angle` radians (counter-clockwise
    /// for positive angles).
    pub fn rotated(&self, pivot: Vec2, angle: f64) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        let unbound = *self - pivot;
        Vec2::new(
            unbound.x * cos - unbound.y * sin + pivot.x,
            unbound.x * sin + unbound.y * cos + pivot.y,
        )
    }

    #[inline]
    pub fn min(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.min(other.x), self.y.min(other.y))
    }

    #[inline]
    pub fn max(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.max(other.x), self.y.max(other.y))
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Unsigned angle between `a` and `b` in radians, within `[0, π]`.
///
/// Vector order does not matter.
pub fn angle_inner(a: Vec2, b: Vec2) -> f64 {
    let dot = a.normalized().dot(b.normalized());
    dot.clamp(-1.0, 1.0).acos()
}

/// Angle from `a` to `b` in radians, negative when `b` lies clockwise of `a`.
pub fn angle_signed(a: Vec2, b: Vec2) -> f64 {
    let inner = angle_inner(a, b);
    if a.determinant(b) < 0.0 { -inner } else { inner }
}

/// A 3D point in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Each coordinate rounded to 3 decimal places.
    pub fn rounded(&self) -> Point3 {
        Point3::new(round3(self.x), round3(self.y), round3(self.z))
    }
}

impl Add for Point3 {
    type Output = Point3;

    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Round to 3 decimal places (micrometre resolution).
#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// 2D axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoundingBox2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl BoundingBox2 {
    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec2>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            BoundingBox2 {
                min: first,
                max: first,
            },
            |bbox, p| BoundingBox2 {
                min: bbox.min.min(p),
                max: bbox.max.max(p),
            },
        ))
    }

    pub fn merged(&self, other: &BoundingBox2) -> BoundingBox2 {
        BoundingBox2 {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

/// 3D axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoundingBox3 {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox3 {
    /// The degenerate box at the origin, used for models without layers.
    pub const fn zero() -> Self {
        Self {
            min: Point3::ORIGIN,
            max: Point3::ORIGIN,
        }
    }

    /// Extrude a planar box between two heights.
    pub fn from_planar(bbox: &BoundingBox2, z_min: f64, z_max: f64) -> Self {
        Self {
            min: Point3::new(bbox.min.x, bbox.min.y, z_min),
            max: Point3::new(bbox.max.x, bbox.max.y, z_max),
        }
    }

    pub fn merged(&self, other: &BoundingBox3) -> BoundingBox3 {
        BoundingBox3 {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn size(&self) -> Point3 {
        self.max - self.min
    }

    pub fn center(&self) -> Point3 {
        Point3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }
}
