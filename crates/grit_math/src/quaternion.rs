//! Quaternion rotations
//!
//! Stored in (w, x, y, z) order, which is also the order used by the TCOL
//! `orientation` attribute and the BCOL layout.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::{Radian, Vector3};

/// A rotation quaternion
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    #[inline]
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` around `axis` (axis need not be normalized)
    pub fn from_angle_axis(angle: impl Into<Radian>, axis: Vector3) -> Self {
        let half = angle.into().value() * 0.5;
        let axis = axis.normalized();
        let s = half.sin();
        Self::new(half.cos(), axis.x * s, axis.y * s, axis.z * s)
    }

    /// Shortest-arc rotation taking direction `from` onto direction `to`
    pub fn rotation_to(from: Vector3, to: Vector3) -> Self {
        let a = from.normalized();
        let b = to.normalized();
        let d = a.dot(b);
        if d >= 1.0 - 1e-6 {
            return Self::IDENTITY;
        }
        if d <= -1.0 + 1e-6 {
            // Opposite directions: any perpendicular axis works
            let mut axis = Vector3::UNIT_X.cross(a);
            if axis.length_squared() < 1e-6 {
                axis = Vector3::UNIT_Y.cross(a);
            }
            return Self::from_angle_axis(Radian(std::f32::consts::PI), axis);
        }
        let c = a.cross(b);
        let s = ((1.0 + d) * 2.0).sqrt();
        let inv = 1.0 / s;
        Self::new(s * 0.5, c.x * inv, c.y * inv, c.z * inv).normalized()
    }

    #[inline]
    pub fn dot(&self, other: &Self) -> f32 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Normalize to unit length (identity if degenerate)
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n > 0.0 {
            let inv = 1.0 / n;
            Self::new(self.w * inv, self.x * inv, self.y * inv, self.z * inv)
        } else {
            Self::IDENTITY
        }
    }

    /// Conjugate (the inverse for unit quaternions)
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this (unit) quaternion
    pub fn rotate(&self, v: Vector3) -> Vector3 {
        // v' = v + 2w(q x v) + 2(q x (q x v))
        let q = Vector3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    /// True if every component is finite
    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Self;
    /// Hamilton product: `a * b` applies `b` first, then `a`
    fn mul(self, b: Self) -> Self {
        let a = self;
        Self::new(
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        )
    }
}

impl std::ops::Mul<Vector3> for Quaternion {
    type Output = Vector3;
    fn mul(self, v: Vector3) -> Vector3 {
        self.rotate(v)
    }
}
