//! Rigid transforms

use serde::{Deserialize, Serialize};

use crate::{Quaternion, Vector3};

/// Position and orientation, applied as rotate-then-translate
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vector3::ZERO,
        orientation: Quaternion::IDENTITY,
    };

    pub fn new(position: Vector3, orientation: Quaternion) -> Self {
        Self { position, orientation }
    }

    pub fn from_position(position: Vector3) -> Self {
        Self::new(position, Quaternion::IDENTITY)
    }

    /// Transform a point from local into parent space
    #[inline]
    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        self.position + self.orientation.rotate(p)
    }

    /// Rotate a direction from local into parent space
    #[inline]
    pub fn transform_direction(&self, d: Vector3) -> Vector3 {
        self.orientation.rotate(d)
    }

    /// `self * other`: apply `other` first, then `self`
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            position: self.transform_point(other.position),
            orientation: (self.orientation * other.orientation).normalized(),
        }
    }

    /// Inverse transform (orientation assumed unit length)
    pub fn inverse(&self) -> Self {
        let inv_rot = self.orientation.conjugate();
        Self {
            position: inv_rot.rotate(-self.position),
            orientation: inv_rot,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite()
    }
}

impl std::ops::Mul for Transform {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        self.compose(&other)
    }
}

impl std::ops::Mul<Vector3> for Transform {
    type Output = Vector3;
    fn mul(self, p: Vector3) -> Vector3 {
        self.transform_point(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Degree;

    fn close(a: Vector3, b: Vector3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_transform_point() {
        let t = Transform::new(
            Vector3::new(10.0, 0.0, 0.0),
            Quaternion::from_angle_axis(Degree(90.0), Vector3::UNIT_Z),
        );
        assert!(close(t * Vector3::UNIT_X, Vector3::new(10.0, 1.0, 0.0)));
    }

    #[test]
    fn test_compose_then_inverse_is_identity() {
        let a = Transform::new(
            Vector3::new(1.0, 2.0, 3.0),
            Quaternion::from_angle_axis(Degree(30.0), Vector3::new(1.0, 1.0, 0.0)),
        );
        let p = Vector3::new(-4.0, 0.5, 2.0);
        let round_trip = a.inverse() * (a * p);
        assert!(close(round_trip, p));
    }

    #[test]
    fn test_compose_order() {
        let offset = Transform::from_position(Vector3::new(0.0, 0.0, 1.0));
        let turn = Transform::new(Vector3::ZERO, Quaternion::from_angle_axis(Degree(90.0), Vector3::UNIT_Y));
        // turn first, then offset
        let p = (offset * turn) * Vector3::UNIT_X;
        assert!(close(p, Vector3::new(0.0, 0.0, 0.0)), "got {:?}", p);
    }
}
