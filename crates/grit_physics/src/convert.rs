//! Conversions between grit_math values and the dynamics library's nalgebra types

use grit_math::{Quaternion, Transform, Vector3};
use rapier3d::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use rapier3d::na;

#[inline]
pub fn to_vector(v: Vector3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

#[inline]
pub fn to_point(v: Vector3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

#[inline]
pub fn from_vector(v: &Vector<Real>) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

#[inline]
pub fn from_point(p: &Point<Real>) -> Vector3 {
    Vector3::new(p.x, p.y, p.z)
}

pub fn to_rotation(q: Quaternion) -> Rotation<Real> {
    Rotation::from_quaternion(na::Quaternion::new(q.w, q.x, q.y, q.z))
}

pub fn from_rotation(r: &Rotation<Real>) -> Quaternion {
    Quaternion::new(r.w, r.i, r.j, r.k)
}

pub fn to_isometry(t: &Transform) -> Isometry<Real> {
    Isometry::from_parts(Translation::from(to_vector(t.position)), to_rotation(t.orientation))
}

pub fn from_isometry(iso: &Isometry<Real>) -> Transform {
    Transform::new(from_vector(&iso.translation.vector), from_rotation(&iso.rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_math::Degree;

    #[test]
    fn test_isometry_round_trip() {
        let t = Transform::new(
            Vector3::new(1.0, -2.0, 3.5),
            Quaternion::from_angle_axis(Degree(40.0), Vector3::new(0.0, 1.0, 1.0)),
        );
        let back = from_isometry(&to_isometry(&t));
        assert!((back.position - t.position).length() < 1e-6);
        assert!(back.orientation.dot(&t.orientation).abs() > 1.0 - 1e-6);
    }

    #[test]
    fn test_same_point_mapping() {
        let t = Transform::new(
            Vector3::new(0.0, 0.0, 5.0),
            Quaternion::from_angle_axis(Degree(90.0), Vector3::UNIT_Z),
        );
        let p = Vector3::new(1.0, 2.0, 3.0);
        let ours = t.transform_point(p);
        let theirs = from_point(&(to_isometry(&t) * to_point(p)));
        assert!((ours - theirs).length() < 1e-5);
    }
}
