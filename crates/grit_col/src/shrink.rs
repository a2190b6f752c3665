//! Convex hull shrinking
//!
//! Rounded hulls grow by their margin, so authored hull vertexes are pulled
//! inwards by the same amount before the shape is built. This works on the
//! plane representation: find the hull's face planes, move each inwards,
//! then intersect the moved planes to get the new corners.
//!
//! Everything is brute force (cubic in the vertex count). Hulls are small
//! authoring-time assets.

use grit_math::Vector3;

/// Distance within which a vertex counts as lying on a plane
const PLANE_TOLERANCE: f32 = 1e-4;
/// Two unit normals closer than this (by dot product) are the same face
const PARALLEL_TOLERANCE: f32 = 1e-5;

#[derive(Clone, Copy, Debug)]
struct Plane {
    /// Outward unit normal
    normal: Vector3,
    /// `normal · p + d == 0` on the plane, negative inside
    d: f32,
}

impl Plane {
    fn signed_distance(&self, p: Vector3) -> f32 {
        self.normal.dot(p) + self.d
    }
}

/// Face planes of the convex hull of `points` (points must surround the origin)
fn hull_planes(points: &[Vector3]) -> Vec<Plane> {
    let mut planes: Vec<Plane> = Vec::new();
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                let normal = (points[j] - points[i]).cross(points[k] - points[i]);
                if normal.length_squared() < 1e-12 {
                    continue;
                }
                let mut normal = normal.normalized();
                let mut d = -normal.dot(points[i]);

                let mut above = false;
                let mut below = false;
                for &p in points {
                    let s = normal.dot(p) + d;
                    above |= s > PLANE_TOLERANCE;
                    below |= s < -PLANE_TOLERANCE;
                }
                if above && below {
                    continue;
                }
                if above {
                    normal = -normal;
                    d = -d;
                }
                if planes.iter().any(|p| p.normal.dot(normal) > 1.0 - PARALLEL_TOLERANCE) {
                    continue;
                }
                planes.push(Plane { normal, d });
            }
        }
    }
    planes
}

/// Point shared by three planes, if they meet in exactly one point
fn intersect(a: &Plane, b: &Plane, c: &Plane) -> Option<Vector3> {
    let bc = b.normal.cross(c.normal);
    let det = a.normal.dot(bc);
    if det.abs() < 1e-6 {
        return None;
    }
    let ca = c.normal.cross(a.normal);
    let ab = a.normal.cross(b.normal);
    Some((bc * -a.d + ca * -b.d + ab * -c.d) * (1.0 / det))
}

/// Pull every face of the convex hull of `vertexes` inwards by `distance`
///
/// Returns the corners of the shrunk hull. If the hull is degenerate, or
/// `distance` is large enough to push a face through the centre, a warning
/// is logged and the input is returned unchanged.
pub fn shrink_vertexes(vertexes: &[Vector3], distance: f32) -> Vec<Vector3> {
    if vertexes.len() < 4 {
        log::warn!("shrink_vertexes: hull has only {} vertexes, not shrinking", vertexes.len());
        return vertexes.to_vec();
    }

    let mut centre = Vector3::ZERO;
    for &v in vertexes {
        centre = centre + v;
    }
    centre = centre * (1.0 / vertexes.len() as f32);
    let local: Vec<Vector3> = vertexes.iter().map(|&v| v - centre).collect();

    let mut planes = hull_planes(&local);
    if planes.len() < 4 {
        log::warn!("shrink_vertexes: hull is flat ({} planes), not shrinking", planes.len());
        return vertexes.to_vec();
    }

    for plane in planes.iter_mut() {
        plane.d += distance;
        if plane.d >= 0.0 {
            log::warn!(
                "shrink_vertexes: shrinking by {} would invert the hull, leaving it unchanged",
                distance
            );
            return vertexes.to_vec();
        }
    }

    let mut out: Vec<Vector3> = Vec::new();
    for i in 0..planes.len() {
        for j in i + 1..planes.len() {
            for k in j + 1..planes.len() {
                let Some(p) = intersect(&planes[i], &planes[j], &planes[k]) else {
                    continue;
                };
                if planes.iter().any(|pl| pl.signed_distance(p) > PLANE_TOLERANCE) {
                    continue;
                }
                if out.iter().any(|&q| q.distance(p) < PLANE_TOLERANCE) {
                    continue;
                }
                out.push(p);
            }
        }
    }

    out.into_iter().map(|p| p + centre).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(offset: Vector3) -> Vec<Vector3> {
        let mut v = Vec::new();
        for &x in &[-1.0, 1.0] {
            for &y in &[-1.0, 1.0] {
                for &z in &[-1.0, 1.0] {
                    v.push(Vector3::new(x, y, z) + offset);
                }
            }
        }
        v
    }

    #[test]
    fn test_cube_shrinks_evenly() {
        let out = shrink_vertexes(&cube(Vector3::ZERO), 0.1);
        assert_eq!(out.len(), 8);
        for p in out {
            assert!((p.x.abs() - 0.9).abs() < 1e-4, "{:?}", p);
            assert!((p.y.abs() - 0.9).abs() < 1e-4, "{:?}", p);
            assert!((p.z.abs() - 0.9).abs() < 1e-4, "{:?}", p);
        }
    }

    #[test]
    fn test_off_centre_cube_keeps_position() {
        let offset = Vector3::new(10.0, -4.0, 2.0);
        let out = shrink_vertexes(&cube(offset), 0.25);
        assert_eq!(out.len(), 8);
        for p in out {
            let l = p - offset;
            assert!((l.x.abs() - 0.75).abs() < 1e-4, "{:?}", p);
        }
    }

    #[test]
    fn test_too_much_shrink_is_a_noop() {
        let input = cube(Vector3::ZERO);
        assert_eq!(shrink_vertexes(&input, 2.0), input);
    }

    #[test]
    fn test_tetrahedron_stays_inside() {
        let input = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 2.0),
        ];
        let out = shrink_vertexes(&input, 0.05);
        assert_eq!(out.len(), 4);
        let planes = {
            let mut c = Vector3::ZERO;
            for &v in &input {
                c = c + v;
            }
            c = c * 0.25;
            let local: Vec<_> = input.iter().map(|&v| v - c).collect();
            (hull_planes(&local), c)
        };
        // every new corner sits at least the shrink distance inside every original face
        for p in out {
            for pl in &planes.0 {
                assert!(pl.signed_distance(p - planes.1) <= -0.05 + 1e-4);
            }
        }
    }

    #[test]
    fn test_flat_input_unchanged() {
        let input = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ];
        assert_eq!(shrink_vertexes(&input, 0.01), input);
    }
}
