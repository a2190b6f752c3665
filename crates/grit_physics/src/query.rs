//! Ray, sweep and overlap queries against the simulated bodies
//!
//! Hits are mapped back to (body, material) the same way contacts are, so
//! a ray and a resting contact on the same face agree on the material.

use grit_col::MaterialId;
use grit_math::{Transform, Vector3};
use rapier3d::math::{Isometry, Point, Real, Vector};
use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::parry::query::{self, NonlinearRigidMotion, Ray, ShapeCastOptions};
use rapier3d::parry::shape::{Ball, FeatureId, Shape};
use rapier3d::prelude::{Collider, QueryFilter};

use crate::body::BodyKey;
use crate::callbacks::{SweepCallback, SweepHit, TestCallback, TestHit};
use crate::contact::MaterialLookup;
use crate::convert::{from_point, from_vector, to_isometry, to_point, to_rotation, to_vector};
use crate::error::PhysicsError;
use crate::world::PhysicsWorld;

/// Body and material at a point on a collider
///
/// `local` is the hit point in the collider's frame. For triangle meshes
/// the face comes from `feature` when the query reports one, otherwise
/// from the face nearest to `local`.
fn resolve_hit(
    lookup: &MaterialLookup<'_>,
    collider: &Collider,
    local: Vector3,
    feature: FeatureId,
) -> Option<(BodyKey, MaterialId)> {
    let (_, part, mesh) = lookup.mesh_of(collider)?;
    let is_trimesh = mesh.children().get(part).is_some_and(|c| c.kind.is_trimesh());
    let face = match feature {
        _ if !is_trimesh => None,
        FeatureId::Face(i) if mesh.face_count() > 0 => Some(i % mesh.face_count() as u32),
        _ => mesh.nearest_face(local),
    };
    let (key, material) = lookup.material(collider, face);
    Some((key?, material))
}

impl PhysicsWorld {
    /// Report every body crossed by the segment from `start` to `end`
    ///
    /// A negative `radius` casts a thin ray; otherwise a sphere of that
    /// radius is swept along the segment.
    pub fn ray(&self, start: Vector3, end: Vector3, radius: f32, callback: &mut dyn SweepCallback) {
        if radius < 0.0 {
            self.ray_cast(start, end, callback);
        } else {
            self.sphere_cast(start, end, radius, callback);
        }
    }

    fn ray_cast(&self, start: Vector3, end: Vector3, callback: &mut dyn SweepCallback) {
        let lookup = self.lookup();
        let dynamics = &self.dynamics;
        let ray = Ray::new(to_point(start), to_vector(end - start));
        dynamics.queries().intersections_with_ray(
            &dynamics.bodies,
            &dynamics.colliders,
            &ray,
            1.0,
            true,
            QueryFilter::default(),
            |handle, hit| {
                let Some(collider) = dynamics.colliders.get(handle) else {
                    return true;
                };
                let local = collider.position().inverse_transform_point(&ray.point_at(hit.time_of_impact));
                if let Some((body, material)) = resolve_hit(&lookup, collider, from_point(&local), hit.feature) {
                    callback.result(&SweepHit {
                        body,
                        distance: hit.time_of_impact,
                        normal: from_vector(&hit.normal),
                        material,
                    });
                }
                true
            },
        );
    }

    fn sphere_cast(&self, start: Vector3, end: Vector3, radius: f32, callback: &mut dyn SweepCallback) {
        let ball = Ball::new(radius);
        let from = Isometry::translation(start.x, start.y, start.z);
        self.linear_cast(&from, to_vector(end - start), &ball, callback);
    }

    fn linear_cast(&self, from: &Isometry<Real>, motion: Vector<Real>, shape: &dyn Shape, callback: &mut dyn SweepCallback) {
        let lookup = self.lookup();
        let options = ShapeCastOptions::with_max_time_of_impact(1.0);
        let to = Isometry::from_parts((from.translation.vector + motion).into(), from.rotation);
        let swept = shape.compute_swept_aabb(from, &to);
        self.each_candidate(&swept, |collider| {
            let hit = query::cast_shapes(
                from,
                &motion,
                shape,
                collider.position(),
                &Vector::zeros(),
                collider.shape(),
                options,
            );
            let Ok(Some(hit)) = hit else {
                return;
            };
            let normal = collider.position().rotation * hit.normal2;
            if let Some((body, material)) =
                resolve_hit(&lookup, collider, from_point(&hit.witness2), FeatureId::Unknown)
            {
                callback.result(&SweepHit {
                    body,
                    distance: hit.time_of_impact,
                    normal: from_vector(&normal),
                    material,
                });
            }
        });
    }

    /// Run `f` on every collider whose bounding box meets `aabb`
    fn each_candidate(&self, aabb: &Aabb, mut f: impl FnMut(&Collider)) {
        let colliders = &self.dynamics.colliders;
        self.dynamics.queries().colliders_with_aabb_intersecting_aabb(aabb, |handle| {
            if let Some(collider) = colliders.get(*handle) {
                f(collider);
            }
            true
        });
    }

    /// Sweep a mesh's shape from `start` to `end`, reporting every body it meets
    ///
    /// Only meshes made of a single convex part can be swept. The shape
    /// turns from the start to the end orientation about the mesh origin
    /// along the way.
    pub fn sweep(
        &self,
        mesh: &str,
        start: &Transform,
        end: &Transform,
        callback: &mut dyn SweepCallback,
    ) -> Result<(), PhysicsError> {
        let found = self.mesh(mesh).ok_or_else(|| PhysicsError::UnknownMesh(mesh.to_string()))?;
        let child = found.convex_child().ok_or_else(|| PhysicsError::NotSweepable(mesh.to_string()))?;

        let child_local = to_isometry(&child.local);
        let spin = to_rotation(end.orientation) * to_rotation(start.orientation).inverse();
        let motion = NonlinearRigidMotion::new(
            to_isometry(start) * child_local,
            child_local.inverse_transform_point(&Point::origin()),
            to_vector(end.position - start.position),
            spin.scaled_axis(),
        );

        // every point of the child stays within `reach` of the mesh origin,
        // which moves in a straight line
        let sphere = child.shape.compute_local_bounding_sphere();
        let reach = (child_local * sphere.center()).coords.norm() + sphere.radius();
        let (a, b) = (to_point(start.position), to_point(end.position));
        let swept = Aabb::new(a.inf(&b), a.sup(&b)).loosened(reach);

        let lookup = self.lookup();
        self.each_candidate(&swept, |collider| {
            let still = NonlinearRigidMotion::constant_position(*collider.position());
            let hit = query::cast_shapes_nonlinear(&motion, &*child.shape, &still, collider.shape(), 0.0, 1.0, true);
            let Ok(Some(hit)) = hit else {
                return;
            };
            let normal = collider.position().rotation * hit.normal2;
            if let Some((body, material)) =
                resolve_hit(&lookup, collider, from_point(&hit.witness2), FeatureId::Unknown)
            {
                callback.result(&SweepHit {
                    body,
                    distance: hit.time_of_impact,
                    normal: from_vector(&normal),
                    material,
                });
            }
        });
        Ok(())
    }

    /// Report every body overlapping a mesh placed at `pose`
    pub fn test(&self, mesh: &str, pose: &Transform, callback: &mut dyn TestCallback) -> Result<(), PhysicsError> {
        let found = self.mesh(mesh).ok_or_else(|| PhysicsError::UnknownMesh(mesh.to_string()))?;
        let pose = to_isometry(pose);
        for child in found.children() {
            self.overlap(&(pose * to_isometry(&child.local)), &*child.shape, callback);
        }
        Ok(())
    }

    /// Report every body overlapping a sphere
    pub fn test_sphere(&self, radius: f32, centre: Vector3, callback: &mut dyn TestCallback) {
        let pose = Isometry::translation(centre.x, centre.y, centre.z);
        self.overlap(&pose, &Ball::new(radius), callback);
    }

    fn overlap(&self, pose: &Isometry<Real>, shape: &dyn Shape, callback: &mut dyn TestCallback) {
        let lookup = self.lookup();
        let dynamics = &self.dynamics;
        dynamics.queries().intersections_with_shape(
            &dynamics.bodies,
            &dynamics.colliders,
            pose,
            shape,
            QueryFilter::default(),
            |handle| {
                let Some(collider) = dynamics.colliders.get(handle) else {
                    return true;
                };
                // pairs the query dispatcher has no algorithm for are skipped
                let Ok(Some(contact)) = query::contact(pose, shape, collider.position(), collider.shape(), 0.0) else {
                    return true;
                };
                let local = collider.position().inverse_transform_point(&contact.point2);
                if let Some((body, material)) =
                    resolve_hit(&lookup, collider, from_point(&local), FeatureId::Unknown)
                {
                    callback.result(&TestHit {
                        body,
                        position: from_point(&contact.point2),
                        normal: from_vector(&contact.normal2),
                        penetration: -contact.dist,
                        material,
                    });
                }
                true
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::SweepHits;
    use crate::source::MemorySource;
    use crate::world::PhysicsConfig;
    use grit_col::MaterialDb;
    use grit_math::{Degree, Quaternion};

    // Two triangles forming a 2x2 quad on z = 0, left half "dirt", right half "stone"
    const FLOOR: &str = r#"TCOL1.0
        attributes { static; }
        trimesh {
            vertexes { -1 -1 0; 0 -1 0; 0 1 0; -1 1 0; 1 -1 0; 1 1 0; }
            faces { 0 1 2 "dirt"; 0 2 3 "dirt"; 1 4 5 "stone"; 1 5 2 "stone"; }
        }"#;

    const CRATE: &str = r#"TCOL1.0 attributes { mass 5; } compound { box { material "stone"; dimensions 2 0.5 0.5; margin 0; } }"#;

    fn world() -> (PhysicsWorld, BodyKey) {
        let mut db = MaterialDb::new();
        db.add("dirt", 0).unwrap();
        db.add("stone", 0).unwrap();
        let src = MemorySource::new().with("floor.tcol", FLOOR).with("crate.tcol", CRATE);
        let mut w = PhysicsWorld::new(PhysicsConfig::default(), db, src);
        let floor = w.create_body("floor.tcol", Transform::IDENTITY).unwrap();
        (w, floor)
    }

    fn dirt(w: &PhysicsWorld) -> MaterialId {
        w.materials().get_material("dirt").unwrap().id
    }

    fn stone(w: &PhysicsWorld) -> MaterialId {
        w.materials().get_material("stone").unwrap().id
    }

    #[test]
    fn test_ray_reports_face_material() {
        let (w, floor) = world();
        let mut hits = SweepHits::default();
        w.ray(Vector3::new(-0.5, 0.2, 1.0), Vector3::new(-0.5, 0.2, -1.0), -1.0, &mut hits);
        assert_eq!(hits.hits.len(), 1);
        let hit = hits.hits[0];
        assert_eq!(hit.body, floor);
        assert_eq!(hit.material, dirt(&w));
        assert!((hit.distance - 0.5).abs() < 1e-4);
        assert!(hit.normal.z.abs() > 0.99);

        let mut hits = SweepHits::default();
        w.ray(Vector3::new(0.5, -0.2, 1.0), Vector3::new(0.5, -0.2, -1.0), -1.0, &mut hits);
        assert_eq!(hits.nearest().map(|h| h.material), Some(stone(&w)));
    }

    #[test]
    fn test_ray_misses() {
        let (w, _) = world();
        let mut hits = SweepHits::default();
        w.ray(Vector3::new(5.0, 5.0, 1.0), Vector3::new(5.0, 5.0, -1.0), -1.0, &mut hits);
        assert!(hits.hits.is_empty());
        // stops short of the floor
        w.ray(Vector3::new(0.5, 0.5, 1.0), Vector3::new(0.5, 0.5, 0.5), -1.0, &mut hits);
        assert!(hits.hits.is_empty());
    }

    #[test]
    fn test_sphere_ray() {
        let (w, floor) = world();
        let mut hits = SweepHits::default();
        w.ray(Vector3::new(0.5, 0.5, 2.0), Vector3::new(0.5, 0.5, 0.0), 0.5, &mut hits);
        let hit = hits.nearest().copied().unwrap();
        assert_eq!(hit.body, floor);
        // the sphere touches after travelling 1.5 of 2
        assert!((hit.distance - 0.75).abs() < 1e-3, "{}", hit.distance);
        assert_eq!(hit.material, stone(&w));
    }

    #[test]
    fn test_sweep_needs_convex_mesh() {
        let (w, _) = world();
        let mut hits = SweepHits::default();
        assert!(matches!(
            w.sweep("floor.tcol", &Transform::IDENTITY, &Transform::IDENTITY, &mut hits),
            Err(PhysicsError::NotSweepable(_))
        ));
        assert!(matches!(
            w.sweep("nothing.tcol", &Transform::IDENTITY, &Transform::IDENTITY, &mut hits),
            Err(PhysicsError::UnknownMesh(_))
        ));
    }

    #[test]
    fn test_sweep_box_down() {
        let (mut w, floor) = world();
        w.load_mesh("crate.tcol").unwrap();
        let mut hits = SweepHits::default();
        let start = Transform::from_position(Vector3::new(0.0, 0.0, 2.25));
        let end = Transform::new(
            Vector3::new(0.0, 0.0, 0.25 - 2.0),
            Quaternion::from_angle_axis(Degree(10.0), Vector3::UNIT_Z),
        );
        w.sweep("crate.tcol", &start, &end, &mut hits).unwrap();
        let hit = hits.nearest().copied().unwrap();
        assert_eq!(hit.body, floor);
        assert!((hit.distance - 0.5).abs() < 1e-2, "{}", hit.distance);
    }

    #[test]
    fn test_sphere_overlap() {
        let (w, floor) = world();
        let mut found = Vec::new();
        w.test_sphere(0.5, Vector3::new(-0.5, 0.0, 0.25), &mut |hit: &TestHit| found.push(*hit));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body, floor);
        assert_eq!(found[0].material, dirt(&w));
        assert!((found[0].penetration - 0.25).abs() < 1e-3);

        found.clear();
        w.test_sphere(0.5, Vector3::new(-0.5, 0.0, 2.0), &mut |hit: &TestHit| found.push(*hit));
        assert!(found.is_empty());
    }

    #[test]
    fn test_queries_follow_created_and_destroyed_bodies() {
        let (mut w, floor) = world();
        let far = Transform::from_position(Vector3::new(40.0, 0.0, 0.0));
        let crate_key = w.create_body("crate.tcol", far).unwrap();

        let mut hits = SweepHits::default();
        w.ray(Vector3::new(40.0, 0.0, 5.0), Vector3::new(40.0, 0.0, -5.0), -1.0, &mut hits);
        assert_eq!(hits.hits.len(), 1);
        assert_eq!(hits.hits[0].body, crate_key);
        assert!((hits.hits[0].distance - 0.475).abs() < 1e-3);

        // the sphere near the floor never meets the far crate
        let mut found = Vec::new();
        w.test_sphere(0.5, Vector3::new(0.5, 0.0, 0.25), &mut |hit: &TestHit| found.push(hit.body));
        assert_eq!(found, vec![floor]);

        w.destroy_body(crate_key).unwrap();
        let mut hits = SweepHits::default();
        w.ray(Vector3::new(40.0, 0.0, 5.0), Vector3::new(40.0, 0.0, -5.0), -1.0, &mut hits);
        assert!(hits.hits.is_empty());
    }

    #[test]
    fn test_mesh_overlap() {
        let (mut w, floor) = world();
        w.load_mesh("crate.tcol").unwrap();
        let mut bodies = Vec::new();
        w.test("crate.tcol", &Transform::from_position(Vector3::new(0.5, 0.0, 0.1)), &mut |hit: &TestHit| {
            bodies.push(hit.body)
        })
        .unwrap();
        assert!(bodies.contains(&floor));
    }
}
