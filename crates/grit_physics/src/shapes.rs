//! Building collision shapes from a collision document
//!
//! Every compound primitive becomes one child, in file order, followed by
//! one child for the triangle mesh if there is one. Each child becomes one
//! collider on every body that uses the mesh.

use grit_col::{shrink_vertexes, MaterialId, TColFile, TColShape};
use grit_math::{Degree, Quaternion, Transform, Vector3};
use rapier3d::math::{Point, Real, Vector};
use rapier3d::na::Unit;
use rapier3d::parry::shape::{SharedShape, TriMesh, TriMeshFlags};

use crate::convert::{from_point, to_isometry, to_point};
use crate::error::MeshError;

/// What kind of primitive a child was built from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildKind {
    Hull,
    Box,
    Cylinder,
    Cone,
    Plane,
    Sphere,
    /// Triangle mesh on a static body (internal edge data built in)
    StaticTriMesh,
    /// Triangle mesh on a dynamic body
    DynamicTriMesh,
}

impl ChildKind {
    pub fn is_trimesh(self) -> bool {
        matches!(self, ChildKind::StaticTriMesh | ChildKind::DynamicTriMesh)
    }

    /// Convex primitives can be swept
    pub fn is_convex(self) -> bool {
        !matches!(self, ChildKind::Plane | ChildKind::StaticTriMesh | ChildKind::DynamicTriMesh)
    }
}

/// One child of a mesh's master shape
#[derive(Clone)]
pub struct MasterChild {
    pub kind: ChildKind,
    pub shape: SharedShape,
    /// Placement of the child in the body frame, as authored
    pub local: Transform,
    /// Material of the whole child (trimesh faces carry their own)
    pub material: MaterialId,
}

impl std::fmt::Debug for MasterChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterChild")
            .field("kind", &self.kind)
            .field("local", &self.local)
            .field("material", &self.material)
            .finish()
    }
}

/// Rapier cylinders and cones run along Y; TCOL ones run along Z
fn z_axis_alignment() -> Quaternion {
    Quaternion::from_angle_axis(Degree(90.0), Vector3::UNIT_X)
}

fn degenerate(name: &str, part: usize, reason: impl Into<String>) -> MeshError {
    MeshError::Degenerate { name: name.to_string(), part, reason: reason.into() }
}

/// Shrink an extent by the margin that the rounded shape adds back
fn inner(extent: f32, margin: f32) -> (f32, f32) {
    if extent > margin {
        (extent - margin, margin)
    } else {
        // margin larger than the shape: keep the outer size, drop the rounding
        (extent, 0.0)
    }
}

fn build_primitive(name: &str, part: usize, shape: &TColShape) -> Result<MasterChild, MeshError> {
    let material = shape.material();
    let child = match shape {
        TColShape::Hull(h) => {
            let shrunk = shrink_vertexes(&h.vertexes, h.margin);
            let points: Vec<Point<Real>> = shrunk.iter().map(|&v| to_point(v)).collect();
            let shape = SharedShape::round_convex_hull(&points, h.margin)
                .ok_or_else(|| degenerate(name, part, "hull has no volume"))?;
            MasterChild { kind: ChildKind::Hull, shape, local: Transform::IDENTITY, material }
        }
        TColShape::Box(b) => {
            let half = b.dimensions * 0.5;
            let m = b.margin.min(half.x).min(half.y).min(half.z).max(0.0);
            let shape = SharedShape::round_cuboid(half.x - m, half.y - m, half.z - m, m);
            MasterChild {
                kind: ChildKind::Box,
                shape,
                local: Transform::new(b.centre, b.orientation),
                material,
            }
        }
        TColShape::Cylinder(c) => {
            let (radius, m) = inner(c.dimensions.x * 0.5, c.margin);
            let (half_height, m) = inner(c.dimensions.z * 0.5, m);
            let shape = SharedShape::round_cylinder(half_height, radius, m);
            MasterChild {
                kind: ChildKind::Cylinder,
                shape,
                local: Transform::new(c.centre, c.orientation * z_axis_alignment()),
                material,
            }
        }
        TColShape::Cone(c) => {
            let (radius, m) = inner(c.radius, c.margin);
            let (half_height, m) = inner(c.height * 0.5, m);
            let shape = SharedShape::round_cone(half_height, radius, m);
            MasterChild {
                kind: ChildKind::Cone,
                shape,
                local: Transform::new(c.centre, c.orientation * z_axis_alignment()),
                material,
            }
        }
        TColShape::Plane(p) => {
            let len = p.normal.length();
            if len < 1e-6 {
                return Err(degenerate(name, part, "plane normal is zero"));
            }
            let n = p.normal * (1.0 / len);
            let normal = Unit::new_normalize(Vector::new(n.x, n.y, n.z));
            MasterChild {
                kind: ChildKind::Plane,
                shape: SharedShape::halfspace(normal),
                local: Transform::from_position(n * (p.distance / len)),
                material,
            }
        }
        TColShape::Sphere(s) => MasterChild {
            kind: ChildKind::Sphere,
            shape: SharedShape::ball(s.radius),
            local: Transform::from_position(s.centre),
            material,
        },
    };
    Ok(child)
}

/// Build the master child list for a collision document
///
/// Nothing is returned unless every child builds.
pub fn build_children(
    name: &str,
    file: &TColFile,
    internal_edges: bool,
) -> Result<Vec<MasterChild>, MeshError> {
    let mut children = Vec::new();

    if let Some(compound) = &file.compound {
        for (i, shape) in compound.shapes.iter().enumerate() {
            children.push(build_primitive(name, i, shape)?);
        }
    }

    if let Some(tri) = &file.trimesh {
        let part = children.len();
        if tri.faces.is_empty() {
            return Err(degenerate(name, part, "trimesh has no faces"));
        }
        let vertexes: Vec<Point<Real>> = tri.vertexes.iter().map(|&v| to_point(v)).collect();
        let indexes: Vec<[u32; 3]> = tri.faces.iter().map(|f| f.indexes()).collect();
        let (kind, shape) = if file.is_static() {
            let mut mesh = TriMesh::new(vertexes, indexes);
            if internal_edges {
                // inconsistent winding only costs the edge fix, the mesh still collides
                if let Err(e) = mesh.set_flags(TriMeshFlags::FIX_INTERNAL_EDGES) {
                    log::warn!("{}: internal edge fix skipped: {:?}", name, e);
                }
            }
            (ChildKind::StaticTriMesh, SharedShape::new(mesh))
        } else {
            // parry has no rounded triangle mesh, so the collision margin is dropped
            if tri.margin > 0.0 {
                log::debug!("{}: trimesh margin {} not applied", name, tri.margin);
            }
            (ChildKind::DynamicTriMesh, SharedShape::trimesh(vertexes, indexes))
        };
        children.push(MasterChild { kind, shape, local: Transform::IDENTITY, material: 0 });
    }

    Ok(children)
}

/// Box-approximated principal inertia of the geometry's bounding box
///
/// Planes are unbounded and left out. Returns zero for a mesh with no
/// bounded geometry.
pub fn infer_inertia(children: &[MasterChild], mass: f32) -> Vector3 {
    let mut lo = Vector3::new(f32::MAX, f32::MAX, f32::MAX);
    let mut hi = Vector3::new(f32::MIN, f32::MIN, f32::MIN);
    let mut any = false;
    for child in children.iter().filter(|c| c.kind != ChildKind::Plane) {
        let aabb = child.shape.compute_aabb(&to_isometry(&child.local));
        lo = lo.min_components(from_point(&aabb.mins));
        hi = hi.max_components(from_point(&aabb.maxs));
        any = true;
    }
    if !any {
        return Vector3::ZERO;
    }
    let e = hi - lo;
    let k = mass / 12.0;
    Vector3::new(
        k * (e.y * e.y + e.z * e.z),
        k * (e.x * e.x + e.z * e.z),
        k * (e.x * e.x + e.y * e.y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use grit_col::{parse_tcol, MaterialDb};

    fn children_of(src: &str) -> Result<Vec<MasterChild>, MeshError> {
        let mut db = MaterialDb::new();
        db.add("m", 1).unwrap();
        let file = parse_tcol("t.tcol", src, &db).unwrap();
        build_children("t.tcol", &file, true)
    }

    #[test]
    fn test_children_follow_file_order() {
        let c = children_of(
            r#"TCOL1.0 attributes { mass 1; }
            compound {
                sphere { material "m"; radius 1; centre 0 0 2; }
                box { material "m"; dimensions 1 1 1; }
                cylinder { material "m"; dimensions 1 1 4; }
            }
            trimesh { vertexes { 0 0 0; 1 0 0; 0 1 0; } faces { 0 1 2 "m"; } }"#,
        )
        .unwrap();
        let kinds: Vec<_> = c.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ChildKind::Sphere, ChildKind::Box, ChildKind::Cylinder, ChildKind::DynamicTriMesh]
        );
        assert_eq!(c[0].local.position, Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(c[1].material, 1);
    }

    #[test]
    fn test_trimesh_margin_leaves_geometry_alone() {
        let c = children_of(
            r#"TCOL1.0 attributes { mass 1; }
            trimesh { margin 0.2; vertexes { 0 0 0; 1 0 0; 0 1 0; } faces { 0 1 2 "m"; } }"#,
        )
        .unwrap();
        assert_eq!(c[0].kind, ChildKind::DynamicTriMesh);
        let aabb = c[0].shape.compute_aabb(&to_isometry(&c[0].local));
        assert!((aabb.maxs.x - 1.0).abs() < 1e-5, "{:?}", aabb);
        assert!(aabb.mins.z.abs() < 1e-5 && aabb.maxs.z.abs() < 1e-5, "{:?}", aabb);
    }

    #[test]
    fn test_cylinder_runs_along_z() {
        let c = children_of(
            r#"TCOL1.0 attributes { static; } compound { cylinder { material "m"; dimensions 1 1 4; margin 0; } }"#,
        )
        .unwrap();
        let aabb = c[0].shape.compute_aabb(&to_isometry(&c[0].local));
        assert!((aabb.maxs.z - 2.0).abs() < 1e-4, "{:?}", aabb);
        assert!((aabb.maxs.x - 0.5).abs() < 1e-4, "{:?}", aabb);
    }

    #[test]
    fn test_static_trimesh_kind() {
        let c = children_of(
            r#"TCOL1.0 attributes { static; } trimesh { vertexes { 0 0 0; 1 0 0; 0 1 0; } faces { 0 1 2 "m"; } }"#,
        )
        .unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].kind, ChildKind::StaticTriMesh);
        assert!(!c[0].kind.is_convex());
    }

    #[test]
    fn test_zero_plane_normal_is_degenerate() {
        let err = children_of(
            r#"TCOL1.0 attributes { static; } compound {
                sphere { material "m"; radius 1; }
                plane { material "m"; normal 0 0 0; distance 1; }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::Degenerate { part: 1, .. }));
    }

    #[test]
    fn test_box_inertia() {
        let c = children_of(
            r#"TCOL1.0 attributes { mass 12; } compound { box { material "m"; dimensions 1 2 3; } }"#,
        )
        .unwrap();
        let i = infer_inertia(&c, 12.0);
        assert!((i.x - 13.0).abs() < 1e-3, "{:?}", i);
        assert!((i.y - 10.0).abs() < 1e-3, "{:?}", i);
        assert!((i.z - 5.0).abs() < 1e-3, "{:?}", i);
    }
}
