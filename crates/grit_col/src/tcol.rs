//! Collision document model
//!
//! The in-memory form of a parsed TCOL (or decoded BCOL) file. Everything
//! here is immutable template data: it is produced by a parser, converted
//! into collision shapes once, and never mutated afterwards.

use grit_math::{Quaternion, Vector3};

use crate::material::MaterialId;

/// Collision margin used when a shape does not specify one
pub const DEFAULT_MARGIN: f32 = 0.04;
/// Default linear sleep threshold (units per second)
pub const DEFAULT_LINEAR_SLEEP_THRESHOLD: f32 = 0.8;
/// Default angular sleep threshold (radians per second)
pub const DEFAULT_ANGULAR_SLEEP_THRESHOLD: f32 = 1.0;

/// Convex hull around a point cloud
#[derive(Clone, Debug, PartialEq)]
pub struct TColHull {
    pub material: MaterialId,
    pub margin: f32,
    pub vertexes: Vec<Vector3>,
}

/// Oriented box; `dimensions` are full edge lengths
#[derive(Clone, Debug, PartialEq)]
pub struct TColBox {
    pub material: MaterialId,
    pub margin: f32,
    pub centre: Vector3,
    pub orientation: Quaternion,
    pub dimensions: Vector3,
}

/// Z-aligned cylinder; `dimensions.x` is the diameter, `dimensions.z` the length
#[derive(Clone, Debug, PartialEq)]
pub struct TColCylinder {
    pub material: MaterialId,
    pub margin: f32,
    pub centre: Vector3,
    pub orientation: Quaternion,
    pub dimensions: Vector3,
}

/// Z-aligned cone with its apex towards +Z
#[derive(Clone, Debug, PartialEq)]
pub struct TColCone {
    pub material: MaterialId,
    pub margin: f32,
    pub centre: Vector3,
    pub orientation: Quaternion,
    pub radius: f32,
    pub height: f32,
}

/// Infinite plane `normal · p = distance`, solid on the side opposite the normal
#[derive(Clone, Debug, PartialEq)]
pub struct TColPlane {
    pub material: MaterialId,
    pub margin: f32,
    pub normal: Vector3,
    pub distance: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TColSphere {
    pub material: MaterialId,
    pub margin: f32,
    pub centre: Vector3,
    pub radius: f32,
}

/// One primitive of a compound
#[derive(Clone, Debug, PartialEq)]
pub enum TColShape {
    Hull(TColHull),
    Box(TColBox),
    Cylinder(TColCylinder),
    Cone(TColCone),
    Plane(TColPlane),
    Sphere(TColSphere),
}

impl TColShape {
    pub fn material(&self) -> MaterialId {
        match self {
            TColShape::Hull(s) => s.material,
            TColShape::Box(s) => s.material,
            TColShape::Cylinder(s) => s.material,
            TColShape::Cone(s) => s.material,
            TColShape::Plane(s) => s.material,
            TColShape::Sphere(s) => s.material,
        }
    }

    pub fn margin(&self) -> f32 {
        match self {
            TColShape::Hull(s) => s.margin,
            TColShape::Box(s) => s.margin,
            TColShape::Cylinder(s) => s.margin,
            TColShape::Cone(s) => s.margin,
            TColShape::Plane(s) => s.margin,
            TColShape::Sphere(s) => s.margin,
        }
    }

    /// TCOL keyword for this primitive
    pub fn keyword(&self) -> &'static str {
        match self {
            TColShape::Hull(_) => "hull",
            TColShape::Box(_) => "box",
            TColShape::Cylinder(_) => "cylinder",
            TColShape::Cone(_) => "cone",
            TColShape::Plane(_) => "plane",
            TColShape::Sphere(_) => "sphere",
        }
    }
}

/// Ordered list of primitives; the index is the stable element index
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TColCompound {
    pub shapes: Vec<TColShape>,
}

/// Triangle referencing three vertexes and one material
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TColFace {
    pub v1: u32,
    pub v2: u32,
    pub v3: u32,
    pub material: MaterialId,
}

impl TColFace {
    pub fn new(v1: u32, v2: u32, v3: u32, material: MaterialId) -> Self {
        Self { v1, v2, v3, material }
    }

    pub fn indexes(&self) -> [u32; 3] {
        [self.v1, self.v2, self.v3]
    }
}

/// Indexed triangle mesh. Every face index is `< vertexes.len()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TColTriMesh {
    /// Only used when the owning object is dynamic
    pub margin: f32,
    pub vertexes: Vec<Vector3>,
    pub faces: Vec<TColFace>,
}

/// Top-level collision document
///
/// `mass == 0` means the object is static, in which case `inertia` is
/// forced to zero.
#[derive(Clone, Debug, PartialEq)]
pub struct TColFile {
    pub mass: f32,
    /// `None` means "compute from the shape"
    pub inertia: Option<Vector3>,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub linear_sleep_threshold: f32,
    pub angular_sleep_threshold: f32,
    pub ccd_motion_threshold: f32,
    pub ccd_swept_sphere_radius: f32,
    pub compound: Option<TColCompound>,
    pub trimesh: Option<TColTriMesh>,
}

impl Default for TColFile {
    fn default() -> Self {
        Self {
            mass: 0.0,
            inertia: Some(Vector3::ZERO),
            linear_damping: 0.0,
            angular_damping: 0.0,
            linear_sleep_threshold: DEFAULT_LINEAR_SLEEP_THRESHOLD,
            angular_sleep_threshold: DEFAULT_ANGULAR_SLEEP_THRESHOLD,
            ccd_motion_threshold: 0.0,
            ccd_swept_sphere_radius: 0.0,
            compound: None,
            trimesh: None,
        }
    }
}

impl TColFile {
    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    /// Number of compound primitives (trimesh excluded)
    pub fn compound_len(&self) -> usize {
        self.compound.as_ref().map(|c| c.shapes.len()).unwrap_or(0)
    }

    /// Number of trimesh faces
    pub fn face_count(&self) -> usize {
        self.trimesh.as_ref().map(|t| t.faces.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_static() {
        let f = TColFile::default();
        assert!(f.is_static());
        assert_eq!(f.inertia, Some(Vector3::ZERO));
        assert_eq!(f.compound_len(), 0);
        assert_eq!(f.face_count(), 0);
    }

    #[test]
    fn test_shape_accessors() {
        let s = TColShape::Sphere(TColSphere {
            material: 3,
            margin: 0.5,
            centre: Vector3::ZERO,
            radius: 0.5,
        });
        assert_eq!(s.material(), 3);
        assert_eq!(s.margin(), 0.5);
        assert_eq!(s.keyword(), "sphere");
    }
}
