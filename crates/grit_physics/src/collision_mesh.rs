//! Collision meshes
//!
//! A [`CollisionMesh`] is the shared template behind every body that uses
//! one collision resource. It owns the master child shapes, the per-part
//! and per-face material tables, and a per-material face table used for
//! surface scattering. Bodies build their own colliders from the master
//! children and never modify them.

use std::collections::HashMap;
use std::f32::consts::TAU;

use grit_col::{bcol, parse_tcol_bytes, BColView, MaterialDb, MaterialId, TColFile};
use grit_math::{Quaternion, Radian, Transform, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::body::BodyKey;
use crate::error::MeshError;
use crate::shapes::{build_children, infer_inertia, ChildKind, MasterChild};
use crate::source::ResourceSource;

/// Mass and motion attributes shared by every body using a mesh
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshProperties {
    pub mass: f32,
    pub inertia: Vector3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub linear_sleep_threshold: f32,
    pub angular_sleep_threshold: f32,
    pub ccd_motion_threshold: f32,
    pub ccd_swept_sphere_radius: f32,
}

impl MeshProperties {
    fn from_file(file: &TColFile, children: &[MasterChild]) -> Self {
        let inertia = if file.is_static() {
            Vector3::ZERO
        } else {
            file.inertia.unwrap_or_else(|| infer_inertia(children, file.mass))
        };
        Self {
            mass: file.mass,
            inertia,
            linear_damping: file.linear_damping,
            angular_damping: file.angular_damping,
            linear_sleep_threshold: file.linear_sleep_threshold,
            angular_sleep_threshold: file.angular_sleep_threshold,
            ccd_motion_threshold: file.ccd_motion_threshold,
            ccd_swept_sphere_radius: file.ccd_swept_sphere_radius,
        }
    }
}

/// Faces of one material, in file order
#[derive(Clone, Debug, Default)]
struct FaceList {
    faces: Vec<usize>,
    areas: Vec<f32>,
    total_area: f32,
}

/// Options for [`CollisionMesh::scatter`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterParams {
    /// Expected samples per unit of surface area
    pub density: f32,
    /// Accepted range of the world-space face normal's z component
    pub min_slope: f32,
    pub max_slope: f32,
    /// Accepted range of the sample's world-space z
    pub min_elevation: f32,
    pub max_elevation: f32,
    /// Zero the z of every emitted position
    pub no_z: bool,
    /// Spin each sample by a random angle around its up axis
    pub rotate: bool,
    /// Tilt each sample so its up axis follows the face normal
    pub align_slope: bool,
}

impl Default for ScatterParams {
    fn default() -> Self {
        Self {
            density: 1.0,
            min_slope: 0.0,
            max_slope: 1.0,
            min_elevation: f32::MIN,
            max_elevation: f32::MAX,
            no_z: false,
            rotate: true,
            align_slope: false,
        }
    }
}

/// RNG for scatter calls
///
/// Any seed gives the same fixed sequence (seeded with 0); `None` seeds
/// from the operating system.
pub fn scatter_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(_) => StdRng::seed_from_u64(0),
        None => StdRng::from_os_rng(),
    }
}

/// Shared collision template for one named resource
#[derive(Debug)]
pub struct CollisionMesh {
    name: String,
    file: Option<TColFile>,
    children: Vec<MasterChild>,
    part_materials: Vec<MaterialId>,
    face_materials: Vec<MaterialId>,
    /// Face corners in the mesh frame
    faces: Vec<[Vector3; 3]>,
    face_db: HashMap<MaterialId, FaceList>,
    properties: MeshProperties,
    users: Vec<BodyKey>,
}

fn triangle_area(t: &[Vector3; 3]) -> f32 {
    (t[1] - t[0]).cross(t[2] - t[0]).length() * 0.5
}

/// Closest point on triangle `t` to `p`
pub(crate) fn closest_point_on_triangle(p: Vector3, t: &[Vector3; 3]) -> Vector3 {
    let [a, b, c] = *t;
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }
    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }
    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }
    let denom = va + vb + vc;
    if denom.abs() < f32::EPSILON {
        return a;
    }
    a + ab * (vb / denom) + ac * (vc / denom)
}

/// Decode TCOL or BCOL bytes, picking the format by magic then extension
pub fn decode(name: &str, bytes: &[u8], db: &MaterialDb) -> Result<TColFile, MeshError> {
    if bcol::sniff(bytes) {
        return Ok(BColView::new(bytes)?.to_tcol(name, db)?);
    }
    if bytes.starts_with(grit_col::TCOL_HEADER.as_bytes()) || name.ends_with(".tcol") {
        return Ok(parse_tcol_bytes(name, bytes, db)?);
    }
    if name.ends_with(".bcol") {
        return Ok(BColView::new(bytes)?.to_tcol(name, db)?);
    }
    Err(MeshError::UnknownFormat(name.to_string()))
}

impl CollisionMesh {
    /// Create an unloaded mesh for a resource name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            children: Vec::new(),
            part_materials: Vec::new(),
            face_materials: Vec::new(),
            faces: Vec::new(),
            face_db: HashMap::new(),
            properties: MeshProperties::from_file(&TColFile::default(), &[]),
            users: Vec::new(),
        }
    }

    /// Build a loaded mesh straight from a document
    pub fn from_tcol(name: impl Into<String>, file: TColFile, internal_edges: bool) -> Result<Self, MeshError> {
        let mut mesh = Self::new(name);
        let children = build_children(&mesh.name, &file, internal_edges)?;
        mesh.install(file, children);
        Ok(mesh)
    }

    /// Read, decode and build the mesh from `source`
    ///
    /// On failure the mesh is left exactly as it was.
    pub fn load(
        &mut self,
        source: &dyn ResourceSource,
        db: &MaterialDb,
        internal_edges: bool,
    ) -> Result<(), MeshError> {
        let bytes = source.read(&self.name)?;
        let file = decode(&self.name, &bytes, db)?;
        let children = build_children(&self.name, &file, internal_edges)?;
        self.install(file, children);
        log::info!(
            "Loaded collision mesh {} ({} parts, {} faces)",
            self.name,
            self.children.len(),
            self.faces.len()
        );
        Ok(())
    }

    fn install(&mut self, file: TColFile, children: Vec<MasterChild>) {
        self.unload();
        self.properties = MeshProperties::from_file(&file, &children);
        self.part_materials = children
            .iter()
            .filter(|c| !c.kind.is_trimesh())
            .map(|c| c.material)
            .collect();

        if let Some(tri) = &file.trimesh {
            for (i, face) in tri.faces.iter().enumerate() {
                let corners = [
                    tri.vertexes[face.v1 as usize],
                    tri.vertexes[face.v2 as usize],
                    tri.vertexes[face.v3 as usize],
                ];
                let area = triangle_area(&corners);
                let list = self.face_db.entry(face.material).or_default();
                list.faces.push(i);
                list.areas.push(area);
                list.total_area += area;
                self.faces.push(corners);
                self.face_materials.push(face.material);
            }
        }

        self.children = children;
        self.file = Some(file);
    }

    /// Drop the built shapes and tables. Safe to call repeatedly.
    pub fn unload(&mut self) {
        self.children.clear();
        self.part_materials.clear();
        self.face_materials.clear();
        self.faces.clear();
        self.face_db.clear();
        self.file = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.file.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded document, while loaded
    pub fn document(&self) -> Option<&TColFile> {
        self.file.as_ref()
    }

    pub fn children(&self) -> &[MasterChild] {
        &self.children
    }

    pub fn properties(&self) -> &MeshProperties {
        &self.properties
    }

    pub fn is_static(&self) -> bool {
        self.properties.mass == 0.0
    }

    /// Bodies currently built from this mesh
    pub fn users(&self) -> &[BodyKey] {
        &self.users
    }

    pub(crate) fn register_user(&mut self, key: BodyKey) {
        if !self.users.contains(&key) {
            self.users.push(key);
        }
    }

    pub(crate) fn unregister_user(&mut self, key: BodyKey) {
        self.users.retain(|&k| k != key);
    }

    /// Materials of the compound parts, index-aligned with them
    pub fn part_materials(&self) -> &[MaterialId] {
        &self.part_materials
    }

    /// Materials of the trimesh faces, index-aligned with them
    pub fn face_materials(&self) -> &[MaterialId] {
        &self.face_materials
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Corners of trimesh face `i` in the mesh frame
    pub fn face(&self, i: usize) -> Option<&[Vector3; 3]> {
        self.faces.get(i)
    }

    /// Material of child `part`, using `face` when the child is the trimesh
    ///
    /// `None` means the indexes do not fit the tables.
    pub fn material_of(&self, part: usize, face: Option<u32>) -> Option<MaterialId> {
        let child = self.children.get(part)?;
        if child.kind.is_trimesh() {
            self.face_materials.get(face? as usize).copied()
        } else {
            Some(child.material)
        }
    }

    /// Trimesh face nearest to a point in the mesh frame
    pub fn nearest_face(&self, p: Vector3) -> Option<u32> {
        let mut best: Option<(u32, f32)> = None;
        for (i, tri) in self.faces.iter().enumerate() {
            let d = (closest_point_on_triangle(p, tri) - p).length_squared();
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i as u32, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// The one convex child, if the mesh consists of exactly that
    pub fn convex_child(&self) -> Option<&MasterChild> {
        match self.children.as_slice() {
            [only] if only.kind.is_convex() => Some(only),
            _ => None,
        }
    }

    /// Index of the trimesh child, if any
    pub fn trimesh_part(&self) -> Option<usize> {
        self.children.iter().position(|c| c.kind.is_trimesh())
    }

    /// Total trimesh surface area of one material
    pub fn material_area(&self, material: MaterialId) -> f32 {
        self.face_db.get(&material).map_or(0.0, |l| l.total_area)
    }

    /// Area-weighted random placements over the faces of one material
    ///
    /// Faces are walked in file order. Each face adds `area * density` to a
    /// running count and emits the whole part of it, so fractional counts
    /// carry over to later faces. Faces whose world-space slope is outside
    /// the accepted range still consume their share.
    pub fn scatter<R: Rng + ?Sized>(
        &self,
        material: MaterialId,
        world: &Transform,
        params: &ScatterParams,
        rng: &mut R,
    ) -> Vec<Transform> {
        let mut out = Vec::new();
        let Some(list) = self.face_db.get(&material) else {
            return out;
        };

        let mut left_over = 0.0f32;
        for (&face, &area) in list.faces.iter().zip(&list.areas) {
            let expected = area * params.density + left_over;
            let samples = expected.floor();
            left_over = expected - samples;

            let [a, b, c] = self.faces[face].map(|v| world.transform_point(v));
            let normal = (b - a).cross(c - a).normalized();
            if normal.z < params.min_slope || normal.z > params.max_slope {
                continue;
            }

            for _ in 0..samples as usize {
                let mut x: f32 = rng.random();
                let mut y: f32 = rng.random();
                if x + y > 1.0 {
                    x = 1.0 - x;
                    y = 1.0 - y;
                }
                let mut p = a + (b - a) * x + (c - a) * y;
                if p.z < params.min_elevation || p.z > params.max_elevation {
                    continue;
                }

                let mut q = if params.align_slope {
                    Quaternion::rotation_to(Vector3::UNIT_Z, normal)
                } else {
                    Quaternion::IDENTITY
                };
                if params.rotate {
                    let spin: f32 = rng.random();
                    q = q * Quaternion::from_angle_axis(Radian(spin * TAU), Vector3::UNIT_Z);
                }
                if params.no_z {
                    p.z = 0.0;
                }
                out.push(Transform::new(p, q));
            }
        }
        out
    }

    /// Kind of each child, in part order
    pub fn part_kinds(&self) -> Vec<ChildKind> {
        self.children.iter().map(|c| c.kind).collect()
    }
}
