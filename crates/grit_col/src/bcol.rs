//! BCOL binary collision format
//!
//! A fixed little-endian layout of `repr(C)` records that can be read in
//! place from a loaded blob. Variable-length sections are reached through
//! offsets that are relative to the position of the offset field itself,
//! so any sub-slice of the blob can be interpreted without knowing where
//! the blob starts. Material references are offsets to NUL-terminated
//! names, resolved against a [`MaterialDb`] on demand.
//!
//! Compound children are grouped by kind (hulls, boxes, cylinders, cones,
//! planes, spheres), so a TCOL compound that interleaves kinds comes back
//! from [`BColView::to_tcol`] in grouped order.

use std::collections::HashMap;
use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use grit_math::{Quaternion, Vector3};

use crate::error::BColError;
use crate::material::{MaterialDb, MaterialId};
use crate::tcol::{
    TColBox, TColCompound, TColCone, TColCylinder, TColFace, TColFile, TColHull, TColPlane,
    TColShape, TColSphere, TColTriMesh,
};

const _: () = assert!(
    cfg!(target_endian = "little"),
    "BCOL records are read in place and require a little-endian host"
);

/// Full 8-byte magic at the start of every blob
pub const BCOL_MAGIC: [u8; 8] = *b"BCOL1.0\n";
/// First four magic bytes read as a little-endian u32, for format sniffing
pub const BCOL_SNIFF: u32 = 0x4c4f_4342;

/// Header flag: the blob carries a compound
pub const FLAG_COMPOUND: u32 = 1;
/// Header flag: the blob carries a triangle mesh
pub const FLAG_TRIMESH: u32 = 2;
/// Header flag: inertia was authored rather than left for inference
pub const FLAG_INERTIA: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColHeader {
    pub magic: [u8; 8],
    pub total_size: u32,
    pub flags: u32,
    pub mass: f32,
    pub inertia: [f32; 3],
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub linear_sleep_threshold: f32,
    pub angular_sleep_threshold: f32,
    pub ccd_motion_threshold: f32,
    pub ccd_swept_sphere_radius: f32,
    pub hull_num: u32,
    pub hull_off: u32,
    pub box_num: u32,
    pub box_off: u32,
    pub cyl_num: u32,
    pub cyl_off: u32,
    pub cone_num: u32,
    pub cone_off: u32,
    pub plane_num: u32,
    pub plane_off: u32,
    pub sphere_num: u32,
    pub sphere_off: u32,
    pub tri_margin: f32,
    pub vert_num: u32,
    pub vert_off: u32,
    pub face_num: u32,
    pub face_off: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColVert {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColHull {
    pub mat: u32,
    pub margin: f32,
    pub vert_num: u32,
    pub vert_off: u32,
}

/// Shared by boxes and cylinders
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColBox {
    pub mat: u32,
    pub margin: f32,
    pub centre: [f32; 3],
    pub dimensions: [f32; 3],
    pub quat: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColCone {
    pub mat: u32,
    pub margin: f32,
    pub centre: [f32; 3],
    pub quat: [f32; 4],
    pub radius: f32,
    pub height: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColPlane {
    pub mat: u32,
    pub margin: f32,
    pub normal: [f32; 3],
    pub distance: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColSphere {
    pub mat: u32,
    pub margin: f32,
    pub centre: [f32; 3],
    pub radius: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BColFace {
    pub v1: u32,
    pub v2: u32,
    pub v3: u32,
    pub mat: u32,
}

fn to_v3(a: [f32; 3]) -> Vector3 {
    Vector3::new(a[0], a[1], a[2])
}

fn to_quat(a: [f32; 4]) -> Quaternion {
    Quaternion::new(a[0], a[1], a[2], a[3])
}

/// True if `bytes` starts with the BCOL signature
pub fn sniff(bytes: &[u8]) -> bool {
    match bytes.get(0..4) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) == BCOL_SNIFF,
        None => false,
    }
}

/// Read-only view over a BCOL blob
pub struct BColView<'a> {
    bytes: &'a [u8],
    header: BColHeader,
}

impl<'a> BColView<'a> {
    /// Validate the header and wrap the blob
    pub fn new(bytes: &'a [u8]) -> Result<Self, BColError> {
        let needed = size_of::<BColHeader>();
        if bytes.len() < needed {
            return Err(BColError::Truncated { needed, len: bytes.len() });
        }
        let header: BColHeader = bytemuck::pod_read_unaligned(&bytes[..needed]);
        if header.magic != BCOL_MAGIC {
            return Err(BColError::BadMagic);
        }
        let total = header.total_size as usize;
        if bytes.len() < total {
            return Err(BColError::Truncated { needed: total, len: bytes.len() });
        }
        Ok(Self { bytes: &bytes[..total], header })
    }

    pub fn header(&self) -> &BColHeader {
        &self.header
    }

    pub fn is_static(&self) -> bool {
        self.header.mass == 0.0
    }

    /// Copy out the record of type `T` at absolute position `pos`
    fn record<T: Pod>(&self, pos: usize) -> Result<T, BColError> {
        let end = pos + size_of::<T>();
        match self.bytes.get(pos..end) {
            Some(b) => Ok(bytemuck::pod_read_unaligned(b)),
            None => Err(BColError::Truncated { needed: end, len: self.bytes.len() }),
        }
    }

    /// Absolute target of the self-relative offset stored at `field_pos`
    fn follow(&self, field_pos: usize, off: u32) -> Result<usize, BColError> {
        let target = field_pos
            .checked_add(off as usize)
            .ok_or(BColError::OffsetOutOfRange { field: field_pos })?;
        if target > self.bytes.len() {
            return Err(BColError::OffsetOutOfRange { field: field_pos });
        }
        Ok(target)
    }

    /// Positions of `num` consecutive records of type `T`
    fn array<T: Pod>(&self, field_pos: usize, off: u32, num: u32) -> Result<Vec<(usize, T)>, BColError> {
        if num == 0 {
            return Ok(Vec::new());
        }
        let base = self.follow(field_pos, off)?;
        let end = (num as usize)
            .checked_mul(size_of::<T>())
            .and_then(|len| base.checked_add(len))
            .unwrap_or(usize::MAX);
        if end > self.bytes.len() {
            return Err(BColError::Truncated { needed: end, len: self.bytes.len() });
        }
        (0..num as usize)
            .map(|i| {
                let pos = base + i * size_of::<T>();
                self.record::<T>(pos).map(|r| (pos, r))
            })
            .collect()
    }

    /// Material name referenced by the offset at `field_pos`
    pub fn material_name(&self, field_pos: usize, off: u32) -> Result<&'a str, BColError> {
        let start = self.follow(field_pos, off)?;
        let rest = &self.bytes[start..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(BColError::BadMaterialName { pos: start })?;
        std::str::from_utf8(&rest[..len]).map_err(|_| BColError::BadMaterialName { pos: start })
    }

    fn vertexes(&self, field_pos: usize, off: u32, num: u32) -> Result<Vec<Vector3>, BColError> {
        Ok(self
            .array::<BColVert>(field_pos, off, num)?
            .into_iter()
            .map(|(_, v)| Vector3::new(v.x, v.y, v.z))
            .collect())
    }

    /// Decode into the document model, resolving materials against `db`
    ///
    /// Names are resolved once per distinct string position, so the many
    /// faces that share one name string cost a single lookup.
    pub fn to_tcol(&self, name: &str, db: &MaterialDb) -> Result<TColFile, BColError> {
        let h = &self.header;
        let mut cache: HashMap<usize, MaterialId> = HashMap::new();
        let mut material = |field_pos: usize, off: u32| -> Result<MaterialId, BColError> {
            let pos = self.follow(field_pos, off)?;
            if let Some(&id) = cache.get(&pos) {
                return Ok(id);
            }
            let id = db.resolve(self.material_name(field_pos, off)?, name);
            cache.insert(pos, id);
            Ok(id)
        };

        let mut file = TColFile {
            mass: h.mass,
            inertia: if h.flags & FLAG_INERTIA != 0 { Some(to_v3(h.inertia)) } else { None },
            linear_damping: h.linear_damping,
            angular_damping: h.angular_damping,
            linear_sleep_threshold: h.linear_sleep_threshold,
            angular_sleep_threshold: h.angular_sleep_threshold,
            ccd_motion_threshold: h.ccd_motion_threshold,
            ccd_swept_sphere_radius: h.ccd_swept_sphere_radius,
            compound: None,
            trimesh: None,
        };
        if file.is_static() {
            file.inertia = Some(Vector3::ZERO);
        }

        if h.flags & FLAG_COMPOUND != 0 {
            let mut shapes = Vec::new();
            for (pos, r) in self.array::<BColHull>(offset_of!(BColHeader, hull_off), h.hull_off, h.hull_num)? {
                shapes.push(TColShape::Hull(TColHull {
                    material: material(pos + offset_of!(BColHull, mat), r.mat)?,
                    margin: r.margin,
                    vertexes: self.vertexes(pos + offset_of!(BColHull, vert_off), r.vert_off, r.vert_num)?,
                }));
            }
            for (pos, r) in self.array::<BColBox>(offset_of!(BColHeader, box_off), h.box_off, h.box_num)? {
                shapes.push(TColShape::Box(TColBox {
                    material: material(pos + offset_of!(BColBox, mat), r.mat)?,
                    margin: r.margin,
                    centre: to_v3(r.centre),
                    orientation: to_quat(r.quat),
                    dimensions: to_v3(r.dimensions),
                }));
            }
            for (pos, r) in self.array::<BColBox>(offset_of!(BColHeader, cyl_off), h.cyl_off, h.cyl_num)? {
                shapes.push(TColShape::Cylinder(TColCylinder {
                    material: material(pos + offset_of!(BColBox, mat), r.mat)?,
                    margin: r.margin,
                    centre: to_v3(r.centre),
                    orientation: to_quat(r.quat),
                    dimensions: to_v3(r.dimensions),
                }));
            }
            for (pos, r) in self.array::<BColCone>(offset_of!(BColHeader, cone_off), h.cone_off, h.cone_num)? {
                shapes.push(TColShape::Cone(TColCone {
                    material: material(pos + offset_of!(BColCone, mat), r.mat)?,
                    margin: r.margin,
                    centre: to_v3(r.centre),
                    orientation: to_quat(r.quat),
                    radius: r.radius,
                    height: r.height,
                }));
            }
            for (pos, r) in self.array::<BColPlane>(offset_of!(BColHeader, plane_off), h.plane_off, h.plane_num)? {
                shapes.push(TColShape::Plane(TColPlane {
                    material: material(pos + offset_of!(BColPlane, mat), r.mat)?,
                    margin: r.margin,
                    normal: to_v3(r.normal),
                    distance: r.distance,
                }));
            }
            for (pos, r) in self.array::<BColSphere>(offset_of!(BColHeader, sphere_off), h.sphere_off, h.sphere_num)? {
                shapes.push(TColShape::Sphere(TColSphere {
                    material: material(pos + offset_of!(BColSphere, mat), r.mat)?,
                    margin: r.margin,
                    centre: to_v3(r.centre),
                    radius: r.radius,
                }));
            }
            file.compound = Some(TColCompound { shapes });
        }

        if h.flags & FLAG_TRIMESH != 0 {
            let vertexes = self.vertexes(offset_of!(BColHeader, vert_off), h.vert_off, h.vert_num)?;
            let records = self.array::<BColFace>(offset_of!(BColHeader, face_off), h.face_off, h.face_num)?;
            let mut faces = Vec::with_capacity(records.len());
            for (i, (pos, f)) in records.into_iter().enumerate() {
                for index in [f.v1, f.v2, f.v3] {
                    if index as usize >= vertexes.len() {
                        return Err(BColError::IndexOutOfRange { face: i, index, vertexes: vertexes.len() });
                    }
                }
                let mat = material(pos + offset_of!(BColFace, mat), f.mat)?;
                faces.push(TColFace::new(f.v1, f.v2, f.v3, mat));
            }
            file.trimesh = Some(TColTriMesh { margin: h.tri_margin, vertexes, faces });
        }

        Ok(file)
    }
}

/// Blob under construction: records are placed at precomputed positions
struct Writer {
    buf: Vec<u8>,
    names: HashMap<MaterialId, usize>,
}

impl Writer {
    fn put<T: Pod>(&mut self, pos: usize, record: &T) {
        self.buf[pos..pos + size_of::<T>()].copy_from_slice(bytemuck::bytes_of(record));
    }

    /// Self-relative offset from `field_pos` to `target`
    fn rel(field_pos: usize, target: usize) -> u32 {
        (target - field_pos) as u32
    }

    fn mat(&self, field_pos: usize, id: MaterialId) -> u32 {
        // Every referenced id was given a name slot during layout
        Self::rel(field_pos, self.names.get(&id).copied().unwrap_or(field_pos))
    }
}

/// Encode a document as a BCOL blob
pub fn write(file: &TColFile, db: &MaterialDb) -> Vec<u8> {
    let no_shapes = Vec::new();
    let shapes = file.compound.as_ref().map(|c| &c.shapes).unwrap_or(&no_shapes);
    let hulls: Vec<_> = shapes.iter().filter_map(|s| match s { TColShape::Hull(h) => Some(h), _ => None }).collect();
    let boxes: Vec<_> = shapes.iter().filter_map(|s| match s { TColShape::Box(b) => Some(b), _ => None }).collect();
    let cyls: Vec<_> = shapes.iter().filter_map(|s| match s { TColShape::Cylinder(c) => Some(c), _ => None }).collect();
    let cones: Vec<_> = shapes.iter().filter_map(|s| match s { TColShape::Cone(c) => Some(c), _ => None }).collect();
    let planes: Vec<_> = shapes.iter().filter_map(|s| match s { TColShape::Plane(p) => Some(p), _ => None }).collect();
    let spheres: Vec<_> = shapes.iter().filter_map(|s| match s { TColShape::Sphere(p) => Some(p), _ => None }).collect();
    let empty_tri = TColTriMesh::default();
    let tri = file.trimesh.as_ref().unwrap_or(&empty_tri);

    // Layout pass
    let mut pos = size_of::<BColHeader>();
    let mut section = |count: usize, size: usize| {
        let start = pos;
        pos += count * size;
        start
    };
    let hull_pos = section(hulls.len(), size_of::<BColHull>());
    let box_pos = section(boxes.len(), size_of::<BColBox>());
    let cyl_pos = section(cyls.len(), size_of::<BColBox>());
    let cone_pos = section(cones.len(), size_of::<BColCone>());
    let plane_pos = section(planes.len(), size_of::<BColPlane>());
    let sphere_pos = section(spheres.len(), size_of::<BColSphere>());
    let hull_vert_pos: Vec<usize> = hulls
        .iter()
        .map(|h| section(h.vertexes.len(), size_of::<BColVert>()))
        .collect();
    let vert_pos = section(tri.vertexes.len(), size_of::<BColVert>());
    let face_pos = section(tri.faces.len(), size_of::<BColFace>());

    let mut names: HashMap<MaterialId, usize> = HashMap::new();
    let mut string_table: Vec<u8> = Vec::new();
    let string_base = pos;
    let used = shapes.iter().map(|s| s.material()).chain(tri.faces.iter().map(|f| f.material));
    for id in used {
        names.entry(id).or_insert_with(|| {
            let at = string_base + string_table.len();
            string_table.extend_from_slice(db.name_of(id).as_bytes());
            string_table.push(0);
            at
        });
    }
    let total = string_base + string_table.len();

    let mut w = Writer { buf: vec![0u8; total], names };
    w.buf[string_base..].copy_from_slice(&string_table);

    let rel_or_zero = |count: usize, field: usize, target: usize| if count == 0 { 0 } else { Writer::rel(field, target) };
    let mut flags = 0;
    if file.compound.is_some() {
        flags |= FLAG_COMPOUND;
    }
    if file.trimesh.is_some() {
        flags |= FLAG_TRIMESH;
    }
    if file.inertia.is_some() {
        flags |= FLAG_INERTIA;
    }
    let inertia = file.inertia.unwrap_or(Vector3::ZERO);
    let header = BColHeader {
        magic: BCOL_MAGIC,
        total_size: total as u32,
        flags,
        mass: file.mass,
        inertia: inertia.to_array(),
        linear_damping: file.linear_damping,
        angular_damping: file.angular_damping,
        linear_sleep_threshold: file.linear_sleep_threshold,
        angular_sleep_threshold: file.angular_sleep_threshold,
        ccd_motion_threshold: file.ccd_motion_threshold,
        ccd_swept_sphere_radius: file.ccd_swept_sphere_radius,
        hull_num: hulls.len() as u32,
        hull_off: rel_or_zero(hulls.len(), offset_of!(BColHeader, hull_off), hull_pos),
        box_num: boxes.len() as u32,
        box_off: rel_or_zero(boxes.len(), offset_of!(BColHeader, box_off), box_pos),
        cyl_num: cyls.len() as u32,
        cyl_off: rel_or_zero(cyls.len(), offset_of!(BColHeader, cyl_off), cyl_pos),
        cone_num: cones.len() as u32,
        cone_off: rel_or_zero(cones.len(), offset_of!(BColHeader, cone_off), cone_pos),
        plane_num: planes.len() as u32,
        plane_off: rel_or_zero(planes.len(), offset_of!(BColHeader, plane_off), plane_pos),
        sphere_num: spheres.len() as u32,
        sphere_off: rel_or_zero(spheres.len(), offset_of!(BColHeader, sphere_off), sphere_pos),
        tri_margin: tri.margin,
        vert_num: tri.vertexes.len() as u32,
        vert_off: rel_or_zero(tri.vertexes.len(), offset_of!(BColHeader, vert_off), vert_pos),
        face_num: tri.faces.len() as u32,
        face_off: rel_or_zero(tri.faces.len(), offset_of!(BColHeader, face_off), face_pos),
    };
    w.put(0, &header);

    let put_verts = |w: &mut Writer, at: usize, vs: &[Vector3]| {
        for (i, v) in vs.iter().enumerate() {
            w.put(at + i * size_of::<BColVert>(), &BColVert { x: v.x, y: v.y, z: v.z });
        }
    };

    for (i, h) in hulls.iter().enumerate() {
        let at = hull_pos + i * size_of::<BColHull>();
        let rec = BColHull {
            mat: w.mat(at + offset_of!(BColHull, mat), h.material),
            margin: h.margin,
            vert_num: h.vertexes.len() as u32,
            vert_off: rel_or_zero(h.vertexes.len(), at + offset_of!(BColHull, vert_off), hull_vert_pos[i]),
        };
        w.put(at, &rec);
        put_verts(&mut w, hull_vert_pos[i], &h.vertexes);
    }
    for (i, b) in boxes.iter().enumerate() {
        let at = box_pos + i * size_of::<BColBox>();
        let rec = BColBox {
            mat: w.mat(at + offset_of!(BColBox, mat), b.material),
            margin: b.margin,
            centre: b.centre.to_array(),
            dimensions: b.dimensions.to_array(),
            quat: [b.orientation.w, b.orientation.x, b.orientation.y, b.orientation.z],
        };
        w.put(at, &rec);
    }
    for (i, c) in cyls.iter().enumerate() {
        let at = cyl_pos + i * size_of::<BColBox>();
        let rec = BColBox {
            mat: w.mat(at + offset_of!(BColBox, mat), c.material),
            margin: c.margin,
            centre: c.centre.to_array(),
            dimensions: c.dimensions.to_array(),
            quat: [c.orientation.w, c.orientation.x, c.orientation.y, c.orientation.z],
        };
        w.put(at, &rec);
    }
    for (i, c) in cones.iter().enumerate() {
        let at = cone_pos + i * size_of::<BColCone>();
        let rec = BColCone {
            mat: w.mat(at + offset_of!(BColCone, mat), c.material),
            margin: c.margin,
            centre: c.centre.to_array(),
            quat: [c.orientation.w, c.orientation.x, c.orientation.y, c.orientation.z],
            radius: c.radius,
            height: c.height,
        };
        w.put(at, &rec);
    }
    for (i, p) in planes.iter().enumerate() {
        let at = plane_pos + i * size_of::<BColPlane>();
        let rec = BColPlane {
            mat: w.mat(at + offset_of!(BColPlane, mat), p.material),
            margin: p.margin,
            normal: p.normal.to_array(),
            distance: p.distance,
        };
        w.put(at, &rec);
    }
    for (i, s) in spheres.iter().enumerate() {
        let at = sphere_pos + i * size_of::<BColSphere>();
        let rec = BColSphere {
            mat: w.mat(at + offset_of!(BColSphere, mat), s.material),
            margin: s.margin,
            centre: s.centre.to_array(),
            radius: s.radius,
        };
        w.put(at, &rec);
    }

    put_verts(&mut w, vert_pos, &tri.vertexes);
    for (i, f) in tri.faces.iter().enumerate() {
        let at = face_pos + i * size_of::<BColFace>();
        let rec = BColFace {
            v1: f.v1,
            v2: f.v2,
            v3: f.v3,
            mat: w.mat(at + offset_of!(BColFace, mat), f.material),
        };
        w.put(at, &rec);
    }

    w.buf
}
