//! Contact material resolution
//!
//! Every collider carries its body key and part index. When the solver
//! builds contacts, both sides are mapped back to a material through the
//! owning mesh's part and face tables, and the pair of interaction groups
//! picks friction and restitution from the interaction matrix.

use std::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use grit_col::{MaterialDb, MaterialId};
use grit_math::Vector3;
use rapier3d::prelude::{Collider, ContactModificationContext, PhysicsHooks};
use slotmap::SlotMap;

use crate::body::{decode_user_data, BodyKey, RigidBody};
use crate::collision_mesh::CollisionMesh;
use crate::convert::{from_vector, to_vector};
use crate::material::InteractionMatrix;
use crate::mesh_cache::MeshCache;
use crate::shapes::ChildKind;

bitflags! {
    /// Optional adjustments to contact generation
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ContactHacks: u32 {
        /// Log every material lookup that falls back to material 0
        const VERBOSE_CONTACTS = 1 << 0;
        /// Build static triangle meshes with internal edge correction
        const INTERNAL_EDGE = 1 << 1;
        /// Keep contact normals on the front side of dynamic triangle meshes
        const ONE_WAY_GIMPACT = 1 << 2;
    }
}

/// Maps collider hits back to bodies and materials
#[derive(Clone, Copy)]
pub(crate) struct MaterialLookup<'a> {
    pub meshes: &'a MeshCache,
    pub bodies: &'a SlotMap<BodyKey, RigidBody>,
    pub verbose: bool,
    pub anomalies: &'a AtomicUsize,
}

impl<'a> MaterialLookup<'a> {
    /// The mesh behind a collider, with the owning body and part
    pub fn mesh_of(&self, collider: &Collider) -> Option<(BodyKey, usize, &'a CollisionMesh)> {
        let (key, part) = decode_user_data(collider.user_data);
        let body = self.bodies.get(key)?;
        let mesh = self.meshes.get(body.mesh)?;
        Some((key, part, mesh))
    }

    /// Material of a collider, with `face` used for triangle meshes
    ///
    /// Lookups that do not fit the mesh tables count as anomalies and give
    /// material 0.
    pub fn material(&self, collider: &Collider, face: Option<u32>) -> (Option<BodyKey>, MaterialId) {
        let Some((key, part, mesh)) = self.mesh_of(collider) else {
            return (None, self.anomaly(format_args!("collider has no live body")));
        };
        match mesh.material_of(part, face) {
            Some(m) => (Some(key), m),
            None => (
                Some(key),
                self.anomaly(format_args!(
                    "{}: no material for part {} face {:?} ({} parts, {} faces)",
                    mesh.name(),
                    part,
                    face,
                    mesh.children().len(),
                    mesh.face_count()
                )),
            ),
        }
    }

    fn anomaly(&self, what: std::fmt::Arguments<'_>) -> MaterialId {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
        if self.verbose {
            log::warn!("Contact lookup fell back to material 0: {}", what);
        }
        0
    }
}

/// Whether a contact normal reaches a dynamic triangle mesh from behind
///
/// `normal` runs from collider 1 to collider 2; `front1` and `front2` are the
/// front-face normals of the touched faces on sides that are dynamic
/// triangle meshes.
pub(crate) fn one_way_flip(normal: Vector3, front1: Option<Vector3>, front2: Option<Vector3>) -> bool {
    match (front1, front2) {
        (Some(front), _) => normal.dot(front) < 0.0,
        (None, Some(front)) => normal.dot(front) > 0.0,
        (None, None) => false,
    }
}

/// Solver hook writing per-material friction and restitution
pub(crate) struct ContactResolver<'a> {
    pub lookup: MaterialLookup<'a>,
    pub materials: &'a MaterialDb,
    pub interactions: &'a InteractionMatrix,
    pub hacks: ContactHacks,
}

impl<'a> ContactResolver<'a> {
    fn group(&self, material: MaterialId) -> u32 {
        self.materials.get(material).map(|m| m.interaction_group).unwrap_or(0)
    }

    /// Front-face normal of a dynamic triangle mesh face, in world space
    fn face_normal(&self, collider: &Collider, face: u32) -> Option<Vector3> {
        let (_, part, mesh) = self.lookup.mesh_of(collider)?;
        if mesh.children().get(part)?.kind != ChildKind::DynamicTriMesh {
            return None;
        }
        let [a, b, c] = *mesh.face(face as usize)?;
        let local = (b - a).cross(c - a);
        let world = collider.position().rotation * to_vector(local);
        Some(from_vector(&world))
    }
}

impl<'a> PhysicsHooks for ContactResolver<'a> {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let c1 = &context.colliders[context.collider1];
        let c2 = &context.colliders[context.collider2];
        let face1 = context.manifold.subshape1;
        let face2 = context.manifold.subshape2;

        let (_, m1) = self.lookup.material(c1, Some(face1));
        let (_, m2) = self.lookup.material(c2, Some(face2));
        let (friction, restitution) =
            self.interactions.get_friction_restitution(self.group(m1), self.group(m2));
        for contact in context.solver_contacts.iter_mut() {
            contact.friction = friction;
            contact.restitution = restitution;
        }

        if self.hacks.contains(ContactHacks::ONE_WAY_GIMPACT) {
            let n = from_vector(context.normal);
            if one_way_flip(n, self.face_normal(c1, face1), self.face_normal(c2, face2)) {
                *context.normal = -*context.normal;
            }
        }
    }
}
