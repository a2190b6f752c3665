//! Rigid bodies built from collision meshes

use grit_math::{Quaternion, Transform, Vector3};
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};
use slotmap::{new_key_type, Key, KeyData};

use crate::collision_mesh::CollisionMesh;
use crate::convert::{from_isometry, from_vector, to_isometry, to_point, to_vector};
use crate::dynamics::DynamicsWorld;
use crate::error::PhysicsError;
use crate::mesh_cache::MeshKey;

// Define generational key type for rigid bodies
new_key_type! {
    /// Key to a rigid body in the physics world
    ///
    /// Uses generational indexing, so the key of a destroyed body never
    /// resolves to a body created later in the same slot.
    pub struct BodyKey;
}

/// Pack a body key and part index into collider user data
pub(crate) fn encode_user_data(key: BodyKey, part: usize) -> u128 {
    ((key.data().as_ffi() as u128) << 32) | (part as u32 as u128)
}

pub(crate) fn decode_user_data(data: u128) -> (BodyKey, usize) {
    let key = BodyKey::from(KeyData::from_ffi((data >> 32) as u64));
    (key, (data & 0xffff_ffff) as usize)
}

/// Per-instance overrides for one part of the mesh
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartState {
    pub enabled: bool,
    /// Applied on top of the part's authored placement
    pub offset: Transform,
}

impl Default for PartState {
    fn default() -> Self {
        Self { enabled: true, offset: Transform::IDENTITY }
    }
}

/// Pose and motion kept while a body is out of the simulation
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Snapshot {
    pub pose: Transform,
    pub linear_velocity: Vector3,
    pub angular_velocity: Vector3,
}

#[derive(Debug)]
pub(crate) enum BodyState {
    /// Simulated. `colliders` is index-aligned with the mesh parts and
    /// holds `None` for disabled parts.
    Bound {
        handle: RigidBodyHandle,
        colliders: Vec<Option<ColliderHandle>>,
    },
    Detached(Snapshot),
}

/// A simulated instance of a [`CollisionMesh`]
#[derive(Debug)]
pub struct RigidBody {
    pub(crate) mesh: MeshKey,
    pub(crate) mesh_name: String,
    pub(crate) parts: Vec<PartState>,
    pub(crate) state: BodyState,
    /// Removed after its pose went non-finite; never re-added
    pub(crate) quarantined: bool,
}

impl RigidBody {
    pub(crate) fn new(mesh: MeshKey, mesh_name: &str, part_count: usize, pose: Transform) -> Self {
        Self {
            mesh,
            mesh_name: mesh_name.to_string(),
            parts: vec![PartState::default(); part_count],
            state: BodyState::Detached(Snapshot {
                pose,
                linear_velocity: Vector3::ZERO,
                angular_velocity: Vector3::ZERO,
            }),
            quarantined: false,
        }
    }

    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, BodyState::Bound { .. })
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantined
    }

    pub fn parts(&self) -> &[PartState] {
        &self.parts
    }

    pub(crate) fn handle(&self) -> Option<RigidBodyHandle> {
        match self.state {
            BodyState::Bound { handle, .. } => Some(handle),
            BodyState::Detached(_) => None,
        }
    }

    fn check_part(&self, index: usize) -> Result<(), PhysicsError> {
        if index < self.parts.len() {
            Ok(())
        } else {
            Err(PhysicsError::ElementOutOfRange { index, count: self.parts.len() })
        }
    }

    /// Create the simulated body and one collider per enabled part
    pub(crate) fn bind(&mut self, key: BodyKey, mesh: &CollisionMesh, dynamics: &mut DynamicsWorld) {
        let snapshot = match self.state {
            BodyState::Bound { .. } => return,
            BodyState::Detached(s) => s,
        };
        // a reload may change the part count; overrides are kept by index
        self.parts.resize(mesh.children().len(), PartState::default());

        let handle = dynamics.insert_body(key, mesh.properties(), &snapshot);
        let colliders = self
            .parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                part.enabled
                    .then(|| dynamics.insert_collider(key, i, &mesh.children()[i], &part.offset, handle))
            })
            .collect();
        self.state = BodyState::Bound { handle, colliders };
    }

    /// Remove the simulated body, remembering its pose and motion
    pub(crate) fn unbind(&mut self, dynamics: &mut DynamicsWorld) {
        if let BodyState::Bound { handle, .. } = self.state {
            let snapshot = dynamics.remove_body(handle).unwrap_or(Snapshot {
                pose: Transform::IDENTITY,
                linear_velocity: Vector3::ZERO,
                angular_velocity: Vector3::ZERO,
            });
            self.state = BodyState::Detached(snapshot);
        }
    }
}

/// Read-only view of a body
pub struct Body<'a> {
    pub(crate) key: BodyKey,
    pub(crate) body: &'a RigidBody,
    pub(crate) mesh: &'a CollisionMesh,
    pub(crate) dynamics: &'a DynamicsWorld,
}

impl<'a> Body<'a> {
    pub fn key(&self) -> BodyKey {
        self.key
    }

    pub fn mesh(&self) -> &'a CollisionMesh {
        self.mesh
    }

    pub fn is_bound(&self) -> bool {
        self.body.is_bound()
    }

    pub fn is_static(&self) -> bool {
        self.mesh.is_static()
    }

    pub fn mass(&self) -> f32 {
        self.mesh.properties().mass
    }

    pub fn part_count(&self) -> usize {
        self.body.parts.len()
    }

    pub fn part(&self, index: usize) -> Option<&'a PartState> {
        self.body.parts.get(index)
    }

    pub fn transform(&self) -> Transform {
        match &self.body.state {
            BodyState::Bound { handle, .. } => self
                .dynamics
                .bodies
                .get(*handle)
                .map(|rb| from_isometry(rb.position()))
                .unwrap_or(Transform::IDENTITY),
            BodyState::Detached(s) => s.pose,
        }
    }

    pub fn position(&self) -> Vector3 {
        self.transform().position
    }

    pub fn orientation(&self) -> Quaternion {
        self.transform().orientation
    }

    pub fn linear_velocity(&self) -> Vector3 {
        match &self.body.state {
            BodyState::Bound { handle, .. } => self
                .dynamics
                .bodies
                .get(*handle)
                .map(|rb| from_vector(rb.linvel()))
                .unwrap_or(Vector3::ZERO),
            BodyState::Detached(s) => s.linear_velocity,
        }
    }

    pub fn angular_velocity(&self) -> Vector3 {
        match &self.body.state {
            BodyState::Bound { handle, .. } => self
                .dynamics
                .bodies
                .get(*handle)
                .map(|rb| from_vector(rb.angvel()))
                .unwrap_or(Vector3::ZERO),
            BodyState::Detached(s) => s.angular_velocity,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.body
            .handle()
            .and_then(|h| self.dynamics.bodies.get(h))
            .is_some_and(|rb| rb.is_sleeping())
    }

    /// Bodies this one currently has active contacts with
    pub fn contacts(&self) -> Vec<BodyKey> {
        let BodyState::Bound { colliders, .. } = &self.body.state else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for &h in colliders.iter().flatten() {
            for pair in self.dynamics.narrow_phase.contact_pairs_with(h) {
                if !pair.has_any_active_contact {
                    continue;
                }
                let other = if pair.collider1 == h { pair.collider2 } else { pair.collider1 };
                if let Some(c) = self.dynamics.colliders.get(other) {
                    let (key, _) = decode_user_data(c.user_data);
                    if key != self.key && !out.contains(&key) {
                        out.push(key);
                    }
                }
            }
        }
        out
    }
}

/// Mutable view of a body
pub struct BodyMut<'a> {
    pub(crate) key: BodyKey,
    pub(crate) body: &'a mut RigidBody,
    pub(crate) mesh: &'a CollisionMesh,
    pub(crate) dynamics: &'a mut DynamicsWorld,
}

impl<'a> BodyMut<'a> {
    pub fn key(&self) -> BodyKey {
        self.key
    }

    pub fn view(&self) -> Body<'_> {
        Body { key: self.key, body: &*self.body, mesh: self.mesh, dynamics: &*self.dynamics }
    }

    fn rapier_body(&mut self) -> Option<&mut rapier3d::prelude::RigidBody> {
        let handle = self.body.handle()?;
        self.dynamics.bodies.get_mut(handle)
    }

    fn snapshot_mut(&mut self) -> Option<&mut Snapshot> {
        match &mut self.body.state {
            BodyState::Detached(s) => Some(s),
            BodyState::Bound { .. } => None,
        }
    }

    pub fn set_transform(&mut self, pose: Transform) {
        if let Some(rb) = self.rapier_body() {
            rb.set_position(to_isometry(&pose), true);
        } else if let Some(s) = self.snapshot_mut() {
            s.pose = pose;
        }
    }

    pub fn set_position(&mut self, position: Vector3) {
        let orientation = self.view().orientation();
        self.set_transform(Transform::new(position, orientation));
    }

    pub fn set_orientation(&mut self, orientation: Quaternion) {
        let position = self.view().position();
        self.set_transform(Transform::new(position, orientation));
    }

    pub fn set_linear_velocity(&mut self, v: Vector3) {
        if let Some(rb) = self.rapier_body() {
            rb.set_linvel(to_vector(v), true);
        } else if let Some(s) = self.snapshot_mut() {
            s.linear_velocity = v;
        }
    }

    pub fn set_angular_velocity(&mut self, v: Vector3) {
        if let Some(rb) = self.rapier_body() {
            rb.set_angvel(to_vector(v), true);
        } else if let Some(s) = self.snapshot_mut() {
            s.angular_velocity = v;
        }
    }

    /// Add a world-space force at the centre of mass until the end of the frame
    pub fn apply_force(&mut self, force: Vector3) -> Result<(), PhysicsError> {
        let rb = self.rapier_body().ok_or(PhysicsError::Detached)?;
        rb.add_force(to_vector(force), true);
        Ok(())
    }

    /// Add a world-space force at a world-space point until the end of the frame
    pub fn apply_force_at(&mut self, force: Vector3, point: Vector3) -> Result<(), PhysicsError> {
        let rb = self.rapier_body().ok_or(PhysicsError::Detached)?;
        rb.add_force_at_point(to_vector(force), to_point(point), true);
        Ok(())
    }

    pub fn apply_torque(&mut self, torque: Vector3) -> Result<(), PhysicsError> {
        let rb = self.rapier_body().ok_or(PhysicsError::Detached)?;
        rb.add_torque(to_vector(torque), true);
        Ok(())
    }

    pub fn apply_impulse(&mut self, impulse: Vector3) -> Result<(), PhysicsError> {
        let rb = self.rapier_body().ok_or(PhysicsError::Detached)?;
        rb.apply_impulse(to_vector(impulse), true);
        Ok(())
    }

    pub fn apply_torque_impulse(&mut self, impulse: Vector3) -> Result<(), PhysicsError> {
        let rb = self.rapier_body().ok_or(PhysicsError::Detached)?;
        rb.apply_torque_impulse(to_vector(impulse), true);
        Ok(())
    }

    pub fn wake_up(&mut self) {
        if let Some(rb) = self.rapier_body() {
            rb.wake_up(true);
        }
    }

    /// Add or remove part `index` from the simulated body
    ///
    /// The setting survives detaching and mesh reloads.
    pub fn set_element_enabled(&mut self, index: usize, enabled: bool) -> Result<(), PhysicsError> {
        self.body.check_part(index)?;
        if self.body.parts[index].enabled == enabled {
            return Ok(());
        }
        self.body.parts[index].enabled = enabled;

        if let BodyState::Bound { handle, colliders } = &mut self.body.state {
            let slot = &mut colliders[index];
            if enabled {
                let child = &self.mesh.children()[index];
                let offset = self.body.parts[index].offset;
                *slot = Some(self.dynamics.insert_collider(self.key, index, child, &offset, *handle));
            } else if let Some(h) = slot.take() {
                // removing the collider drops its contact pairs with it
                self.dynamics.remove_collider(h);
            }
        }
        Ok(())
    }

    pub fn set_element_position_offset(&mut self, index: usize, position: Vector3) -> Result<(), PhysicsError> {
        self.body.check_part(index)?;
        let offset = self.body.parts[index].offset;
        self.set_element_offset(index, Transform::new(position, offset.orientation))
    }

    pub fn set_element_orientation_offset(&mut self, index: usize, orientation: Quaternion) -> Result<(), PhysicsError> {
        self.body.check_part(index)?;
        let offset = self.body.parts[index].offset;
        self.set_element_offset(index, Transform::new(offset.position, orientation))
    }

    /// Replace the extra transform of part `index`, applied now if enabled
    pub fn set_element_offset(&mut self, index: usize, offset: Transform) -> Result<(), PhysicsError> {
        self.body.check_part(index)?;
        self.body.parts[index].offset = offset;
        if let BodyState::Bound { colliders, .. } = &self.body.state {
            if let Some(h) = colliders[index] {
                let local = offset.compose(&self.mesh.children()[index].local);
                self.dynamics.set_collider_local(h, &local);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_user_data_round_trip() {
        let mut keys: SlotMap<BodyKey, ()> = SlotMap::with_key();
        let _ = keys.insert(());
        let a = keys.insert(());
        keys.remove(a);
        let b = keys.insert(());
        for (key, part) in [(a, 0usize), (b, 7), (b, 65_535)] {
            assert_eq!(decode_user_data(encode_user_data(key, part)), (key, part));
        }
        assert_ne!(encode_user_data(a, 1), encode_user_data(b, 1));
    }

    #[test]
    fn test_part_defaults() {
        let p = PartState::default();
        assert!(p.enabled);
        assert_eq!(p.offset, Transform::IDENTITY);
    }

    #[test]
    fn test_new_body_is_detached() {
        let body = RigidBody::new(MeshKey::default(), "m.tcol", 3, Transform::IDENTITY);
        assert!(!body.is_bound());
        assert_eq!(body.parts().len(), 3);
        assert!(body.handle().is_none());
        assert!(body.check_part(2).is_ok());
        assert!(matches!(body.check_part(3), Err(PhysicsError::ElementOutOfRange { index: 3, count: 3 })));
    }
}
