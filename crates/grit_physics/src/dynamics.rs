//! Thin owner of the rapier simulation sets
//!
//! Everything rapier needs to advance one fixed step lives here, so the
//! physics world can lend the sets out separately from its own tables.

use std::cell::{Cell, Ref, RefCell};

use grit_math::{Transform, Vector3};
use rapier3d::prelude::*;

use crate::body::{encode_user_data, BodyKey, Snapshot};
use crate::collision_mesh::MeshProperties;
use crate::convert::{from_isometry, from_vector, to_isometry, to_vector};
use crate::shapes::MasterChild;

pub struct DynamicsWorld {
    pub(crate) gravity: Vector<Real>,
    pub(crate) params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    pub(crate) islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    pub(crate) narrow_phase: NarrowPhase,
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    // refreshed by every step, and lazily when colliders change in between
    queries: RefCell<QueryPipeline>,
    queries_stale: Cell<bool>,
}

impl DynamicsWorld {
    pub fn new(step_size: f32, gravity: Vector3) -> Self {
        let mut params = IntegrationParameters::default();
        params.dt = step_size;
        Self {
            gravity: to_vector(gravity),
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            queries: RefCell::new(QueryPipeline::new()),
            queries_stale: Cell::new(false),
        }
    }

    /// Advance exactly one fixed step
    pub fn step(&mut self, hooks: &dyn PhysicsHooks) {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(self.queries.get_mut()),
            hooks,
            &(),
        );
        self.queries_stale.set(false);
    }

    /// Acceleration structure over the current collider placements
    pub(crate) fn queries(&self) -> Ref<'_, QueryPipeline> {
        if self.queries_stale.replace(false) {
            self.queries.borrow_mut().update(&self.colliders);
        }
        self.queries.borrow()
    }

    pub fn gravity(&self) -> Vector3 {
        from_vector(&self.gravity)
    }

    pub fn set_gravity(&mut self, gravity: Vector3) {
        self.gravity = to_vector(gravity);
    }

    pub fn step_size(&self) -> f32 {
        self.params.dt
    }

    pub(crate) fn insert_body(&mut self, key: BodyKey, props: &MeshProperties, snapshot: &Snapshot) -> RigidBodyHandle {
        let builder = if props.mass > 0.0 {
            RigidBodyBuilder::dynamic().additional_mass_properties(MassProperties::new(
                Point::origin(),
                props.mass,
                to_vector(props.inertia),
            ))
        } else {
            RigidBodyBuilder::fixed()
        };
        let mut body = builder
            .position(to_isometry(&snapshot.pose))
            .linvel(to_vector(snapshot.linear_velocity))
            .angvel(to_vector(snapshot.angular_velocity))
            .linear_damping(props.linear_damping)
            .angular_damping(props.angular_damping)
            .ccd_enabled(props.ccd_motion_threshold > 0.0)
            .user_data(encode_user_data(key, 0))
            .build();
        let activation = body.activation_mut();
        activation.normalized_linear_threshold = props.linear_sleep_threshold;
        activation.angular_threshold = props.angular_sleep_threshold;
        self.bodies.insert(body)
    }

    /// Remove a body and its colliders, returning where it was
    pub(crate) fn remove_body(&mut self, handle: RigidBodyHandle) -> Option<Snapshot> {
        let body = self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        )?;
        self.queries_stale.set(true);
        Some(Snapshot {
            pose: from_isometry(body.position()),
            linear_velocity: from_vector(body.linvel()),
            angular_velocity: from_vector(body.angvel()),
        })
    }

    /// Attach a collider for part `part` of a body
    ///
    /// Mass comes from the mesh attributes, so colliders carry no density.
    pub(crate) fn insert_collider(
        &mut self,
        key: BodyKey,
        part: usize,
        child: &MasterChild,
        offset: &Transform,
        parent: RigidBodyHandle,
    ) -> ColliderHandle {
        let collider = ColliderBuilder::new(child.shape.clone())
            .position(to_isometry(&offset.compose(&child.local)))
            .density(0.0)
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .user_data(encode_user_data(key, part))
            .build();
        self.queries_stale.set(true);
        self.colliders.insert_with_parent(collider, parent, &mut self.bodies)
    }

    pub(crate) fn remove_collider(&mut self, handle: ColliderHandle) {
        self.colliders.remove(handle, &mut self.islands, &mut self.bodies, true);
        self.queries_stale.set(true);
    }

    pub(crate) fn set_collider_local(&mut self, handle: ColliderHandle, local: &Transform) {
        self.queries_stale.set(true);
        if let Some(c) = self.colliders.get_mut(handle) {
            c.set_position_wrt_parent(to_isometry(local));
        }
        // the body may be asleep on the old shape placement
        if let Some(parent) = self.colliders.get(handle).and_then(|c| c.parent()) {
            if let Some(rb) = self.bodies.get_mut(parent) {
                rb.wake_up(true);
            }
        }
    }

    pub fn wake_all(&mut self) {
        for (_, rb) in self.bodies.iter_mut() {
            if rb.is_dynamic() {
                rb.wake_up(true);
            }
        }
    }

    /// Clear the forces and torques applied since the last frame
    pub fn reset_forces(&mut self) {
        for (_, rb) in self.bodies.iter_mut() {
            rb.reset_forces(false);
            rb.reset_torques(false);
        }
    }
}
