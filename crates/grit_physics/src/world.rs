//! Physics world and simulation

use std::sync::atomic::{AtomicUsize, Ordering};

use grit_col::{MaterialDb, MaterialId};
use grit_math::{Quaternion, Transform, Vector3};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};

use crate::body::{Body, BodyKey, BodyMut, RigidBody};
use crate::callbacks::{
    collision_slot, stabilise_slot, step_slot, update_slot, BodyCallbacks, CallbackResult, CollisionEvent,
};
use crate::collision_mesh::CollisionMesh;
use crate::contact::{ContactHacks, ContactResolver, MaterialLookup};
use crate::convert::{from_point, from_vector};
use crate::dynamics::DynamicsWorld;
use crate::error::{MeshError, PhysicsError};
use crate::material::InteractionMatrix;
use crate::mesh_cache::{MeshCache, MeshKey};
use crate::source::ResourceSource;

/// Configuration for the physics simulation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Length of one fixed sub-step in seconds
    pub step_size: f32,
    /// Most sub-steps a single pump may run
    pub max_steps: u32,
    /// Gravity acceleration (Z-up, negative = down)
    pub gravity: [f32; 3],
    /// Log material lookups that fall back to material 0
    pub verbose_contacts: bool,
    /// Smooth contacts across the internal edges of static triangle meshes
    pub internal_edge_fix: bool,
    /// Keep contacts on the front side of dynamic triangle meshes
    pub one_way_gimpact: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            step_size: 1.0 / 200.0,
            max_steps: 20,
            gravity: [0.0, 0.0, -9.807],
            verbose_contacts: false,
            internal_edge_fix: true,
            one_way_gimpact: true,
        }
    }
}

impl PhysicsConfig {
    /// The contact adjustments this configuration enables
    pub fn hacks(&self) -> ContactHacks {
        let mut hacks = ContactHacks::empty();
        hacks.set(ContactHacks::VERBOSE_CONTACTS, self.verbose_contacts);
        hacks.set(ContactHacks::INTERNAL_EDGE, self.internal_edge_fix);
        hacks.set(ContactHacks::ONE_WAY_GIMPACT, self.one_way_gimpact);
        hacks
    }
}

/// The physics world containing all rigid bodies
///
/// Bodies are created from named collision resources and must be retired
/// with [`destroy_body`](Self::destroy_body).
pub struct PhysicsWorld {
    pub(crate) dynamics: DynamicsWorld,
    pub(crate) meshes: MeshCache,
    /// All rigid bodies in the world (using generational keys)
    pub(crate) bodies: SlotMap<BodyKey, RigidBody>,
    callbacks: SecondaryMap<BodyKey, BodyCallbacks>,
    materials: MaterialDb,
    interactions: InteractionMatrix,
    source: Box<dyn ResourceSource>,
    config: PhysicsConfig,
    hacks: ContactHacks,
    anomalies: AtomicUsize,
    graphics_dirty: bool,
    gravity_dirty: bool,
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig, materials: MaterialDb, source: impl ResourceSource + 'static) -> Self {
        let [x, y, z] = config.gravity;
        Self {
            dynamics: DynamicsWorld::new(config.step_size, Vector3::new(x, y, z)),
            meshes: MeshCache::new(),
            bodies: SlotMap::with_key(),
            callbacks: SecondaryMap::new(),
            materials,
            interactions: InteractionMatrix::default(),
            source: Box::new(source),
            hacks: config.hacks(),
            config,
            anomalies: AtomicUsize::new(0),
            graphics_dirty: false,
            gravity_dirty: false,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn materials(&self) -> &MaterialDb {
        &self.materials
    }

    pub fn interactions(&self) -> &InteractionMatrix {
        &self.interactions
    }

    pub fn set_interactions(&mut self, interactions: InteractionMatrix) {
        self.interactions = interactions;
    }

    pub fn hacks(&self) -> ContactHacks {
        self.hacks
    }

    /// Change the contact adjustments
    ///
    /// `INTERNAL_EDGE` only affects meshes loaded or reloaded afterwards.
    pub fn set_hacks(&mut self, hacks: ContactHacks) {
        self.hacks = hacks;
    }

    /// How many contact or query material lookups fell back to material 0
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.load(Ordering::Relaxed)
    }

    /// Friction and restitution between two materials
    pub fn friction_restitution(&self, a: MaterialId, b: MaterialId) -> (f32, f32) {
        let group = |m: MaterialId| self.materials.get(m).map(|m| m.interaction_group).unwrap_or(0);
        self.interactions.get_friction_restitution(group(a), group(b))
    }

    pub(crate) fn lookup(&self) -> MaterialLookup<'_> {
        MaterialLookup {
            meshes: &self.meshes,
            bodies: &self.bodies,
            verbose: self.hacks.contains(ContactHacks::VERBOSE_CONTACTS),
            anomalies: &self.anomalies,
        }
    }

    // ---- gravity ----

    pub fn gravity(&self) -> Vector3 {
        self.dynamics.gravity()
    }

    /// Change gravity; sleeping bodies are woken at the next pump
    pub fn set_gravity(&mut self, gravity: Vector3) {
        self.dynamics.set_gravity(gravity);
        self.gravity_dirty = true;
    }

    // ---- meshes ----

    pub fn meshes(&self) -> &MeshCache {
        &self.meshes
    }

    pub fn mesh(&self, name: &str) -> Option<&CollisionMesh> {
        self.meshes.find(name).and_then(|k| self.meshes.get(k))
    }

    /// Load a mesh from the resource source unless it is already loaded
    pub fn load_mesh(&mut self, name: &str) -> Result<MeshKey, MeshError> {
        let internal_edges = self.hacks.contains(ContactHacks::INTERNAL_EDGE);
        self.meshes.get_or_load(name, &*self.source, &self.materials, internal_edges)
    }

    /// Register a mesh built outside the resource source
    pub fn add_mesh(&mut self, mesh: CollisionMesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    /// Rebuild a mesh from its resource and rebuild every body using it
    ///
    /// Bodies keep their pose, motion and part overrides. If the resource no
    /// longer loads, the mesh stays unloaded and its bodies stay out of the
    /// simulation until a later reload succeeds.
    pub fn reload_mesh(&mut self, name: &str) -> Result<(), PhysicsError> {
        let key = self.meshes.find(name).ok_or_else(|| PhysicsError::UnknownMesh(name.to_string()))?;
        let internal_edges = self.hacks.contains(ContactHacks::INTERNAL_EDGE);
        let mesh = self.meshes.get_mut(key).ok_or_else(|| PhysicsError::UnknownMesh(name.to_string()))?;
        let users = mesh.users().to_vec();

        for &user in &users {
            if let Some(body) = self.bodies.get_mut(user) {
                body.unbind(&mut self.dynamics);
            }
        }

        mesh.unload();
        if let Err(e) = mesh.load(&*self.source, &self.materials, internal_edges) {
            log::error!("Reloading {} failed, {} bodies left detached: {}", name, users.len(), e);
            return Err(e.into());
        }

        for &user in &users {
            if let Some(body) = self.bodies.get_mut(user) {
                if !body.quarantined {
                    body.bind(user, mesh, &mut self.dynamics);
                }
            }
        }
        log::info!("Reloaded collision mesh {} ({} bodies rebuilt)", name, users.len());
        Ok(())
    }

    /// Drop a mesh that no body uses
    pub fn release_mesh(&mut self, name: &str) -> Result<(), PhysicsError> {
        let key = self.meshes.find(name).ok_or_else(|| PhysicsError::UnknownMesh(name.to_string()))?;
        self.meshes.release(key).map(|_| ())
    }

    // ---- bodies ----

    /// Create a body from a named collision resource and add it to the world
    pub fn create_body(&mut self, mesh_name: &str, pose: Transform) -> Result<BodyKey, PhysicsError> {
        let mesh_key = self.load_mesh(mesh_name)?;
        let mesh = self
            .meshes
            .get_mut(mesh_key)
            .ok_or_else(|| PhysicsError::UnknownMesh(mesh_name.to_string()))?;
        if !mesh.is_loaded() {
            return Err(PhysicsError::UnknownMesh(mesh_name.to_string()));
        }

        let key = self
            .bodies
            .insert(RigidBody::new(mesh_key, mesh_name, mesh.children().len(), pose));
        self.callbacks.insert(key, BodyCallbacks::default());
        mesh.register_user(key);
        if let Some(body) = self.bodies.get_mut(key) {
            body.bind(key, mesh, &mut self.dynamics);
        }
        log::debug!("Created body {:?} from {}", key, mesh_name);
        Ok(key)
    }

    /// Remove a body from the world for good
    pub fn destroy_body(&mut self, key: BodyKey) -> Result<(), PhysicsError> {
        let mut body = self.bodies.remove(key).ok_or(PhysicsError::StaleBody)?;
        body.unbind(&mut self.dynamics);
        self.callbacks.remove(key);
        if let Some(mesh) = self.meshes.get_mut(body.mesh) {
            mesh.unregister_user(key);
        }
        Ok(())
    }

    pub fn body(&self, key: BodyKey) -> Option<Body<'_>> {
        let body = self.bodies.get(key)?;
        let mesh = self.meshes.get(body.mesh)?;
        Some(Body { key, body, mesh, dynamics: &self.dynamics })
    }

    pub fn body_mut(&mut self, key: BodyKey) -> Option<BodyMut<'_>> {
        let body = self.bodies.get_mut(key)?;
        let mesh = self.meshes.get(body.mesh)?;
        Some(BodyMut { key, body, mesh, dynamics: &mut self.dynamics })
    }

    /// Get the number of bodies in the world
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over all body keys
    pub fn body_keys(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies.keys()
    }

    fn is_bound(&self, key: BodyKey) -> bool {
        self.bodies.get(key).is_some_and(|b| b.is_bound())
    }

    // ---- callbacks ----

    pub fn callbacks(&self, key: BodyKey) -> Option<&BodyCallbacks> {
        self.callbacks.get(key)
    }

    fn callbacks_mut(&mut self, key: BodyKey) -> Result<&mut BodyCallbacks, PhysicsError> {
        self.callbacks.get_mut(key).ok_or(PhysicsError::StaleBody)
    }

    pub fn set_step_callback<F>(&mut self, key: BodyKey, f: F) -> Result<(), PhysicsError>
    where
        F: FnMut(&mut PhysicsWorld, BodyKey, f32) -> CallbackResult + 'static,
    {
        self.callbacks_mut(key)?.step = Some(Box::new(f));
        Ok(())
    }

    pub fn set_stabilise_callback<F>(&mut self, key: BodyKey, f: F) -> Result<(), PhysicsError>
    where
        F: FnMut(&mut PhysicsWorld, BodyKey, f32) -> CallbackResult + 'static,
    {
        self.callbacks_mut(key)?.stabilise = Some(Box::new(f));
        Ok(())
    }

    pub fn set_update_callback<F>(&mut self, key: BodyKey, f: F) -> Result<(), PhysicsError>
    where
        F: FnMut(&mut PhysicsWorld, BodyKey, Vector3, Quaternion) -> CallbackResult + 'static,
    {
        self.callbacks_mut(key)?.update = Some(Box::new(f));
        Ok(())
    }

    pub fn set_collision_callback<F>(&mut self, key: BodyKey, f: F) -> Result<(), PhysicsError>
    where
        F: FnMut(&mut PhysicsWorld, BodyKey, &CollisionEvent) -> CallbackResult + 'static,
    {
        self.callbacks_mut(key)?.collision = Some(Box::new(f));
        Ok(())
    }

    pub fn clear_callbacks(&mut self, key: BodyKey) -> Result<(), PhysicsError> {
        *self.callbacks_mut(key)? = BodyCallbacks::default();
        Ok(())
    }

    /// Run one handler of a body
    ///
    /// The handler is taken out of its slot for the call so it may freely
    /// use the world. It goes back afterwards unless it failed, the body was
    /// destroyed, or a new handler was installed meanwhile.
    fn invoke<C>(
        &mut self,
        key: BodyKey,
        slot: fn(&mut BodyCallbacks) -> &mut Option<C>,
        what: &str,
        call: impl FnOnce(&mut C, &mut PhysicsWorld) -> CallbackResult,
    ) {
        let Some(mut handler) = self.callbacks.get_mut(key).and_then(|c| slot(c).take()) else {
            return;
        };
        match call(&mut handler, self) {
            Ok(()) => {
                if let Some(c) = self.callbacks.get_mut(key) {
                    let s = slot(c);
                    if s.is_none() {
                        *s = Some(handler);
                    }
                }
            }
            Err(e) => log::warn!("{} callback of body {:?} failed and was unregistered: {}", what, key, e),
        }
    }

    // ---- simulation ----

    pub fn step_size(&self) -> f32 {
        self.config.step_size
    }

    /// Run as many fixed sub-steps as fit in `elapsed`, up to `max_steps`
    ///
    /// Returns the number of sub-steps run. Time left over is dropped.
    pub fn pump(&mut self, elapsed: f32) -> usize {
        if self.gravity_dirty {
            self.dynamics.wake_all();
        }
        let step_size = self.config.step_size;
        let steps = step_count(elapsed, step_size, self.config.max_steps);
        for _ in 0..steps {
            self.sub_step(step_size);
        }
        self.end();
        steps
    }

    fn sub_step(&mut self, dt: f32) {
        let resolver = ContactResolver {
            lookup: MaterialLookup {
                meshes: &self.meshes,
                bodies: &self.bodies,
                verbose: self.hacks.contains(ContactHacks::VERBOSE_CONTACTS),
                anomalies: &self.anomalies,
            },
            materials: &self.materials,
            interactions: &self.interactions,
            hacks: self.hacks,
        };
        self.dynamics.step(&resolver);
        self.graphics_dirty = true;

        for (key, event) in self.collision_events() {
            self.invoke(key, collision_slot, "collision", |cb, world| cb(world, key, &event));
        }

        let keys: Vec<BodyKey> = self.bodies.keys().collect();
        for &key in &keys {
            if !self.is_bound(key) || self.quarantine_if_non_finite(key) {
                continue;
            }
            self.invoke(key, step_slot, "step", |cb, world| cb(world, key, dt));
        }
        for &key in &keys {
            if self.is_bound(key) {
                self.invoke(key, stabilise_slot, "stabilise", |cb, world| cb(world, key, dt));
            }
        }
    }

    /// Take a body with a non-finite pose or motion out of the simulation
    fn quarantine_if_non_finite(&mut self, key: BodyKey) -> bool {
        let finite = match self.body(key) {
            Some(b) => b.transform().is_finite() && b.linear_velocity().is_finite() && b.angular_velocity().is_finite(),
            None => return false,
        };
        if finite {
            return false;
        }
        if let Some(body) = self.bodies.get_mut(key) {
            log::error!("Body {:?} ({}) went non-finite and was removed from the simulation", key, body.mesh_name);
            body.unbind(&mut self.dynamics);
            body.quarantined = true;
        }
        true
    }

    /// One event per manifold for every body with a collision handler
    fn collision_events(&self) -> Vec<(BodyKey, CollisionEvent)> {
        let wants = |k: Option<BodyKey>| -> Option<BodyKey> {
            k.filter(|&k| self.callbacks.get(k).is_some_and(|c| c.collision.is_some()))
        };
        let lookup = self.lookup();
        let colliders = &self.dynamics.colliders;
        let mut events = Vec::new();

        for pair in self.dynamics.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let (Some(c1), Some(c2)) = (colliders.get(pair.collider1), colliders.get(pair.collider2)) else {
                continue;
            };
            for manifold in &pair.manifolds {
                let Some(deepest) = manifold.points.iter().min_by(|a, b| a.dist.total_cmp(&b.dist)) else {
                    continue;
                };
                let (k1, m1) = lookup.material(c1, Some(manifold.subshape1));
                let (k2, m2) = lookup.material(c2, Some(manifold.subshape2));
                let impulse: f32 = manifold.points.iter().map(|p| p.data.impulse).sum();
                let normal = from_vector(&manifold.data.normal);

                if let Some(k) = wants(k1) {
                    let point = from_point(&(c1.position() * deepest.local_p1));
                    events.push((
                        k,
                        CollisionEvent { other: k2, impulse, point, normal, material: m1, other_material: m2 },
                    ));
                }
                if let Some(k) = wants(k2) {
                    let point = from_point(&(c2.position() * deepest.local_p2));
                    events.push((
                        k,
                        CollisionEvent { other: k1, impulse, point, normal: -normal, material: m2, other_material: m1 },
                    ));
                }
            }
        }
        events
    }

    /// Clear applied forces and the pending gravity change
    pub fn end(&mut self) {
        self.dynamics.reset_forces();
        self.gravity_dirty = false;
    }

    /// Hand every body's current pose to its update handler
    ///
    /// Does nothing unless a sub-step ran since the last call.
    pub fn update_graphics(&mut self) {
        if !self.graphics_dirty {
            return;
        }
        self.graphics_dirty = false;
        let keys: Vec<BodyKey> = self.bodies.keys().collect();
        for key in keys {
            let Some(pose) = self.body(key).filter(|b| b.is_bound()).map(|b| b.transform()) else {
                continue;
            };
            self.invoke(key, update_slot, "update", |cb, world| cb(world, key, pose.position, pose.orientation));
        }
    }
}

/// Whole sub-steps in `elapsed`, capped at `max_steps`
///
/// The tolerance keeps an exact multiple of the step from losing its last
/// step to rounding.
fn step_count(elapsed: f32, step_size: f32, max_steps: u32) -> usize {
    if elapsed.is_nan() || step_size.is_nan() || elapsed <= 0.0 || step_size <= 0.0 {
        return 0;
    }
    let whole = (f64::from(elapsed) / f64::from(step_size) + 1e-4).floor();
    whole.min(f64::from(max_steps)) as usize
}

impl Drop for PhysicsWorld {
    fn drop(&mut self) {
        if !self.bodies.is_empty() {
            log::warn!("Physics world dropped with {} bodies never destroyed", self.bodies.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::cell::RefCell;
    use std::rc::Rc;

    const BALL: &str = r#"TCOL1.0 attributes { mass 1; } compound { sphere { material "Frictionless"; radius 0.5; } }"#;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(
            PhysicsConfig::default(),
            MaterialDb::new(),
            MemorySource::new().with("ball.tcol", BALL),
        )
    }

    #[test]
    fn test_physics_config_default() {
        let config = PhysicsConfig::default();
        assert_eq!(config.step_size, 1.0 / 200.0);
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.gravity, [0.0, 0.0, -9.807]);
        assert_eq!(config.hacks(), ContactHacks::INTERNAL_EDGE | ContactHacks::ONE_WAY_GIMPACT);
    }

    #[test]
    fn test_pump_counts_steps() {
        let mut w = world();
        let step = w.step_size();
        assert_eq!(w.pump(0.0), 0);
        assert_eq!(w.pump(step * 0.5), 0);
        assert_eq!(w.pump(step * 3.5), 3);
        assert_eq!(w.pump(step * 100.5), 20);
    }

    #[test]
    fn test_pump_runs_every_whole_step() {
        let mut w = world();
        let step = w.step_size();
        let max = w.config().max_steps as usize;
        for k in 1..=max {
            assert_eq!(w.pump(k as f32 * step), k, "pump of {} steps", k);
        }
        assert_eq!(w.pump((max + 5) as f32 * step), max);
    }

    #[test]
    fn test_step_count_edges() {
        assert_eq!(step_count(-1.0, 0.005, 20), 0);
        assert_eq!(step_count(f32::NAN, 0.005, 20), 0);
        assert_eq!(step_count(1.0, 0.0, 20), 0);
        assert_eq!(step_count(0.0049, 0.005, 20), 0);
        assert_eq!(step_count(1.0 / 60.0, 1.0 / 60.0, 20), 1);
        assert_eq!(step_count(f32::INFINITY, 0.005, 20), 20);
    }

    #[test]
    fn test_create_and_destroy_body() {
        let mut w = world();
        let key = w.create_body("ball.tcol", Transform::from_position(Vector3::new(0.0, 0.0, 5.0))).unwrap();
        assert_eq!(w.body_count(), 1);
        assert!(w.body(key).unwrap().is_bound());
        assert_eq!(w.mesh("ball.tcol").unwrap().users(), &[key]);

        w.destroy_body(key).unwrap();
        assert!(w.body(key).is_none());
        assert!(matches!(w.destroy_body(key), Err(PhysicsError::StaleBody)));
        assert!(w.mesh("ball.tcol").unwrap().users().is_empty());
        w.release_mesh("ball.tcol").unwrap();
        assert!(w.mesh("ball.tcol").is_none());
    }

    #[test]
    fn test_missing_resource() {
        let mut w = world();
        assert!(matches!(
            w.create_body("nope.tcol", Transform::IDENTITY),
            Err(PhysicsError::Mesh(MeshError::NotFound(_)))
        ));
        assert_eq!(w.body_count(), 0);
    }

    #[test]
    fn test_body_falls() {
        let mut w = world();
        let key = w.create_body("ball.tcol", Transform::from_position(Vector3::new(0.0, 0.0, 10.0))).unwrap();
        for _ in 0..10 {
            w.pump(0.1 + w.step_size() * 0.5);
        }
        let z = w.body(key).unwrap().position().z;
        assert!(z < 5.5 && z > 4.5, "z = {}", z);
        w.destroy_body(key).unwrap();
    }

    #[test]
    fn test_step_before_stabilise() {
        let mut w = world();
        let a = w.create_body("ball.tcol", Transform::IDENTITY).unwrap();
        let b = w.create_body("ball.tcol", Transform::from_position(Vector3::new(5.0, 0.0, 0.0))).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for key in [a, b] {
            let l = log.clone();
            w.set_step_callback(key, move |_, k, _| {
                l.borrow_mut().push(("step", k));
                Ok(())
            })
            .unwrap();
            let l = log.clone();
            w.set_stabilise_callback(key, move |_, k, _| {
                l.borrow_mut().push(("stabilise", k));
                Ok(())
            })
            .unwrap();
        }
        w.pump(w.step_size() * 1.5);
        let log = log.borrow();
        assert_eq!(log.len(), 4);
        assert!(log[..2].iter().all(|(what, _)| *what == "step"));
        assert!(log[2..].iter().all(|(what, _)| *what == "stabilise"));
        drop(log);
        w.destroy_body(a).unwrap();
        w.destroy_body(b).unwrap();
    }

    #[test]
    fn test_failing_callback_is_unregistered() {
        let mut w = world();
        let key = w.create_body("ball.tcol", Transform::IDENTITY).unwrap();
        let calls = Rc::new(RefCell::new(0));
        let c = calls.clone();
        w.set_step_callback(key, move |_, _, _| {
            *c.borrow_mut() += 1;
            Err("scripted failure".into())
        })
        .unwrap();
        let ok = Rc::new(RefCell::new(0));
        let o = ok.clone();
        w.set_stabilise_callback(key, move |_, _, _| {
            *o.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

        w.pump(w.step_size() * 3.5);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(*ok.borrow(), 3);
        let cbs = w.callbacks(key).unwrap();
        assert!(cbs.step.is_none());
        assert!(cbs.stabilise.is_some());
        w.destroy_body(key).unwrap();
    }

    #[test]
    fn test_callback_may_destroy_its_body() {
        let mut w = world();
        let key = w.create_body("ball.tcol", Transform::IDENTITY).unwrap();
        w.set_step_callback(key, |world, k, _| {
            world.destroy_body(k)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(w.pump(w.step_size() * 2.5), 2);
        assert_eq!(w.body_count(), 0);
    }

    #[test]
    fn test_update_graphics_only_after_step() {
        let mut w = world();
        let key = w.create_body("ball.tcol", Transform::from_position(Vector3::new(1.0, 2.0, 3.0))).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        w.set_update_callback(key, move |_, _, pos, _| {
            s.borrow_mut().push(pos);
            Ok(())
        })
        .unwrap();
        w.update_graphics();
        assert!(seen.borrow().is_empty());
        w.pump(w.step_size() * 1.5);
        w.update_graphics();
        w.update_graphics();
        assert_eq!(seen.borrow().len(), 1);
        assert!((seen.borrow()[0].x - 1.0).abs() < 1e-4);
        w.destroy_body(key).unwrap();
    }

    #[test]
    fn test_non_finite_body_is_quarantined() {
        let mut w = world();
        let key = w.create_body("ball.tcol", Transform::IDENTITY).unwrap();
        w.body_mut(key).unwrap().set_position(Vector3::new(f32::NAN, 0.0, 0.0));
        assert!(w.quarantine_if_non_finite(key));
        let body = w.body(key).unwrap();
        assert!(!body.is_bound());
        assert!(w.bodies[key].is_quarantined());
        // the key stays valid until destroyed
        w.destroy_body(key).unwrap();
    }

    #[test]
    fn test_set_gravity() {
        let mut w = world();
        w.set_gravity(Vector3::new(0.0, 0.0, 9.807));
        assert_eq!(w.gravity(), Vector3::new(0.0, 0.0, 9.807));
        let key = w.create_body("ball.tcol", Transform::IDENTITY).unwrap();
        for _ in 0..5 {
            w.pump(0.1 + w.step_size() * 0.5);
        }
        assert!(w.body(key).unwrap().position().z > 0.5);
        w.destroy_body(key).unwrap();
    }

    #[test]
    fn test_element_out_of_range() {
        let mut w = world();
        let key = w.create_body("ball.tcol", Transform::IDENTITY).unwrap();
        let mut body = w.body_mut(key).unwrap();
        assert!(matches!(
            body.set_element_enabled(1, false),
            Err(PhysicsError::ElementOutOfRange { index: 1, count: 1 })
        ));
        w.destroy_body(key).unwrap();
    }
}
