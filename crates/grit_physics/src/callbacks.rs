//! Host callbacks and query results
//!
//! Each body has four optional handler slots (step, stabilise, update and
//! collision). Handlers report failure by returning an error, which
//! unregisters that one handler and leaves the simulation running.
//!
//! Queries report every hit through a [`SweepCallback`] or a
//! [`TestCallback`]. Plain closures implement both.

use std::fmt;

use grit_col::MaterialId;
use grit_math::{Quaternion, Vector3};

use crate::body::BodyKey;
use crate::world::PhysicsWorld;

/// Error returned by a failing handler
pub type CallbackError = Box<dyn std::error::Error>;

pub type CallbackResult = Result<(), CallbackError>;

/// Runs after every sub-step with the sub-step length
pub type StepCallback = Box<dyn FnMut(&mut PhysicsWorld, BodyKey, f32) -> CallbackResult>;

/// Runs after every body of a sub-step has stepped
pub type StabiliseCallback = Box<dyn FnMut(&mut PhysicsWorld, BodyKey, f32) -> CallbackResult>;

/// Receives the current pose during the graphics pass
pub type UpdateCallback = Box<dyn FnMut(&mut PhysicsWorld, BodyKey, Vector3, Quaternion) -> CallbackResult>;

/// Receives one event per touching body after a sub-step
pub type CollisionCallback = Box<dyn FnMut(&mut PhysicsWorld, BodyKey, &CollisionEvent) -> CallbackResult>;

/// Handler slots of one body
#[derive(Default)]
pub struct BodyCallbacks {
    pub step: Option<StepCallback>,
    pub stabilise: Option<StabiliseCallback>,
    pub update: Option<UpdateCallback>,
    pub collision: Option<CollisionCallback>,
}

impl BodyCallbacks {
    pub fn is_empty(&self) -> bool {
        self.step.is_none() && self.stabilise.is_none() && self.update.is_none() && self.collision.is_none()
    }
}

impl fmt::Debug for BodyCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyCallbacks")
            .field("step", &self.step.is_some())
            .field("stabilise", &self.stabilise.is_some())
            .field("update", &self.update.is_some())
            .field("collision", &self.collision.is_some())
            .finish()
    }
}

pub(crate) fn step_slot(c: &mut BodyCallbacks) -> &mut Option<StepCallback> {
    &mut c.step
}

pub(crate) fn stabilise_slot(c: &mut BodyCallbacks) -> &mut Option<StabiliseCallback> {
    &mut c.stabilise
}

pub(crate) fn update_slot(c: &mut BodyCallbacks) -> &mut Option<UpdateCallback> {
    &mut c.update
}

pub(crate) fn collision_slot(c: &mut BodyCallbacks) -> &mut Option<CollisionCallback> {
    &mut c.collision
}

/// One touching pair as seen from the receiving body
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEvent {
    /// The other body, if it is one of ours
    pub other: Option<BodyKey>,
    /// Sum of the normal impulses over the manifold
    pub impulse: f32,
    /// World-space contact point
    pub point: Vector3,
    /// World-space normal, pointing from the receiving body to the other
    pub normal: Vector3,
    pub material: MaterialId,
    pub other_material: MaterialId,
}

/// One hit from [`PhysicsWorld::ray`] or [`PhysicsWorld::sweep`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepHit {
    pub body: BodyKey,
    /// Fraction of the way from start to end, in [0, 1]
    pub distance: f32,
    /// World-space surface normal of the body that was hit
    pub normal: Vector3,
    pub material: MaterialId,
}

/// One overlap from [`PhysicsWorld::test`] or [`PhysicsWorld::test_sphere`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TestHit {
    pub body: BodyKey,
    /// World-space point on the body's surface
    pub position: Vector3,
    /// World-space normal of the body's surface
    pub normal: Vector3,
    /// Overlap depth, positive when penetrating
    pub penetration: f32,
    pub material: MaterialId,
}

pub trait SweepCallback {
    fn result(&mut self, hit: &SweepHit);
}

impl<F: FnMut(&SweepHit)> SweepCallback for F {
    fn result(&mut self, hit: &SweepHit) {
        self(hit)
    }
}

pub trait TestCallback {
    fn result(&mut self, hit: &TestHit);
}

impl<F: FnMut(&TestHit)> TestCallback for F {
    fn result(&mut self, hit: &TestHit) {
        self(hit)
    }
}

/// Collects every sweep hit
#[derive(Clone, Debug, Default)]
pub struct SweepHits {
    pub hits: Vec<SweepHit>,
}

impl SweepHits {
    pub fn nearest(&self) -> Option<&SweepHit> {
        self.hits.iter().min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl SweepCallback for SweepHits {
    fn result(&mut self, hit: &SweepHit) {
        self.hits.push(*hit);
    }
}
