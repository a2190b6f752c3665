//! Collision meshes and rigid-body simulation for gritphys
//!
//! This crate turns TCOL/BCOL collision documents into simulated bodies:
//! - Collision meshes loaded from a resource source and shared by name
//! - A fixed-step physics world with per-body callbacks
//! - Per-material friction and restitution from an interaction matrix
//! - Ray, sweep and overlap queries that report the material hit
//! - Random placement of objects over mesh faces of one material

pub mod body;
pub mod callbacks;
pub mod collision_mesh;
pub mod contact;
mod convert;
mod dynamics;
pub mod error;
pub mod material;
pub mod mesh_cache;
pub mod query;
pub mod shapes;
pub mod source;
pub mod world;

// Re-export commonly used types
pub use body::{Body, BodyKey, BodyMut, PartState, RigidBody};
pub use callbacks::{
    BodyCallbacks, CallbackError, CallbackResult, CollisionEvent, SweepCallback, SweepHit, SweepHits, TestCallback,
    TestHit,
};
pub use collision_mesh::{decode, scatter_rng, CollisionMesh, MeshProperties, ScatterParams};
pub use contact::ContactHacks;
pub use error::{MeshError, PhysicsError};
pub use material::{Interaction, InteractionError, InteractionMatrix};
pub use mesh_cache::{MeshCache, MeshKey};
pub use shapes::{ChildKind, MasterChild};
pub use source::{DiskSource, MemorySource, ResourceSource};
pub use world::{PhysicsConfig, PhysicsWorld};
