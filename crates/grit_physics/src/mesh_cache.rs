//! Registry of loaded collision meshes
//!
//! Meshes are loaded on first reference to a resource name and shared by
//! every body that names the same resource. A mesh can only be released
//! once no body uses it.

use std::collections::HashMap;

use grit_col::MaterialDb;
use slotmap::{new_key_type, SlotMap};

use crate::collision_mesh::CollisionMesh;
use crate::error::{MeshError, PhysicsError};
use crate::source::ResourceSource;

new_key_type! {
    /// Key to a collision mesh in the cache
    pub struct MeshKey;
}

/// Name-indexed store of [`CollisionMesh`]es
#[derive(Debug, Default)]
pub struct MeshCache {
    meshes: SlotMap<MeshKey, CollisionMesh>,
    by_name: HashMap<String, MeshKey>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the mesh loaded under `name`, loading it first if needed
    ///
    /// A failed load caches nothing.
    pub fn get_or_load(
        &mut self,
        name: &str,
        source: &dyn ResourceSource,
        db: &MaterialDb,
        internal_edges: bool,
    ) -> Result<MeshKey, MeshError> {
        if let Some(&key) = self.by_name.get(name) {
            return Ok(key);
        }
        let mut mesh = CollisionMesh::new(name);
        mesh.load(source, db, internal_edges)?;
        Ok(self.insert(mesh))
    }

    /// Add an already-built mesh, replacing nothing
    ///
    /// If a mesh of the same name is cached, its key is returned and
    /// `mesh` is dropped.
    pub fn insert(&mut self, mesh: CollisionMesh) -> MeshKey {
        if let Some(&key) = self.by_name.get(mesh.name()) {
            return key;
        }
        let name = mesh.name().to_string();
        let key = self.meshes.insert(mesh);
        self.by_name.insert(name, key);
        key
    }

    pub fn find(&self, name: &str) -> Option<MeshKey> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, key: MeshKey) -> Option<&CollisionMesh> {
        self.meshes.get(key)
    }

    pub fn get_mut(&mut self, key: MeshKey) -> Option<&mut CollisionMesh> {
        self.meshes.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshKey, &CollisionMesh)> {
        self.meshes.iter()
    }

    /// Remove a mesh that no body uses
    pub fn release(&mut self, key: MeshKey) -> Result<CollisionMesh, PhysicsError> {
        let mesh = self
            .meshes
            .get(key)
            .ok_or_else(|| PhysicsError::UnknownMesh(format!("{:?}", key)))?;
        if !mesh.users().is_empty() {
            return Err(PhysicsError::MeshInUse {
                name: mesh.name().to_string(),
                users: mesh.users().len(),
            });
        }
        let mesh = self
            .meshes
            .remove(key)
            .ok_or_else(|| PhysicsError::UnknownMesh(format!("{:?}", key)))?;
        self.by_name.remove(mesh.name());
        log::debug!("Released collision mesh {}", mesh.name());
        Ok(mesh)
    }

    /// Release every mesh without users, returning how many went
    pub fn garbage_collect(&mut self) -> usize {
        let unused: Vec<MeshKey> = self
            .meshes
            .iter()
            .filter(|(_, m)| m.users().is_empty())
            .map(|(k, _)| k)
            .collect();
        let count = unused.len();
        for key in unused {
            if let Some(mesh) = self.meshes.remove(key) {
                self.by_name.remove(mesh.name());
            }
        }
        count
    }
}
