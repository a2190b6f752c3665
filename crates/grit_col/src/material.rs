//! Physical material database
//!
//! Collision files reference materials by full path. The database assigns
//! each one a dense id and an interaction group (the row/column used in the
//! physics world's friction/restitution matrix).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Dense material identifier (index into the database)
pub type MaterialId = u32;

/// A material as seen by the collision layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhysicalMaterial {
    pub id: MaterialId,
    pub name: String,
    pub interaction_group: u32,
}

/// One entry of a RON material file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub name: String,
    #[serde(default)]
    pub group: u32,
}

/// On-disk shape of a material database
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MaterialDbFile {
    pub materials: Vec<MaterialEntry>,
}

/// Lookup table from material path to [`PhysicalMaterial`]
///
/// Id 0 is always the `"Frictionless"` fallback in interaction group 0, so
/// it is also the material that anomalous contact lookups degrade to.
#[derive(Clone, Debug)]
pub struct MaterialDb {
    materials: Vec<PhysicalMaterial>,
    by_name: HashMap<String, MaterialId>,
}

impl Default for MaterialDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialDb {
    /// Name of the material that unresolvable references fall back to
    pub const FALLBACK: &'static str = "Frictionless";

    /// Create a database holding only the fallback material
    pub fn new() -> Self {
        let mut db = Self {
            materials: Vec::new(),
            by_name: HashMap::new(),
        };
        db.materials.push(PhysicalMaterial {
            id: 0,
            name: Self::FALLBACK.to_string(),
            interaction_group: 0,
        });
        db.by_name.insert(Self::FALLBACK.to_string(), 0);
        db
    }

    /// Load a database from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MaterialDbError> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse a database from RON text
    pub fn from_ron_str(contents: &str) -> Result<Self, MaterialDbError> {
        let file: MaterialDbFile = ron::from_str(contents)?;
        let mut db = Self::new();
        for entry in file.materials {
            if entry.name == Self::FALLBACK {
                db.materials[0].interaction_group = entry.group;
                continue;
            }
            db.add(&entry.name, entry.group)?;
        }
        Ok(db)
    }

    /// Register a new material, returning its id
    pub fn add(&mut self, name: &str, interaction_group: u32) -> Result<MaterialId, MaterialDbError> {
        if self.by_name.contains_key(name) {
            return Err(MaterialDbError::Duplicate(name.to_string()));
        }
        let id = self.materials.len() as MaterialId;
        self.materials.push(PhysicalMaterial {
            id,
            name: name.to_string(),
            interaction_group,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Look up a material by full path
    pub fn get_material(&self, name: &str) -> Option<&PhysicalMaterial> {
        self.by_name.get(name).map(|&id| &self.materials[id as usize])
    }

    /// Look up a material by id
    pub fn get(&self, id: MaterialId) -> Option<&PhysicalMaterial> {
        self.materials.get(id as usize)
    }

    /// The fallback material (always id 0)
    pub fn fallback(&self) -> &PhysicalMaterial {
        &self.materials[0]
    }

    /// Resolve a name, substituting the fallback (with a warning) on failure
    pub fn resolve(&self, name: &str, context: &str) -> MaterialId {
        match self.get_material(name) {
            Some(mat) => mat.id,
            None => {
                log::warn!(
                    "{}: physical material \"{}\" does not exist, using \"{}\"",
                    context,
                    name,
                    Self::FALLBACK
                );
                0
            }
        }
    }

    /// Name of a material id (the fallback name for unknown ids)
    pub fn name_of(&self, id: MaterialId) -> &str {
        self.get(id).map(|m| m.name.as_str()).unwrap_or(Self::FALLBACK)
    }

    /// Interaction group of a material id, if the id exists
    pub fn interaction_group(&self, id: MaterialId) -> Option<u32> {
        self.get(id).map(|m| m.interaction_group)
    }

    /// Number of materials (including the fallback)
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhysicalMaterial> {
        self.materials.iter()
    }
}

/// Error loading a material database
#[derive(Debug)]
pub enum MaterialDbError {
    /// IO error (file not found, permission denied, etc.)
    Io(io::Error),
    /// Parse error (invalid RON syntax)
    Parse(ron::error::SpannedError),
    /// The same material name was registered twice
    Duplicate(String),
}

impl From<io::Error> for MaterialDbError {
    fn from(e: io::Error) -> Self {
        MaterialDbError::Io(e)
    }
}

impl From<ron::error::SpannedError> for MaterialDbError {
    fn from(e: ron::error::SpannedError) -> Self {
        MaterialDbError::Parse(e)
    }
}

impl fmt::Display for MaterialDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialDbError::Io(e) => write!(f, "IO error: {}", e),
            MaterialDbError::Parse(e) => write!(f, "Parse error: {}", e),
            MaterialDbError::Duplicate(name) => write!(f, "Material \"{}\" defined twice", name),
        }
    }
}

impl std::error::Error for MaterialDbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaterialDbError::Io(e) => Some(e),
            MaterialDbError::Parse(e) => Some(e),
            MaterialDbError::Duplicate(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_id_zero() {
        let db = MaterialDb::new();
        assert_eq!(db.len(), 1);
        assert_eq!(db.fallback().id, 0);
        assert_eq!(db.fallback().name, "Frictionless");
        assert_eq!(db.get_material("Frictionless").map(|m| m.id), Some(0));
    }

    #[test]
    fn test_add_assigns_dense_ids() {
        let mut db = MaterialDb::new();
        let a = db.add("/common/pmat/Stone", 1).unwrap();
        let b = db.add("/common/pmat/Wood", 2).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(db.interaction_group(b), Some(2));
        assert_eq!(db.name_of(a), "/common/pmat/Stone");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut db = MaterialDb::new();
        db.add("mat", 0).unwrap();
        assert!(matches!(db.add("mat", 1), Err(MaterialDbError::Duplicate(_))));
    }

    #[test]
    fn test_resolve_falls_back() {
        let mut db = MaterialDb::new();
        let rock = db.add("rock", 3).unwrap();
        assert_eq!(db.resolve("rock", "test"), rock);
        assert_eq!(db.resolve("no/such/material", "test"), 0);
    }

    #[test]
    fn test_from_ron() {
        let ron = r#"(
            materials: [
                (name: "Frictionless", group: 4),
                (name: "/pmat/Metal", group: 1),
                (name: "/pmat/Rubber"),
            ],
        )"#;
        let db = MaterialDb::from_ron_str(ron).unwrap();
        assert_eq!(db.len(), 3);
        assert_eq!(db.fallback().interaction_group, 4);
        assert_eq!(db.get_material("/pmat/Metal").map(|m| m.interaction_group), Some(1));
        assert_eq!(db.get_material("/pmat/Rubber").map(|m| m.interaction_group), Some(0));
    }

    #[test]
    fn test_from_ron_syntax_error() {
        assert!(matches!(
            MaterialDb::from_ron_str("(materials: [ oops"),
            Err(MaterialDbError::Parse(_))
        ));
    }
}
