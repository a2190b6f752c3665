//! Where collision resources come from
//!
//! Meshes are requested by resource name (e.g. `props/crate.tcol`). A
//! [`ResourceSource`] turns that name into bytes.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::MeshError;

/// Resolves resource names to file contents
pub trait ResourceSource {
    fn read(&self, name: &str) -> Result<Vec<u8>, MeshError>;
}

/// Reads resources from a directory tree
#[derive(Clone, Debug)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceSource for DiskSource {
    fn read(&self, name: &str) -> Result<Vec<u8>, MeshError> {
        let path = self.root.join(name.trim_start_matches('/'));
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MeshError::NotFound(name.to_string()),
            _ => MeshError::Io(e),
        })
    }
}

/// In-memory resources, mostly for tests and tools
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), bytes.into());
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl ResourceSource for MemorySource {
    fn read(&self, name: &str) -> Result<Vec<u8>, MeshError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| MeshError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source() {
        let src = MemorySource::new().with("a.tcol", "TCOL1.0");
        assert_eq!(src.read("a.tcol").unwrap(), b"TCOL1.0".to_vec());
        assert!(matches!(src.read("b.tcol"), Err(MeshError::NotFound(_))));
    }

    #[test]
    fn test_disk_source_missing_file() {
        let src = DiskSource::new(std::env::temp_dir().join("gritphys-no-such-dir"));
        assert!(matches!(src.read("x.tcol"), Err(MeshError::NotFound(_))));
    }

    #[test]
    fn test_disk_source_reads() {
        let dir = std::env::temp_dir().join(format!("gritphys-source-{}", std::process::id()));
        fs::create_dir_all(dir.join("props")).unwrap();
        fs::write(dir.join("props/box.tcol"), b"hello").unwrap();
        let src = DiskSource::new(&dir);
        assert_eq!(src.read("/props/box.tcol").unwrap(), b"hello".to_vec());
        fs::remove_dir_all(&dir).unwrap();
    }
}
