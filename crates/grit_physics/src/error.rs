//! Physics error types
//!
//! [`MeshError`] covers loading collision meshes, [`PhysicsError`] covers
//! operations on the world and its bodies.

use std::fmt;
use std::io;

use grit_col::{BColError, ParseError};

/// Error type for collision mesh loading
#[derive(Debug)]
pub enum MeshError {
    /// IO error (file not found, permission denied, etc.)
    Io(io::Error),
    /// The resource source has no resource by this name
    NotFound(String),
    /// TCOL text failed to parse
    Parse(ParseError),
    /// BCOL blob failed to decode
    BCol(BColError),
    /// Neither the magic nor the extension identifies the format
    UnknownFormat(String),
    /// A shape could not be built (e.g. a hull with no volume)
    Degenerate { name: String, part: usize, reason: String },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::Io(err) => write!(f, "Mesh IO error: {}", err),
            MeshError::NotFound(name) => write!(f, "Collision resource not found: {}", name),
            MeshError::Parse(err) => write!(f, "Mesh parse error: {}", err),
            MeshError::BCol(err) => write!(f, "Mesh decode error: {}", err),
            MeshError::UnknownFormat(name) => write!(f, "Unrecognised collision format: {}", name),
            MeshError::Degenerate { name, part, reason } => {
                write!(f, "{}: part {} is degenerate: {}", name, part, reason)
            }
        }
    }
}

impl std::error::Error for MeshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeshError::Io(err) => Some(err),
            MeshError::Parse(err) => Some(err),
            MeshError::BCol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MeshError {
    fn from(err: io::Error) -> Self {
        MeshError::Io(err)
    }
}

impl From<ParseError> for MeshError {
    fn from(err: ParseError) -> Self {
        MeshError::Parse(err)
    }
}

impl From<BColError> for MeshError {
    fn from(err: BColError) -> Self {
        MeshError::BCol(err)
    }
}

/// Error type for world and body operations
#[derive(Debug)]
pub enum PhysicsError {
    /// The body key does not refer to a live body (already destroyed)
    StaleBody,
    /// The body is not currently simulated
    Detached,
    /// Part index past the end of the body's part list
    ElementOutOfRange { index: usize, count: usize },
    /// No mesh is loaded under this name
    UnknownMesh(String),
    /// The mesh still has bodies using it
    MeshInUse { name: String, users: usize },
    /// Sweeps need a mesh made of exactly one convex part
    NotSweepable(String),
    /// Loading or reloading a mesh failed
    Mesh(MeshError),
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::StaleBody => write!(f, "Body has been destroyed"),
            PhysicsError::Detached => write!(f, "Body is not in the world"),
            PhysicsError::ElementOutOfRange { index, count } => {
                write!(f, "Element {} out of range (body has {})", index, count)
            }
            PhysicsError::UnknownMesh(name) => write!(f, "No collision mesh named {}", name),
            PhysicsError::MeshInUse { name, users } => {
                write!(f, "Collision mesh {} still has {} users", name, users)
            }
            PhysicsError::NotSweepable(name) => {
                write!(f, "Collision mesh {} is not a single convex shape", name)
            }
            PhysicsError::Mesh(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PhysicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PhysicsError::Mesh(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MeshError> for PhysicsError {
    fn from(err: MeshError) -> Self {
        PhysicsError::Mesh(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_mesh_error_display() {
        let err = MeshError::NotFound("props/crate.tcol".to_string());
        assert!(format!("{}", err).contains("props/crate.tcol"));
        let err = MeshError::Degenerate { name: "a".into(), part: 2, reason: "flat hull".into() };
        assert!(format!("{}", err).contains("part 2"));
    }

    #[test]
    fn test_parse_error_is_source() {
        let parse = ParseError::new("Already have mass", "parse_attributes", "x.tcol", 1, 2);
        let err = PhysicsError::from(MeshError::from(parse));
        let inner = err.source().and_then(|e| e.source());
        assert!(inner.is_some());
        assert!(format!("{}", err).contains("Already have mass"));
    }

    #[test]
    fn test_element_out_of_range_display() {
        let err = PhysicsError::ElementOutOfRange { index: 4, count: 2 };
        assert_eq!(format!("{}", err), "Element 4 out of range (body has 2)");
    }
}
