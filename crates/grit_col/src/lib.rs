//! Collision geometry formats
//!
//! This crate reads and writes the two collision geometry encodings:
//! - TCOL, a human-authored text format parsed by a recursive-descent parser
//! - BCOL, a fixed little-endian binary layout with self-relative offsets
//!
//! Both decode into the same document model ([`TColFile`]), with every
//! material reference resolved against a [`MaterialDb`].

pub mod bcol;
pub mod error;
pub mod lexer;
pub mod material;
pub mod parser;
pub mod printer;
pub mod shrink;
pub mod tcol;

// Re-export commonly used types
pub use bcol::{BColView, BCOL_MAGIC, BCOL_SNIFF};
pub use error::{BColError, ParseError};
pub use material::{MaterialDb, MaterialDbError, MaterialId, PhysicalMaterial};
pub use parser::{parse_tcol, parse_tcol_bytes, TCOL_HEADER};
pub use printer::pretty_print;
pub use shrink::shrink_vertexes;
pub use tcol::{
    TColBox, TColCompound, TColCone, TColCylinder, TColFace, TColFile, TColHull, TColPlane,
    TColShape, TColSphere, TColTriMesh, DEFAULT_MARGIN,
};
