//! Error types for collision file decoding

use std::fmt;

/// Error raised while tokenizing or parsing a TCOL document
///
/// Carries the resource name and the line/column of the offending token,
/// plus the parser routine that rejected it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Human-readable description
    pub message: String,
    /// Parser routine that raised the error
    pub function: &'static str,
    /// Resource name of the document being parsed
    pub file: String,
    /// 1-based line of the offending token
    pub line: usize,
    /// 1-based column of the offending token
    pub column: usize,
}

impl ParseError {
    pub fn new(
        message: impl Into<String>,
        function: &'static str,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            message: message.into(),
            function,
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} (in {})",
            self.file, self.line, self.column, self.message, self.function
        )
    }
}

impl std::error::Error for ParseError {}

/// Error raised while reading a BCOL blob
#[derive(Debug, Clone, PartialEq)]
pub enum BColError {
    /// The blob ends before a record that should be present
    Truncated { needed: usize, len: usize },
    /// The blob does not start with the BCOL magic
    BadMagic,
    /// A self-relative offset points outside the blob
    OffsetOutOfRange { field: usize },
    /// A material name is not NUL-terminated or not UTF-8
    BadMaterialName { pos: usize },
    /// A face references a vertex past the end of the vertex array
    IndexOutOfRange { face: usize, index: u32, vertexes: usize },
}

impl fmt::Display for BColError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BColError::Truncated { needed, len } => {
                write!(f, "BCOL truncated: need {} bytes, have {}", needed, len)
            }
            BColError::BadMagic => write!(f, "not a BCOL file (bad magic)"),
            BColError::OffsetOutOfRange { field } => {
                write!(f, "BCOL offset at byte {} points outside the file", field)
            }
            BColError::BadMaterialName { pos } => {
                write!(f, "BCOL material name at byte {} is malformed", pos)
            }
            BColError::IndexOutOfRange { face, index, vertexes } => write!(
                f,
                "BCOL face {} references vertex {} but only {} vertexes exist",
                face, index, vertexes
            ),
        }
    }
}

impl std::error::Error for BColError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_has_location() {
        let err = ParseError::new("Already have mass", "parse_attributes", "crate.tcol", 3, 5);
        let msg = format!("{}", err);
        assert!(msg.contains("crate.tcol:3:5"));
        assert!(msg.contains("Already have mass"));
        assert!(msg.contains("parse_attributes"));
    }

    #[test]
    fn test_bcol_error_display() {
        let err = BColError::IndexOutOfRange { face: 2, index: 9, vertexes: 3 };
        let msg = format!("{}", err);
        assert!(msg.contains("face 2"));
        assert!(msg.contains("vertex 9"));
        assert!(format!("{}", BColError::BadMagic).contains("magic"));
    }
}
