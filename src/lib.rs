//! gritphys - collision resources and rigid-body physics
//!
//! Re-exports the workspace crates and adds the layered application
//! configuration used by the `gritphys` tool.

pub mod config;

pub use grit_col as col;
pub use grit_math as math;
pub use grit_physics as physics;
