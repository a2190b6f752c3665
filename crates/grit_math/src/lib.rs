//! 3D Mathematics Library
//!
//! Small value types shared by the collision format parser and the physics
//! layer. Z is up throughout.
//!
//! ## Core Types
//!
//! - [`Vector3`] - 3D vector with x, y, z components
//! - [`Quaternion`] - rotation stored as (w, x, y, z)
//! - [`Transform`] - rigid transform (position + orientation)
//! - [`Radian`] / [`Degree`] - typed angles

mod angle;
mod quaternion;
mod transform;
mod vector3;

pub use angle::{Degree, Radian};
pub use quaternion::Quaternion;
pub use transform::Transform;
pub use vector3::Vector3;
