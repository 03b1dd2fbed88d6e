//! Small dense linear algebra for the NMG repair kernel.
//!
//! Everything here works on plain `[f64; 3]` arrays so the kernel's own
//! geometry types stay independent of nalgebra. Systems are at most a handful
//! of planes: 3x3 exact solves, minimal-displacement least squares and a
//! Newell plane fit.

pub mod linear;
pub mod plane_fit;

pub use linear::*;
pub use plane_fit::*;
