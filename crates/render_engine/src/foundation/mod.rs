//! Foundation utilities shared by every other module
//!
//! Currently holds the math layer. Kept as a separate module so the
//! geometry and scene code never import `nalgebra` directly.

pub mod math;
