//! Ray type for intersection queries and picking

use crate::foundation::math::{Point3, Vec3};

/// A ray for intersection testing and picking
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Point3,
    /// The direction of the ray (normalized on construction)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    ///
    /// The direction is normalized so that intersection distances are in
    /// world units.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Point3 {
        self.origin + self.direction * t
    }
}
