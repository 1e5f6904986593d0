//! Plane in constant-normal form

use crate::foundation::math::{Point3, Vec3};

/// A plane defined by `normal . p + d = 0`
///
/// Points with a positive signed distance are on the side the normal
/// points toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal of the plane
    pub normal: Vec3,
    /// Signed distance term
    pub d: f32,
}

impl Plane {
    /// Creates a plane from raw coefficients, normalizing so that signed
    /// distances are in world units
    pub fn from_coefficients(a: f32, b: f32, c: f32, d: f32) -> Self {
        let normal = Vec3::new(a, b, c);
        let magnitude = normal.magnitude();
        Self {
            normal: normal / magnitude,
            d: d / magnitude,
        }
    }

    /// Creates a plane from a unit normal and a point on the plane
    pub fn from_point_normal(point: Point3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            d: -normal.dot(&point.coords),
        }
    }

    /// Signed distance from a point to the plane
    pub fn signed_distance(&self, point: Point3) -> f32 {
        self.normal.dot(&point.coords) + self.d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_signed_distance_sides() {
        // XZ plane with +Y normal
        let plane = Plane::from_point_normal(Point3::origin(), Vec3::new(0.0, 1.0, 0.0));

        assert_relative_eq!(plane.signed_distance(Point3::new(0.0, 2.0, 0.0)), 2.0);
        assert_relative_eq!(plane.signed_distance(Point3::new(5.0, -3.0, 1.0)), -3.0);
        assert_relative_eq!(plane.signed_distance(Point3::new(1.0, 0.0, 1.0)), 0.0);
    }

    #[test]
    fn test_coefficients_are_normalized() {
        let plane = Plane::from_coefficients(0.0, 2.0, 0.0, 4.0);
        assert_relative_eq!(plane.normal.magnitude(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(plane.signed_distance(Point3::origin()), 2.0, epsilon = 1e-6);
    }
}
