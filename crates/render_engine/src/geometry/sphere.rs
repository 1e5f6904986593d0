//! Bounding sphere

use crate::foundation::math::Point3;
use crate::geometry::Ray;

/// A bounding sphere for culling and intersection tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// The center position of the sphere in world space
    pub center: Point3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Point3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if this sphere intersects with another (touching counts)
    pub fn intersects_sphere(&self, other: &BoundingSphere) -> bool {
        let distance_squared = (self.center - other.center).magnitude_squared();
        let radius_sum = self.radius + other.radius;
        distance_squared <= radius_sum * radius_sum
    }

    /// Check if a point lies inside the sphere (boundary inclusive)
    pub fn contains_point(&self, point: Point3) -> bool {
        (point - self.center).magnitude_squared() <= self.radius * self.radius
    }

    /// Test ray intersection with this sphere
    ///
    /// Returns the nearest hit point along the ray, or the ray origin when
    /// it starts inside the sphere. `None` means no intersection.
    pub fn intersects_ray(&self, ray: &Ray) -> Option<Point3> {
        let oc = ray.origin - self.center;

        // Quadratic coefficients for |origin + t*direction - center|^2 = r^2
        // with a == 1 since the direction is normalized
        let b = 2.0 * oc.dot(&ray.direction);
        let c = oc.magnitude_squared() - self.radius * self.radius;

        let discriminant = b * b - 4.0 * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_discriminant = discriminant.sqrt();
        let t1 = (-b - sqrt_discriminant) * 0.5;
        let t2 = (-b + sqrt_discriminant) * 0.5;

        if t1 >= 0.0 {
            Some(ray.point_at(t1))
        } else if t2 >= 0.0 {
            // Origin inside the sphere
            Some(ray.origin)
        } else {
            None // Sphere entirely behind the ray
        }
    }
}
