//! Oriented bounding box

use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::geometry::{Aabb, Ray};

/// A bounding box with an arbitrary orientation
///
/// Stored as a world-from-box transform plus half extents; the box-local
/// volume is the axis-aligned box spanning `[-half_extents, half_extents]`.
#[derive(Debug, Clone)]
pub struct OrientedBox {
    world_transform: Mat4,
    inverse_world_transform: Mat4,
    half_extents: Vec3,
}

impl OrientedBox {
    /// Creates an oriented box from a world transform and half extents
    ///
    /// Returns `None` if the transform is singular and cannot be inverted.
    pub fn new(world_transform: Mat4, half_extents: Vec3) -> Option<Self> {
        let inverse_world_transform = world_transform.try_inverse()?;
        Some(Self {
            world_transform,
            inverse_world_transform,
            half_extents,
        })
    }

    /// The world-from-box transform
    pub fn world_transform(&self) -> &Mat4 {
        &self.world_transform
    }

    /// Half extents in box-local space
    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    /// Replace the world transform, keeping the half extents
    ///
    /// Returns false and leaves the box unchanged when the new transform is
    /// singular.
    pub fn set_world_transform(&mut self, world_transform: Mat4) -> bool {
        match world_transform.try_inverse() {
            Some(inverse) => {
                self.world_transform = world_transform;
                self.inverse_world_transform = inverse;
                true
            }
            None => false,
        }
    }

    /// Check if a world-space point lies inside the box (boundary inclusive)
    pub fn contains_point(&self, point: Point3) -> bool {
        let local = self.inverse_world_transform.transform_point(&point);
        local.x.abs() <= self.half_extents.x
            && local.y.abs() <= self.half_extents.y
            && local.z.abs() <= self.half_extents.z
    }

    /// Test ray intersection against the oriented box
    ///
    /// The ray is transformed into box space where a slab test applies; the
    /// hit point is returned in world space.
    pub fn intersects_ray(&self, ray: &Ray) -> Option<Point3> {
        let local_origin = self.inverse_world_transform.transform_point(&ray.origin);
        let local_direction = self.inverse_world_transform.transform_vector(&ray.direction);

        // Box-space direction may be scaled by the transform; renormalize so
        // the slab test distances stay meaningful, then map the hit back
        let local_ray = Ray::new(local_origin, local_direction);
        let local_box = Aabb::from_center_half_extents(Point3::origin(), self.half_extents);

        let local_hit = local_box.intersects_ray(&local_ray)?;
        Some(self.world_transform.transform_point(&local_hit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_aligned_case_matches_aabb() {
        let obb = OrientedBox::new(Mat4::identity(), Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));

        let hit = obb.intersects_ray(&ray).expect("ray should hit");
        assert_relative_eq!(hit, Point3::new(0.0, 0.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_rotated_box_contains_point() {
        // Unit box rotated 45 degrees around Y: the world point (1.2, 0, 0)
        // is outside the unrotated box corner distance but inside the
        // rotated one (diagonal reaches sqrt(2))
        let rotation = Mat4::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_4);
        let obb = OrientedBox::new(rotation, Vec3::new(1.0, 1.0, 1.0)).unwrap();

        assert!(obb.contains_point(Point3::new(1.2, 0.0, 0.0)));
        assert!(!obb.contains_point(Point3::new(1.2, 0.0, 1.2)));
    }

    #[test]
    fn test_translated_box_ray_hit() {
        let transform = Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0));
        let obb = OrientedBox::new(transform, Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let ray = Ray::new(Point3::origin(), Vec3::new(0.0, 0.0, -1.0));

        let hit = obb.intersects_ray(&ray).expect("ray should hit");
        assert_relative_eq!(hit, Point3::new(0.0, 0.0, -4.0), epsilon = 1e-5);
    }

    #[test]
    fn test_singular_transform_rejected() {
        let singular = Mat4::zeros();
        assert!(OrientedBox::new(singular, Vec3::new(1.0, 1.0, 1.0)).is_none());
    }
}
