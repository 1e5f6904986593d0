//! Axis-aligned bounding box

use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::geometry::Ray;

/// An axis-aligned bounding box in min/max form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Point3,
    /// Maximum corner
    pub max: Point3,
}

impl Aabb {
    /// Creates a box from explicit corners
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Creates a box from a center point and half extents
    pub fn from_center_half_extents(center: Point3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// A degenerate box at the origin
    pub fn zero() -> Self {
        Self {
            min: Point3::origin(),
            max: Point3::origin(),
        }
    }

    /// Center point of the box
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half extents along each axis
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full size along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if this box overlaps another (touching counts as overlap)
    pub fn intersects_aabb(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Check if a point lies inside the box (boundary inclusive)
    pub fn contains_point(&self, point: Point3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Grow this box to enclose another
    pub fn expand(&mut self, other: &Aabb) {
        self.min = Point3::new(
            self.min.x.min(other.min.x),
            self.min.y.min(other.min.y),
            self.min.z.min(other.min.z),
        );
        self.max = Point3::new(
            self.max.x.max(other.max.x),
            self.max.y.max(other.max.y),
            self.max.z.max(other.max.z),
        );
    }

    /// Union of two boxes
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut result = *self;
        result.expand(other);
        result
    }

    /// Re-derive this box as the axis-aligned envelope of `source`
    /// transformed by `matrix`
    ///
    /// Used whenever a node's world transform changes and a mesh-local box
    /// must be placed in world space. Uses the center/extent form: the new
    /// center is the transformed center, the new extents are the absolute
    /// value of the upper 3x3 applied to the old extents.
    pub fn set_from_transformed_aabb(&mut self, source: &Aabb, matrix: &Mat4) {
        let center = matrix.transform_point(&source.center());
        let extents = source.half_extents();

        let abs_basis = matrix.fixed_view::<3, 3>(0, 0).abs();
        let new_extents = abs_basis * extents;

        self.min = center - new_extents;
        self.max = center + new_extents;
    }

    /// Test ray intersection using the slab method
    ///
    /// Returns the entry point on the box surface, or the ray origin when
    /// the origin is already inside. `None` means no intersection.
    pub fn intersects_ray(&self, ray: &Ray) -> Option<Point3> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            let slab_min = self.min[axis];
            let slab_max = self.max[axis];

            if dir.abs() < f32::EPSILON {
                // Ray parallel to this slab: origin must lie within it
                if origin < slab_min || origin > slab_max {
                    return None;
                }
            } else {
                let inv_dir = 1.0 / dir;
                let mut t0 = (slab_min - origin) * inv_dir;
                let mut t1 = (slab_max - origin) * inv_dir;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return None;
                }
            }
        }

        if t_max < 0.0 {
            return None; // Box entirely behind the ray
        }

        let t = if t_min >= 0.0 { t_min } else { 0.0 };
        Some(ray.point_at(t))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::zero()
    }
}
