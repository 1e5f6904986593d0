//! View frustum extracted from a view-projection matrix

use crate::foundation::math::{Mat4, Point3};
use crate::geometry::{Aabb, BoundingSphere, Plane};

/// Result of a sphere-frustum containment query
///
/// `Inside` lets callers skip any finer-grained culling of the volume's
/// contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Fully outside at least one frustum plane
    Outside,
    /// Crosses at least one plane
    Intersecting,
    /// Fully inside all six planes
    Inside,
}

/// Index of a frustum plane in [`Frustum::planes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumPlane {
    /// Left clipping plane
    Left = 0,
    /// Right clipping plane
    Right = 1,
    /// Bottom clipping plane
    Bottom = 2,
    /// Top clipping plane
    Top = 3,
    /// Near clipping plane
    Near = 4,
    /// Far clipping plane
    Far = 5,
}

/// Six planes bounding a camera's visible volume
///
/// All plane normals point inward, so a point is visible when its signed
/// distance to every plane is positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix
    ///
    /// Follows the Gribb/Hartmann plane extraction for matrices producing a
    /// [0, 1] clip depth range: row combinations of the matrix give the six
    /// planes directly, which are then normalized.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let m = view_projection;
        let row = |i: usize| {
            (
                m[(i, 0)],
                m[(i, 1)],
                m[(i, 2)],
                m[(i, 3)],
            )
        };

        let (r0a, r0b, r0c, r0d) = row(0);
        let (r1a, r1b, r1c, r1d) = row(1);
        let (r2a, r2b, r2c, r2d) = row(2);
        let (r3a, r3b, r3c, r3d) = row(3);

        let planes = [
            // Left:   w + x >= 0
            Plane::from_coefficients(r3a + r0a, r3b + r0b, r3c + r0c, r3d + r0d),
            // Right:  w - x >= 0
            Plane::from_coefficients(r3a - r0a, r3b - r0b, r3c - r0c, r3d - r0d),
            // Bottom: w + y >= 0
            Plane::from_coefficients(r3a + r1a, r3b + r1b, r3c + r1c, r3d + r1d),
            // Top:    w - y >= 0
            Plane::from_coefficients(r3a - r1a, r3b - r1b, r3c - r1c, r3d - r1d),
            // Near:   z >= 0 (clip depth starts at zero)
            Plane::from_coefficients(r2a, r2b, r2c, r2d),
            // Far:    w - z >= 0
            Plane::from_coefficients(r3a - r2a, r3b - r2b, r3c - r2c, r3d - r2d),
        ];

        Self { planes }
    }

    /// Build a frustum directly from six inward-facing planes
    ///
    /// Plane order follows [`FrustumPlane`]. Useful for light volumes and
    /// tests that need exact plane coefficients.
    pub fn from_planes(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// The six bounding planes, indexable by [`FrustumPlane`]
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Check if a point is strictly inside the frustum
    ///
    /// Points lying exactly on a bounding plane are treated as outside.
    /// This conservative edge policy is relied upon by culling callers and
    /// must not be relaxed to `>=`.
    pub fn contains_point(&self, point: Point3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(point) > 0.0)
    }

    /// Classify a sphere against the frustum
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> Containment {
        let mut intersecting = false;

        for plane in &self.planes {
            let distance = plane.signed_distance(sphere.center);
            if distance < -sphere.radius {
                return Containment::Outside;
            }
            if distance < sphere.radius {
                intersecting = true;
            }
        }

        if intersecting {
            Containment::Intersecting
        } else {
            Containment::Inside
        }
    }

    /// Check if an axis-aligned box overlaps the frustum
    ///
    /// Conservative p-vertex test: the box is rejected only when the corner
    /// most aligned with a plane normal is behind that plane. False
    /// positives near frustum corners are acceptable for culling.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let p_vertex = Point3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            if plane.signed_distance(p_vertex) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext, Vec3, utils};

    /// Camera at the origin facing -Z: near 0.1, far 10, fov 60, square
    fn reference_frustum() -> Frustum {
        let view = Mat4::look_at(
            Vec3::zeros(),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let projection = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 0.1, 10.0);
        let view_projection = projection * Mat4::render_coordinate_transform() * view;
        Frustum::from_view_projection(&view_projection)
    }

    #[test]
    fn test_point_in_front_is_inside() {
        let frustum = reference_frustum();
        assert!(frustum.contains_point(Point3::new(0.0, 0.0, -5.0)));
        assert!(frustum.contains_point(Point3::new(1.0, 1.0, -5.0)));
    }

    #[test]
    fn test_point_outside_planes() {
        let frustum = reference_frustum();
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, -20.0))); // beyond far
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, -0.05))); // before near
        assert!(!frustum.contains_point(Point3::new(0.0, 0.0, 5.0))); // behind camera
        assert!(!frustum.contains_point(Point3::new(50.0, 0.0, -5.0))); // far left/right
    }

    #[test]
    fn test_point_exactly_on_plane_is_outside() {
        // Axis-aligned box frustum [-1, 1]^2 x [-10, -1] with exact
        // plane coefficients, so on-plane distances are exactly zero
        let frustum = Frustum::from_planes([
            Plane::from_coefficients(1.0, 0.0, 0.0, 1.0),   // left: x >= -1
            Plane::from_coefficients(-1.0, 0.0, 0.0, 1.0),  // right: x <= 1
            Plane::from_coefficients(0.0, 1.0, 0.0, 1.0),   // bottom: y >= -1
            Plane::from_coefficients(0.0, -1.0, 0.0, 1.0),  // top: y <= 1
            Plane::from_coefficients(0.0, 0.0, -1.0, -1.0), // near: z <= -1
            Plane::from_coefficients(0.0, 0.0, 1.0, 10.0),  // far: z >= -10
        ]);

        assert!(frustum.contains_point(Point3::new(0.0, 0.0, -5.0)));

        // Points exactly on each bounding plane are outside
        for point in [
            Point3::new(-1.0, 0.0, -5.0),
            Point3::new(1.0, 0.0, -5.0),
            Point3::new(0.0, -1.0, -5.0),
            Point3::new(0.0, 1.0, -5.0),
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(0.0, 0.0, -10.0),
        ] {
            let on_plane = frustum
                .planes()
                .iter()
                .any(|p| p.signed_distance(point) == 0.0);
            assert!(on_plane, "test point must lie exactly on a plane");
            assert!(!frustum.contains_point(point));
        }
    }

    #[test]
    fn test_sphere_classification_reference_scenario() {
        let frustum = reference_frustum();

        let centered = BoundingSphere::new(Point3::new(0.0, 0.0, -5.0), 0.4);
        assert_eq!(frustum.contains_sphere(&centered), Containment::Inside);

        let beyond_far = BoundingSphere::new(Point3::new(0.0, 0.0, -20.0), 0.4);
        assert_eq!(frustum.contains_sphere(&beyond_far), Containment::Outside);

        let straddling_far = BoundingSphere::new(Point3::new(0.0, 0.0, -10.0), 0.4);
        assert_eq!(
            frustum.contains_sphere(&straddling_far),
            Containment::Intersecting
        );
    }

    #[test]
    fn test_aabb_culling() {
        let frustum = reference_frustum();

        let visible = Aabb::from_center_half_extents(
            Point3::new(0.0, 0.0, -5.0),
            Vec3::new(0.5, 0.5, 0.5),
        );
        assert!(frustum.intersects_aabb(&visible));

        let hidden = Aabb::from_center_half_extents(
            Point3::new(0.0, 0.0, 20.0),
            Vec3::new(0.5, 0.5, 0.5),
        );
        assert!(!frustum.intersects_aabb(&hidden));

        // Straddling the far plane still draws
        let straddling = Aabb::from_center_half_extents(
            Point3::new(0.0, 0.0, -10.0),
            Vec3::new(0.5, 0.5, 0.5),
        );
        assert!(frustum.intersects_aabb(&straddling));
    }
}
