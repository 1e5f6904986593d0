//! 3D camera with frustum extraction
//!
//! Matrix conventions: right-handed Y-up view space with -Z forward, and a
//! separate coordinate transform applied between view and projection so the
//! projection matrices map depth to [0, 1]. The combined chain is P * X * V.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::geometry::Frustum;
use crate::render::{ClearOptions, RenderTargetHandle};

/// Projection parameters for a camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        /// Aspect ratio (width / height)
        aspect: f32,
        /// Near clipping distance (> 0)
        near: f32,
        /// Far clipping distance (> near)
        far: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// Half the vertical extent of the view volume
        half_height: f32,
        /// Aspect ratio (width / height)
        aspect: f32,
        /// Near clipping distance
        near: f32,
        /// Far clipping distance (> near)
        far: f32,
    },
}

/// 3D camera for perspective and orthographic rendering
///
/// Matrices are computed on demand; the camera caches nothing, so pre-cull
/// hooks may freely swap the projection for a single pass.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Projection parameters
    pub projection: Projection,

    /// Render target this camera draws to (`None` for the backbuffer)
    pub render_target: Option<RenderTargetHandle>,

    /// Default clear behavior, applied on the camera's first sub-layer pass
    /// unless a layer overrides it
    pub clear_options: ClearOptions,
}

impl Camera {
    /// Create a perspective camera looking at the origin
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            projection: Projection::Perspective {
                fov_y: utils::deg_to_rad(fov_degrees),
                aspect,
                near,
                far,
            },
            render_target: None,
            clear_options: ClearOptions::default(),
        }
    }

    /// Create an orthographic camera looking at the origin
    pub fn orthographic(position: Vec3, half_height: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            projection: Projection::Orthographic {
                half_height,
                aspect,
                near,
                far,
            },
            render_target: None,
            clear_options: ClearOptions::default(),
        }
    }

    /// Point the camera at a target with a custom up vector
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// Update the aspect ratio, e.g. after a viewport resize
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        match &mut self.projection {
            Projection::Perspective { aspect: a, .. }
            | Projection::Orthographic { aspect: a, .. } => *a = aspect,
        }
    }

    /// Unit vector from the camera toward its target
    ///
    /// This is the axis of the default camera-relative distance metric used
    /// by depth-sorted layers.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// View matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Projection matrix with depth mapped to [0, 1]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective(fov_y, aspect, near, far),
            Projection::Orthographic {
                half_height,
                aspect,
                near,
                far,
            } => Mat4::orthographic(half_height, aspect, near, far),
        }
    }

    /// Combined view-projection matrix (P * X * V)
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * Mat4::render_coordinate_transform() * self.view_matrix()
    }

    /// World-space frustum bounding this camera's visible volume
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection_matrix())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 3.0, 3.0), 45.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use crate::geometry::{BoundingSphere, Containment};
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_points_at_target() {
        let mut camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));

        assert_relative_eq!(camera.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_frustum_matches_reference_scenario() {
        // Camera at the origin facing -Z, near 0.1, far 10, fov 60
        let mut camera = Camera::perspective(Vec3::zeros(), 60.0, 1.0, 0.1, 10.0);
        camera.look_at(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 1.0, 0.0));
        let frustum = camera.frustum();

        let near_sphere = BoundingSphere::new(Point3::new(0.0, 0.0, -5.0), 0.4);
        assert_eq!(frustum.contains_sphere(&near_sphere), Containment::Inside);

        let far_sphere = BoundingSphere::new(Point3::new(0.0, 0.0, -20.0), 0.4);
        assert_eq!(frustum.contains_sphere(&far_sphere), Containment::Outside);
    }

    #[test]
    fn test_orthographic_frustum_is_box_shaped() {
        let mut camera = Camera::orthographic(Vec3::zeros(), 2.0, 1.0, 0.1, 10.0);
        camera.look_at(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 1.0, 0.0));
        let frustum = camera.frustum();

        // Unlike a perspective frustum, lateral extent does not grow with
        // distance
        assert!(frustum.contains_point(Point3::new(1.9, 0.0, -0.2)));
        assert!(frustum.contains_point(Point3::new(1.9, 0.0, -9.8)));
        assert!(!frustum.contains_point(Point3::new(2.1, 0.0, -5.0)));
    }
}
