//! Math utilities and types
//!
//! Provides fundamental math types for 3D rendering. All engine code uses
//! these aliases rather than importing `nalgebra` types directly.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Create a transform from a transformation matrix
    pub fn from_matrix(matrix: Mat4) -> Self {
        // Extract position
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        // Extract scale from the matrix columns
        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
        let scale = Vec3::new(scale_x, scale_y, scale_z);

        // Extract rotation by removing scale from the rotation matrix
        let rotation_matrix = Matrix3::new(
            matrix.m11 / scale_x, matrix.m12 / scale_y, matrix.m13 / scale_z,
            matrix.m21 / scale_x, matrix.m22 / scale_y, matrix.m23 / scale_z,
            matrix.m31 / scale_x, matrix.m32 / scale_y, matrix.m33 / scale_z,
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Combine this transform with another (self is the parent)
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale.component_mul(&other.position)),
            rotation: self.rotation * other.rotation,
            scale: self.scale.component_mul(&other.scale),
        }
    }

    /// Get the inverse transform
    pub fn inverse(&self) -> Transform {
        let inv_scale = Vec3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);
        let inv_rotation = self.rotation.inverse();
        let inv_position = inv_rotation * (-self.position.component_mul(&inv_scale));

        Transform {
            position: inv_position,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }
}

/// Extension trait for Mat4 with projection and view helpers
pub trait Mat4Ext {
    /// Create a perspective projection matrix with depth mapped to [0, 1]
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix with depth mapped to [0, 1]
    fn orthographic(half_height: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a look-at view matrix (right-handed, -Z forward in view space)
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Intermediate coordinate transform between view space and clip space
    ///
    /// Flips Y and Z so that view-space -Z forward becomes +Z depth with the
    /// [0, 1] range the projection matrices produce. Applied as P * X * V.
    fn render_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();

        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0; // Perspective divide trigger

        result
    }

    fn orthographic(half_height: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let half_width = half_height * aspect;

        let mut result = Mat4::identity();

        result[(0, 0)] = 1.0 / half_width;
        result[(1, 1)] = 1.0 / half_height;
        result[(2, 2)] = 1.0 / (far - near);
        result[(2, 3)] = -near / (far - near);

        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn render_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, -1.0, 0.0, 0.0,
            0.0, 0.0, -1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_identity() {
        let transform = Transform::identity();

        assert_eq!(transform.position, Vec3::zeros());
        assert_relative_eq!(transform.rotation, Quat::identity(), epsilon = EPSILON);
        assert_eq!(transform.scale, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_transform_combine_order() {
        let parent = Transform {
            position: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), constants::PI / 2.0),
            scale: Vec3::new(1.0, 1.0, 1.0),
        };
        let child = Transform::from_position(Vec3::new(0.0, 0.0, 1.0));

        let combined = parent.combine(&child);

        // Child offset (0,0,1) rotated 90 degrees around Y lands at (1,0,0),
        // then the parent translation moves it to (2,0,0)
        assert_relative_eq!(combined.position, Vec3::new(2.0, 0.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_matrix_roundtrip() {
        let original = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_axis_angle(&nalgebra::Unit::new_normalize(Vec3::new(1.0, 1.0, 1.0)), 0.5),
            scale: Vec3::new(2.0, 1.5, 0.8),
        };

        let reconstructed = Transform::from_matrix(original.to_matrix());

        assert_relative_eq!(reconstructed.position, original.position, epsilon = EPSILON);
        assert_relative_eq!(reconstructed.scale, original.scale, epsilon = EPSILON);

        // Quaternions might flip sign but represent the same rotation
        let dot = original.rotation.coords.dot(&reconstructed.rotation.coords);
        assert!(dot.abs() > 0.999, "rotation mismatch: dot product = {}", dot);
    }

    #[test]
    fn test_transform_inverse() {
        let transform = Transform {
            position: Vec3::new(2.0, 3.0, 1.0),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), 0.785),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let should_be_identity = transform.combine(&transform.inverse());

        assert_relative_eq!(should_be_identity.position, Vec3::zeros(), epsilon = EPSILON);
        assert_relative_eq!(should_be_identity.scale, Vec3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 0.1, 10.0);

        // A point on the near plane (view depth 0.1 after the coordinate
        // transform) maps to NDC z = 0, the far plane to z = 1
        let near_point = proj * Vec4::new(0.0, 0.0, 0.1, 1.0);
        let far_point = proj * Vec4::new(0.0, 0.0, 10.0, 1.0);

        assert_relative_eq!(near_point.z / near_point.w, 0.0, epsilon = EPSILON);
        assert_relative_eq!(far_point.z / far_point.w, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_forward_maps_to_negative_z() {
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
        );

        // The look target sits ahead of the camera, i.e. at negative view Z
        let target_in_view = view.transform_point(&Point3::new(0.0, 0.0, 0.0));
        assert!(target_in_view.z < 0.0);
        assert_relative_eq!(target_in_view.z, -5.0, epsilon = EPSILON);
    }
}
