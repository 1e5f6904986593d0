//! Light sources registered with layers
//!
//! Only the culling- and shadow-relevant surface of a light lives here:
//! the shading model consumes these values through the device boundary.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::geometry::Frustum;
use crate::render::RenderTargetHandle;

slotmap::new_key_type! {
    /// Stable handle to a light owned by a render scene
    pub struct LightKey;
}

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Infinitely distant light with parallel rays
    Directional,
    /// Omnidirectional point light with a finite range
    Point,
    /// Cone-shaped spot light
    Spot,
}

/// How a shadow-casting light refreshes its shadow map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowUpdateMode {
    /// Never render a shadow pass for this light
    None,
    /// Render one shadow pass, then switch to `None`
    ThisFrame,
    /// Render a shadow pass every frame
    Realtime,
}

/// A light source
#[derive(Debug, Clone)]
pub struct Light {
    /// Display name for lookups and logs
    pub name: String,
    /// Light kind
    pub kind: LightKind,
    /// Linear RGB color
    pub color: [f32; 3],
    /// Intensity multiplier
    pub intensity: f32,
    /// World position (ignored for directional lights)
    pub position: Vec3,
    /// World direction (ignored for point lights)
    pub direction: Vec3,
    /// Influence range for point and spot lights
    pub range: f32,
    /// Full cone angle in degrees for spot lights
    pub cone_angle: f32,
    /// Whether the light participates at all
    pub enabled: bool,
    /// Whether the light casts shadows
    pub cast_shadows: bool,
    /// Shadow refresh policy
    pub shadow_mode: ShadowUpdateMode,
    /// Half extent of a directional light's shadow volume
    pub shadow_extent: f32,
    /// Depth target shadow passes render into (`None` leaves the current
    /// target bound)
    pub shadow_map: Option<RenderTargetHandle>,
}

impl Light {
    /// Create a directional light pointing along `direction`
    pub fn directional(name: impl Into<String>, direction: Vec3) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Directional,
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            range: 0.0,
            cone_angle: 0.0,
            enabled: true,
            cast_shadows: false,
            shadow_mode: ShadowUpdateMode::None,
            shadow_extent: 50.0,
            shadow_map: None,
        }
    }

    /// Create a point light at `position` with the given range
    pub fn point(name: impl Into<String>, position: Vec3, range: f32) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Point,
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            position,
            direction: Vec3::new(0.0, -1.0, 0.0),
            range,
            cone_angle: 0.0,
            enabled: true,
            cast_shadows: false,
            shadow_mode: ShadowUpdateMode::None,
            shadow_extent: 0.0,
            shadow_map: None,
        }
    }

    /// Create a spot light with a full cone angle in degrees
    pub fn spot(name: impl Into<String>, position: Vec3, direction: Vec3, range: f32, cone_angle: f32) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Spot,
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            position,
            direction: direction.normalize(),
            range,
            cone_angle,
            enabled: true,
            cast_shadows: false,
            shadow_mode: ShadowUpdateMode::None,
            shadow_extent: 0.0,
            shadow_map: None,
        }
    }

    /// View-projection matrices for this light's shadow passes
    ///
    /// Directional lights use a single orthographic volume around their
    /// shadow extent; spot lights a single perspective frustum matching the
    /// cone; point lights six 90-degree cubemap faces.
    pub fn shadow_view_projections(&self) -> Vec<Mat4> {
        match self.kind {
            LightKind::Directional => {
                let eye = -self.direction * self.shadow_extent;
                let view = Mat4::look_at(eye, eye + self.direction, up_for(self.direction));
                let projection = Mat4::orthographic(
                    self.shadow_extent,
                    1.0,
                    0.01,
                    self.shadow_extent * 2.0,
                );
                vec![view_projection(projection, view)]
            }
            LightKind::Spot => {
                let view = Mat4::look_at(
                    self.position,
                    self.position + self.direction,
                    up_for(self.direction),
                );
                let projection = Mat4::perspective(
                    utils::deg_to_rad(self.cone_angle),
                    1.0,
                    0.01,
                    self.range.max(0.02),
                );
                vec![view_projection(projection, view)]
            }
            LightKind::Point => cubemap_face_directions()
                .iter()
                .map(|&dir| {
                    let view = Mat4::look_at(self.position, self.position + dir, up_for(dir));
                    let projection = Mat4::perspective(
                        utils::deg_to_rad(90.0),
                        1.0,
                        0.01,
                        self.range.max(0.02),
                    );
                    view_projection(projection, view)
                })
                .collect(),
        }
    }

    /// Frusta to cull shadow casters against, one per shadow pass
    pub fn shadow_frusta(&self) -> Vec<Frustum> {
        self.shadow_view_projections()
            .iter()
            .map(Frustum::from_view_projection)
            .collect()
    }
}

fn cubemap_face_directions() -> [Vec3; 6] {
    [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, -1.0),
    ]
}

fn view_projection(projection: Mat4, view: Mat4) -> Mat4 {
    projection * Mat4::render_coordinate_transform() * view
}

/// Pick an up vector not parallel to the view direction
fn up_for(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 {
        Vec3::new(0.0, 0.0, 1.0)
    } else {
        Vec3::new(0.0, 1.0, 0.0)
    }
}
