//! Mesh instances: the unit of culling, sorting, and drawing
//!
//! An instance ties a mesh to a material and a scene node. Its world-space
//! bounding box is refreshed from the node's world matrix at the start of a
//! frame and everything downstream (frustum culling, distance sorting,
//! batch volume splitting) reads that cached box.

use std::collections::BTreeSet;

use bitflags::bitflags;

use crate::foundation::math::Vec3;
use crate::geometry::Aabb;
use crate::render::{BatchGroupId, MaterialKey, MeshKey};
use crate::scene::{LightKey, NodeKey};

slotmap::new_key_type! {
    /// Stable handle to a mesh instance owned by a render scene
    pub struct InstanceKey;
}

bitflags! {
    /// Camera/instance visibility mask
    ///
    /// An instance is considered by a camera pass only when the layer's
    /// mask and the instance's mask share a bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CullMask: u32 {
        /// Default group for ordinary scene content
        const DEFAULT = 1 << 0;
        /// Mask matching every group
        const ALL = u32::MAX;
    }
}

/// How an instance is rasterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderStyle {
    /// Filled triangles
    #[default]
    Solid,
    /// Edges only
    Wireframe,
    /// Vertices only
    Points,
}

/// Per-instance shader inputs that batching must not merge across
///
/// Two instances sharing a material can still require different programs
/// when one is lightmapped, lit by a different baked light set, or compiled
/// with extra defines. The batcher splits on inequality of this struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderParams {
    /// Whether the instance samples a baked lightmap
    pub lightmapped: bool,
    /// Baked lights folded into the instance's shading
    pub static_lights: BTreeSet<LightKey>,
    /// Extra preprocessor defines for the instance's programs
    pub defines: BTreeSet<String>,
}

/// Custom camera-distance metric for transparency sorting
///
/// Receives the instance, the camera position, and the camera forward
/// vector; returns the sort distance (larger draws earlier in
/// back-to-front layers).
pub type SortDistanceFn = fn(&MeshInstance, Vec3, Vec3) -> f32;

/// Default sort metric: distance of a world point along the camera forward
/// axis
pub fn default_sort_distance(center: Vec3, camera_position: Vec3, camera_forward: Vec3) -> f32 {
    camera_forward.dot(&(center - camera_position))
}

/// A single drawable: one mesh, one material, one transform
#[derive(Debug, Clone)]
pub struct MeshInstance {
    /// Geometry to draw
    pub mesh: MeshKey,
    /// Surface to draw it with
    pub material: MaterialKey,
    /// Scene node providing the world transform
    pub node: NodeKey,
    /// Application-controlled visibility; invisible instances are skipped
    /// before culling
    pub visible: bool,
    /// Set by the renderer when any camera or shadow pass saw the instance
    /// this frame; post-cull hooks may override it
    pub visible_this_frame: bool,
    /// Visibility mask tested against the layer's mask
    pub cull_mask: CullMask,
    /// Explicit order for manually sorted layers; lower draws first
    pub draw_order: i32,
    /// Rasterization style
    pub render_style: RenderStyle,
    /// Hardware instance count; 0 and 1 both submit one instance
    pub instance_count: u32,
    /// Whether the instance is drawn into shadow maps
    pub cast_shadows: bool,
    /// Custom sort metric; `None` uses the camera-axis default
    pub sort_distance: Option<SortDistanceFn>,
    /// Shader-affecting inputs the batcher keys on
    pub shader_params: ShaderParams,
    /// Batch group this instance was registered with, if any
    pub batch_group: Option<BatchGroupId>,
    pub(crate) suppressed_by_batch: bool,
    world_aabb: Aabb,
}

impl MeshInstance {
    /// Create a visible instance with default flags
    pub fn new(mesh: MeshKey, material: MaterialKey, node: NodeKey) -> Self {
        Self {
            mesh,
            material,
            node,
            visible: true,
            visible_this_frame: false,
            cull_mask: CullMask::DEFAULT,
            draw_order: 0,
            render_style: RenderStyle::default(),
            instance_count: 0,
            cast_shadows: true,
            sort_distance: None,
            shader_params: ShaderParams::default(),
            batch_group: None,
            suppressed_by_batch: false,
            world_aabb: Aabb::zero(),
        }
    }

    /// World-space bounding box as of the last bounds update
    pub fn world_aabb(&self) -> &Aabb {
        &self.world_aabb
    }

    /// Recompute the world box from the mesh's local box and a world matrix
    pub(crate) fn update_world_aabb(
        &mut self,
        local: &Aabb,
        world_matrix: &crate::foundation::math::Mat4,
    ) {
        let source = *local;
        self.world_aabb.set_from_transformed_aabb(&source, world_matrix);
    }

    /// Whether the instance submits its own draw calls
    ///
    /// False while a generated batch draws on its behalf.
    pub fn drawable(&self) -> bool {
        self.visible && !self.suppressed_by_batch
    }

    /// Sort distance for a camera, honoring the custom metric when set
    pub fn sort_distance_for(&self, camera_position: Vec3, camera_forward: Vec3) -> f32 {
        match self.sort_distance {
            Some(metric) => metric(self, camera_position, camera_forward),
            None => {
                let center = self.world_aabb.center();
                default_sort_distance(center.coords, camera_position, camera_forward)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Point3, Transform, Vec3};
    use approx::assert_relative_eq;

    fn instance() -> MeshInstance {
        MeshInstance::new(MeshKey::default(), MaterialKey::default(), NodeKey::default())
    }

    #[test]
    fn test_world_aabb_follows_transform() {
        let mut inst = instance();
        let local = Aabb::from_center_half_extents(Point3::origin(), Vec3::new(1.0, 1.0, 1.0));
        let world = Transform::from_position(Vec3::new(10.0, 0.0, 0.0)).to_matrix();

        inst.update_world_aabb(&local, &world);
        assert_relative_eq!(inst.world_aabb().center(), Point3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_default_sort_distance_is_along_camera_axis() {
        let mut inst = instance();
        let local = Aabb::from_center_half_extents(Point3::origin(), Vec3::new(0.5, 0.5, 0.5));
        inst.update_world_aabb(&local, &Mat4::identity());

        // Camera at z=5 looking down -Z: origin is 5 units ahead
        let d = inst.sort_distance_for(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(d, 5.0);

        // A point behind the camera has negative distance
        let d = inst.sort_distance_for(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(d, -5.0);
    }

    #[test]
    fn test_custom_sort_metric_wins() {
        let mut inst = instance();
        inst.sort_distance = Some(|_, _, _| 42.0);
        assert_relative_eq!(inst.sort_distance_for(Vec3::zeros(), Vec3::zeros()), 42.0);
    }

    #[test]
    fn test_batched_instance_is_not_drawable() {
        let mut inst = instance();
        assert!(inst.drawable());
        inst.suppressed_by_batch = true;
        assert!(!inst.drawable());
    }
}
