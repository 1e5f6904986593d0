//! Render layers
//!
//! A layer is a named bucket of mesh instances, lights, and cameras with
//! its own sort discipline and culling settings. Instances are routed to
//! an opaque or transparent partition by their material's blend state;
//! the two partitions are scheduled independently by the composition.

use log::warn;

use crate::render::{
    ClearOptions, CullMask, InstanceKey, LayerHook, RenderScene, RenderTargetHandle, ShaderPass,
};
use crate::scene::{CameraKey, LightKey};

/// Identifier for a layer, unique within a composition
pub type LayerId = u32;

/// Which partition of a layer a sub-pass draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// Depth-tested opaque and alpha-tested geometry
    Opaque,
    /// Blended geometry requiring back-to-front submission
    Transparent,
}

/// Ordering discipline applied to a partition after culling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Submission order as registered
    None,
    /// Ascending `draw_order`; ties keep registration order
    Manual,
    /// Group by material then mesh to minimize state changes
    MaterialMesh,
    /// Decreasing camera distance
    BackToFront,
    /// Increasing camera distance
    FrontToBack,
}

#[derive(Debug)]
struct Partition {
    instances: Vec<InstanceKey>,
    sort_mode: SortMode,
}

/// A named group of drawables with shared sort and cull settings
pub struct Layer {
    /// Identifier unique within a composition
    pub id: LayerId,
    /// Display name for lookups and logs
    pub name: String,
    /// Disabled layers are skipped entirely, including their cameras
    pub enabled: bool,
    /// Mask tested against each instance's cull mask
    pub cull_mask: CullMask,
    /// Whether frustum culling runs for this layer's passes
    pub frustum_culling: bool,
    /// Render target override for this layer (`None` follows the camera)
    pub render_target: Option<RenderTargetHandle>,
    /// Clear override applied when this layer's first sub-pass begins
    pub clear_override: Option<ClearOptions>,
    /// Shader pass this layer's materials are drawn with
    pub shader_pass: ShaderPass,
    /// Draw another layer's instance lists instead of this layer's own,
    /// keeping this layer's shader pass, target, and cull settings
    pub reference: Option<LayerId>,
    /// Optional strategy hook around this layer's cull and draw stages
    pub hook: Option<Box<dyn LayerHook>>,
    opaque: Partition,
    transparent: Partition,
    lights: Vec<LightKey>,
    cameras: Vec<CameraKey>,
}

impl Layer {
    /// Create an enabled layer with default sort modes: state-sorted
    /// opaques, back-to-front transparents
    pub fn new(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            cull_mask: CullMask::ALL,
            frustum_culling: true,
            render_target: None,
            clear_override: None,
            shader_pass: ShaderPass::Forward,
            reference: None,
            hook: None,
            opaque: Partition {
                instances: Vec::new(),
                sort_mode: SortMode::MaterialMesh,
            },
            transparent: Partition {
                instances: Vec::new(),
                sort_mode: SortMode::BackToFront,
            },
            lights: Vec::new(),
            cameras: Vec::new(),
        }
    }

    /// Add an instance, routed by its material's blend state
    ///
    /// Instances whose material handle is stale go to the opaque partition
    /// with a warning. Adding a key the layer already holds is a no-op.
    pub fn add_instance(&mut self, scene: &RenderScene, key: InstanceKey) {
        let transparent = match scene.instances.get(key) {
            Some(instance) => match scene.materials.get(instance.material) {
                Some(material) => material.is_transparent(),
                None => {
                    warn!(
                        "Layer '{}': instance has a stale material handle, routing opaque",
                        self.name
                    );
                    false
                }
            },
            None => {
                warn!("Layer '{}': ignoring stale instance handle", self.name);
                return;
            }
        };
        let partition = if transparent {
            &mut self.transparent
        } else {
            &mut self.opaque
        };
        if !partition.instances.contains(&key) {
            partition.instances.push(key);
        }
    }

    /// Remove an instance from both partitions
    ///
    /// Removing a key the layer does not hold is a silent no-op.
    pub fn remove_instance(&mut self, key: InstanceKey) {
        self.opaque.instances.retain(|&k| k != key);
        self.transparent.instances.retain(|&k| k != key);
    }

    /// Instances in a partition, in registration order
    pub fn instances(&self, kind: PartitionKind) -> &[InstanceKey] {
        match kind {
            PartitionKind::Opaque => &self.opaque.instances,
            PartitionKind::Transparent => &self.transparent.instances,
        }
    }

    /// Sort discipline of a partition
    pub fn sort_mode(&self, kind: PartitionKind) -> SortMode {
        match kind {
            PartitionKind::Opaque => self.opaque.sort_mode,
            PartitionKind::Transparent => self.transparent.sort_mode,
        }
    }

    /// Replace the sort discipline of a partition
    pub fn set_sort_mode(&mut self, kind: PartitionKind, mode: SortMode) {
        match kind {
            PartitionKind::Opaque => self.opaque.sort_mode = mode,
            PartitionKind::Transparent => self.transparent.sort_mode = mode,
        }
    }

    /// Register a light with this layer; duplicates are ignored
    pub fn add_light(&mut self, key: LightKey) {
        if !self.lights.contains(&key) {
            self.lights.push(key);
        }
    }

    /// Remove a light; absent keys are a silent no-op
    pub fn remove_light(&mut self, key: LightKey) {
        self.lights.retain(|&k| k != key);
    }

    /// Lights registered with this layer
    pub fn lights(&self) -> &[LightKey] {
        &self.lights
    }

    /// Register a camera with this layer; duplicates are ignored
    pub fn add_camera(&mut self, key: CameraKey) {
        if !self.cameras.contains(&key) {
            self.cameras.push(key);
        }
    }

    /// Remove a camera; absent keys are a silent no-op
    pub fn remove_camera(&mut self, key: CameraKey) {
        self.cameras.retain(|&k| k != key);
    }

    /// Cameras registered with this layer, in registration order
    pub fn cameras(&self) -> &[CameraKey] {
        &self.cameras
    }

    /// Drop stale instance keys from both partitions
    pub(crate) fn prune_stale(&mut self, scene: &RenderScene) {
        self.opaque
            .instances
            .retain(|&k| scene.instances.contains_key(k));
        self.transparent
            .instances
            .retain(|&k| scene.instances.contains_key(k));
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("opaque", &self.opaque.instances.len())
            .field("transparent", &self.transparent.instances.len())
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{BlendMode, Material, Mesh, MeshInstance};

    fn scene_with_instances() -> (RenderScene, InstanceKey, InstanceKey) {
        let mut scene = RenderScene::new();
        let mesh = scene.add_mesh(Mesh::cube("box", 1.0));
        let opaque_mat = scene.add_material(Material::new("plain"));
        let glass_mat =
            scene.add_material(Material::new("glass").with_blend_mode(BlendMode::AlphaBlend));
        let node = scene.graph.add_child(scene.graph.root(), "box");
        let solid = scene.add_instance(MeshInstance::new(mesh, opaque_mat, node));
        let glass = scene.add_instance(MeshInstance::new(mesh, glass_mat, node));
        (scene, solid, glass)
    }

    #[test]
    fn test_routing_follows_material_blend_state() {
        let (scene, solid, glass) = scene_with_instances();
        let mut layer = Layer::new(0, "world");

        layer.add_instance(&scene, solid);
        layer.add_instance(&scene, glass);

        assert_eq!(layer.instances(PartitionKind::Opaque), &[solid]);
        assert_eq!(layer.instances(PartitionKind::Transparent), &[glass]);
    }

    #[test]
    fn test_double_add_is_ignored() {
        let (scene, solid, _) = scene_with_instances();
        let mut layer = Layer::new(0, "world");

        layer.add_instance(&scene, solid);
        layer.add_instance(&scene, solid);
        assert_eq!(layer.instances(PartitionKind::Opaque).len(), 1);
    }

    #[test]
    fn test_remove_absent_is_silent() {
        let (scene, solid, glass) = scene_with_instances();
        let mut layer = Layer::new(0, "world");
        layer.add_instance(&scene, solid);

        layer.remove_instance(glass); // never added
        layer.remove_instance(solid);
        layer.remove_instance(solid); // already gone

        assert!(layer.instances(PartitionKind::Opaque).is_empty());
    }

    #[test]
    fn test_light_and_camera_registration() {
        let mut layer = Layer::new(0, "world");
        let light = LightKey::default();
        let camera = CameraKey::default();

        layer.add_light(light);
        layer.add_light(light);
        layer.add_camera(camera);

        assert_eq!(layer.lights().len(), 1);
        assert_eq!(layer.cameras(), &[camera]);

        layer.remove_light(light);
        layer.remove_camera(camera);
        layer.remove_camera(camera); // silent
        assert!(layer.lights().is_empty());
        assert!(layer.cameras().is_empty());
    }
}
