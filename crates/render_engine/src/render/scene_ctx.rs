//! Render scene: the explicit context object for a frame
//!
//! All shared state a render pass touches lives here, passed explicitly to
//! the renderer rather than reached through globals. Resources are arena
//! allocated; handles stay cheap to copy and go stale safely when their
//! resource is removed.

use slotmap::SlotMap;

use crate::render::{
    InstanceKey, Material, MaterialKey, Mesh, MeshInstance, MeshKey,
};
use crate::scene::{Camera, CameraKey, Light, LightKey, SceneGraph};

/// Owns the scene graph and every resource arena a frame draws from
#[derive(Debug, Default)]
pub struct RenderScene {
    /// Transform hierarchy
    pub graph: SceneGraph,
    /// Mesh arena
    pub meshes: SlotMap<MeshKey, Mesh>,
    /// Material arena
    pub materials: SlotMap<MaterialKey, Material>,
    /// Mesh instance arena
    pub instances: SlotMap<InstanceKey, MeshInstance>,
    /// Light arena
    pub lights: SlotMap<LightKey, Light>,
    /// Camera arena
    pub cameras: SlotMap<CameraKey, Camera>,
}

impl RenderScene {
    /// Create an empty scene with just a root node
    pub fn new() -> Self {
        Self {
            graph: SceneGraph::new(),
            meshes: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            instances: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            cameras: SlotMap::with_key(),
        }
    }

    /// Register a mesh and return its handle
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    /// Register a material and return its handle
    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.materials.insert(material)
    }

    /// Register a mesh instance and return its handle
    pub fn add_instance(&mut self, instance: MeshInstance) -> InstanceKey {
        self.instances.insert(instance)
    }

    /// Register a light and return its handle
    pub fn add_light(&mut self, light: Light) -> LightKey {
        self.lights.insert(light)
    }

    /// Register a camera and return its handle
    pub fn add_camera(&mut self, camera: Camera) -> CameraKey {
        self.cameras.insert(camera)
    }

    /// Remove a mesh instance
    ///
    /// Layers referencing the key drop it lazily the next time they are
    /// walked; removing an absent key is a no-op.
    pub fn remove_instance(&mut self, key: InstanceKey) -> Option<MeshInstance> {
        self.instances.remove(key)
    }

    /// Flush dirty world transforms and refresh instance bounds
    ///
    /// Runs once at the start of a frame so culling and sorting read
    /// settled world-space boxes.
    pub fn update_bounds(&mut self) {
        self.graph.update_world_transforms();
        for (_, instance) in &mut self.instances {
            let Some(world) = self.graph.world_transform(instance.node) else {
                continue;
            };
            let Some(mesh) = self.meshes.get(instance.mesh) else {
                continue;
            };
            let local = *mesh.aabb();
            instance.update_world_aabb(&local, &world);
        }
    }

    /// Whether an instance's scene node is enabled through its whole
    /// ancestor chain
    pub fn instance_enabled(&self, instance: &MeshInstance) -> bool {
        self.graph.is_enabled_in_hierarchy(instance.node)
    }
}
