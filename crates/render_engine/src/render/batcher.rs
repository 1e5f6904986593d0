//! Draw call batching
//!
//! The batch manager merges compatible mesh instances into single draws.
//! Instances opt in by pointing at a batch group; when the group is
//! regenerated its members are partitioned into compatible sets (same
//! material, same shader-affecting parameters, same rasterization style)
//! and each set becomes one merged mesh plus one generated instance, with
//! the originals suppressed. Static groups bake world transforms into the
//! merged vertices once; dynamic groups keep their sources and re-transform
//! on demand.
//!
//! A set is split further when merging would exceed the vertex ceiling,
//! the member ceiling, or grow the merged bounds past the extent ceiling
//! (oversized batches defeat frustum culling).

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::config::RenderConfig;
use crate::events::EventDispatcher;
use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::geometry::Aabb;
use crate::render::{
    InstanceKey, LayerComposition, LayerId, MaterialKey, Mesh, MeshInstance, MeshKey, RenderStyle,
    RenderScene, ShaderParams, Vertex,
};
use crate::scene::NodeKey;

/// Identifier for a batch group
pub type BatchGroupId = u32;

/// A named batching policy instances opt into
#[derive(Debug, Clone)]
pub struct BatchGroup {
    /// Group identifier
    pub id: BatchGroupId,
    /// Display name for logs
    pub name: String,
    /// Dynamic groups keep their sources and support re-transformation;
    /// static groups bake transforms once
    pub dynamic: bool,
    /// Layer the generated instances are registered with
    pub layer: LayerId,
    /// Extent ceiling override; `None` uses the configured default
    pub max_extent: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
struct BatchSource {
    instance: InstanceKey,
    vertex_offset: u32,
}

/// One generated merged draw
#[derive(Debug)]
pub struct Batch {
    /// Group this batch belongs to
    pub group: BatchGroupId,
    /// Generated mesh holding the merged geometry
    pub mesh: MeshKey,
    /// Generated instance submitted in place of the sources
    pub instance: InstanceKey,
    /// Whether the batch is re-transformable
    pub dynamic: bool,
    sources: Vec<BatchSource>,
}

impl Batch {
    /// Instances this batch draws on behalf of
    pub fn source_instances(&self) -> impl Iterator<Item = InstanceKey> + '_ {
        self.sources.iter().map(|s| s.instance)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CompatKey {
    material: MaterialKey,
    params: ShaderParams,
    style: RenderStyle,
    cast_shadows: bool,
}

/// Batching change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEvent {
    /// A dirty group's batches were rebuilt
    GroupRegenerated(BatchGroupId),
    /// A group was removed and its sources restored
    GroupRemoved(BatchGroupId),
}

/// Merges compatible mesh instances into single draw calls
#[derive(Debug)]
pub struct BatchManager {
    /// Change notifications, fired on regenerate and group removal
    pub events: EventDispatcher<BatchEvent>,
    groups: HashMap<BatchGroupId, BatchGroup>,
    batches: Vec<Batch>,
    dirty: HashSet<BatchGroupId>,
    next_group: BatchGroupId,
    batch_root: Option<NodeKey>,
    max_vertices: u32,
    max_members: u32,
    default_extent: f32,
}

impl BatchManager {
    /// Create a manager with ceilings from the config
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            events: EventDispatcher::new(),
            groups: HashMap::new(),
            batches: Vec::new(),
            dirty: HashSet::new(),
            next_group: 0,
            batch_root: None,
            max_vertices: config.max_batch_vertices,
            max_members: config.max_instance_batch,
            default_extent: config.max_batch_extent,
        }
    }

    /// Create a batch group and return its id
    ///
    /// The group starts dirty; its batches materialize on the next
    /// [`generate`](Self::generate).
    pub fn create_group(
        &mut self,
        name: impl Into<String>,
        dynamic: bool,
        layer: LayerId,
        max_extent: Option<f32>,
    ) -> BatchGroupId {
        let id = self.next_group;
        self.next_group += 1;
        self.groups.insert(
            id,
            BatchGroup {
                id,
                name: name.into(),
                dynamic,
                layer,
                max_extent,
            },
        );
        self.dirty.insert(id);
        id
    }

    /// Group lookup
    pub fn group(&self, id: BatchGroupId) -> Option<&BatchGroup> {
        self.groups.get(&id)
    }

    /// Generated batches, across all groups
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Flag a group for regeneration on the next [`generate`](Self::generate)
    ///
    /// Unknown ids are a silent no-op.
    pub fn mark_group_dirty(&mut self, id: BatchGroupId) {
        if self.groups.contains_key(&id) {
            self.dirty.insert(id);
        }
    }

    /// Remove a group, destroying its batches and restoring its sources
    ///
    /// An absent id is a silent no-op.
    pub fn remove_group(
        &mut self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        id: BatchGroupId,
    ) {
        if self.groups.remove(&id).is_none() {
            return;
        }
        self.destroy_group_batches(scene, composition, id);
        self.dirty.remove(&id);
        self.events.dispatch(&BatchEvent::GroupRemoved(id));
    }

    /// Partition a group's members into merge-compatible sets
    ///
    /// Within each set the ceilings still apply during merging; this only
    /// resolves which instances may ever share a draw.
    pub fn prepare(&self, scene: &RenderScene, id: BatchGroupId) -> Vec<Vec<InstanceKey>> {
        let mut members: Vec<InstanceKey> = scene
            .instances
            .iter()
            .filter(|(_, inst)| inst.batch_group == Some(id))
            .map(|(key, _)| key)
            .collect();
        members.sort();

        let mut sets: Vec<(CompatKey, Vec<InstanceKey>)> = Vec::new();
        for key in members {
            let instance = &scene.instances[key];
            let compat = CompatKey {
                material: instance.material,
                params: instance.shader_params.clone(),
                style: instance.render_style,
                cast_shadows: instance.cast_shadows,
            };
            match sets.iter_mut().find(|(k, _)| *k == compat) {
                Some((_, set)) => set.push(key),
                None => sets.push((compat, vec![key])),
            }
        }
        sets.into_iter().map(|(_, set)| set).collect()
    }

    /// Materialize batches for one explicit, merge-compatible member list
    ///
    /// Member lists come from [`prepare`](Self::prepare); the ceilings
    /// still apply, so an oversized list splits into several batches.
    /// An unknown group id warns and does nothing; a list of fewer than
    /// two members is left unbatched.
    pub fn create(
        &mut self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        id: BatchGroupId,
        members: &[InstanceKey],
    ) {
        let Some(group) = self.groups.get(&id).cloned() else {
            warn!("create: no batch group with id {id}");
            return;
        };
        self.merge_set(scene, composition, &group, members);
        self.dirty.remove(&id);
    }

    /// Rebuild every dirty group's batches
    ///
    /// Destroys the group's previous batches, then merges each compatible
    /// set into as few draws as the ceilings allow. Sources are suppressed
    /// and the generated instances registered with the group's layer.
    pub fn generate(&mut self, scene: &mut RenderScene, composition: &mut LayerComposition) {
        let dirty: Vec<BatchGroupId> = self.dirty.drain().collect();
        for id in dirty {
            self.destroy_group_batches(scene, composition, id);
            let Some(group) = self.groups.get(&id).cloned() else {
                continue;
            };
            let sets = self.prepare(scene, id);
            for set in sets {
                self.merge_set(scene, composition, &group, &set);
            }
            self.events.dispatch(&BatchEvent::GroupRegenerated(id));
        }
    }

    /// Re-transform dynamic batches after their source nodes moved
    ///
    /// Rewrites the merged vertices from each source's current world
    /// matrix. Static batches are untouched.
    pub fn update_dynamic(&mut self, scene: &mut RenderScene) {
        for batch in self.batches.iter().filter(|b| b.dynamic) {
            let mut spans: Vec<(u32, Vec<Vertex>)> = Vec::new();
            for source in &batch.sources {
                let Some(instance) = scene.instances.get(source.instance) else {
                    continue;
                };
                let mesh_key = instance.mesh;
                let node = instance.node;
                let Some(world) = scene.graph.world_transform(node) else {
                    continue;
                };
                let Some(mesh) = scene.meshes.get(mesh_key) else {
                    continue;
                };
                let transformed = mesh
                    .vertices()
                    .iter()
                    .map(|v| transform_vertex(v, &world))
                    .collect();
                spans.push((source.vertex_offset, transformed));
            }
            let Some(merged) = scene.meshes.get_mut(batch.mesh) else {
                continue;
            };
            for (offset, vertices) in spans {
                let offset = offset as usize;
                merged.vertices_mut()[offset..offset + vertices.len()]
                    .copy_from_slice(&vertices);
            }
            merged.recompute_aabb();
        }
    }

    fn destroy_group_batches(
        &mut self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        id: BatchGroupId,
    ) {
        let layer = self.groups.get(&id).map(|g| g.layer);
        let removed: Vec<Batch> = {
            let mut kept = Vec::new();
            let mut removed = Vec::new();
            for batch in self.batches.drain(..) {
                if batch.group == id {
                    removed.push(batch);
                } else {
                    kept.push(batch);
                }
            }
            self.batches = kept;
            removed
        };
        for batch in removed {
            for source in &batch.sources {
                if let Some(instance) = scene.instances.get_mut(source.instance) {
                    instance.suppressed_by_batch = false;
                }
            }
            if let Some(layer) = layer {
                composition.remove_instance(layer, batch.instance);
            }
            scene.instances.remove(batch.instance);
            scene.meshes.remove(batch.mesh);
        }
    }

    fn merge_set(
        &mut self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        group: &BatchGroup,
        set: &[InstanceKey],
    ) {
        // Batching a single instance would just add overhead
        if set.len() < 2 {
            return;
        }
        let extent_ceiling = group.max_extent.unwrap_or(self.default_extent);

        let mut pending: Vec<InstanceKey> = Vec::new();
        let mut vertex_total: u32 = 0;
        let mut bounds: Option<Aabb> = None;

        let members: Vec<InstanceKey> = set.to_vec();
        for key in members {
            let Some(instance) = scene.instances.get(key) else {
                continue;
            };
            let Some(mesh) = scene.meshes.get(instance.mesh) else {
                warn!("Batch group '{}': member has a stale mesh handle", group.name);
                continue;
            };
            let count = mesh.vertex_count() as u32;
            if count > self.max_vertices {
                warn!(
                    "Batch group '{}': mesh '{}' alone exceeds the vertex ceiling, left unbatched",
                    group.name, mesh.name
                );
                continue;
            }
            let member_bounds = *instance.world_aabb();
            let grown = match &bounds {
                Some(current) => current.union(&member_bounds),
                None => member_bounds,
            };
            let over_vertices = vertex_total + count > self.max_vertices;
            let over_members = pending.len() as u32 >= self.max_members;
            let over_extent = exceeds_extent(&grown, extent_ceiling);
            if !pending.is_empty() && (over_vertices || over_members || over_extent) {
                self.emit_batch(scene, composition, group, &pending);
                pending.clear();
                vertex_total = 0;
                bounds = None;
            }
            vertex_total += count;
            bounds = Some(match &bounds {
                Some(current) => current.union(&member_bounds),
                None => member_bounds,
            });
            pending.push(key);
        }
        if pending.len() >= 2 {
            self.emit_batch(scene, composition, group, &pending);
        } else if let Some(&key) = pending.first() {
            // A leftover single member keeps drawing itself
            if let Some(instance) = scene.instances.get_mut(key) {
                instance.suppressed_by_batch = false;
            }
        }
    }

    fn emit_batch(
        &mut self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        group: &BatchGroup,
        members: &[InstanceKey],
    ) {
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut sources: Vec<BatchSource> = Vec::new();

        for &key in members {
            let instance = &scene.instances[key];
            let mesh_key = instance.mesh;
            let node = instance.node;
            let Some(world) = scene.graph.world_transform(node) else {
                continue;
            };
            let mesh = &scene.meshes[mesh_key];
            let offset = vertices.len() as u32;
            vertices.extend(mesh.vertices().iter().map(|v| transform_vertex(v, &world)));
            indices.extend(mesh.indices().iter().map(|&i| i + offset));
            sources.push(BatchSource {
                instance: key,
                vertex_offset: offset,
            });
        }
        if sources.len() < 2 {
            return;
        }

        let template = &scene.instances[sources[0].instance];
        let material = template.material;
        let params = template.shader_params.clone();
        let style = template.render_style;
        let cast_shadows = template.cast_shadows;

        let mesh_key = scene.add_mesh(Mesh::new(format!("batch:{}", group.name), vertices, indices));
        let node = self.batch_node(scene);
        let mut merged = MeshInstance::new(mesh_key, material, node);
        merged.shader_params = params;
        merged.render_style = style;
        merged.cast_shadows = cast_shadows;
        let instance_key = scene.add_instance(merged);

        for source in &sources {
            if let Some(instance) = scene.instances.get_mut(source.instance) {
                instance.suppressed_by_batch = true;
            }
        }
        composition.add_instance(scene, group.layer, instance_key);

        debug!(
            "Batch group '{}': merged {} instances into one draw",
            group.name,
            sources.len()
        );
        self.batches.push(Batch {
            group: group.id,
            mesh: mesh_key,
            instance: instance_key,
            dynamic: group.dynamic,
            sources,
        });
    }

    /// Shared parent node for generated instances; merged geometry is
    /// already in world space, so the node stays at identity
    fn batch_node(&mut self, scene: &mut RenderScene) -> NodeKey {
        match self.batch_root {
            Some(node) if scene.graph.contains(node) => node,
            _ => {
                let node = scene.graph.add_child(scene.graph.root(), "batches");
                self.batch_root = Some(node);
                node
            }
        }
    }
}

fn exceeds_extent(aabb: &Aabb, ceiling: f32) -> bool {
    let size = aabb.size();
    size.x > ceiling || size.y > ceiling || size.z > ceiling
}

fn transform_vertex(vertex: &Vertex, matrix: &Mat4) -> Vertex {
    let p = matrix.transform_point(&Point3::new(
        vertex.position[0],
        vertex.position[1],
        vertex.position[2],
    ));
    let linear = matrix.fixed_view::<3, 3>(0, 0);
    let n = linear * Vec3::new(vertex.normal[0], vertex.normal[1], vertex.normal[2]);
    let n = if n.norm_squared() > 0.0 { n.normalize() } else { n };
    Vertex::new([p.x, p.y, p.z], [n.x, n.y, n.z], vertex.uv)
}
