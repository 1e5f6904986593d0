//! Forward renderer
//!
//! Drives a frame: shadow passes for every shadow-casting light registered
//! with an enabled layer, then for each camera the composition derives,
//! every sub-layer entry in order. Each sub-layer pass culls, sorts,
//! applies clear policy, fires the layer's hooks, and submits draws to the
//! device.
//!
//! Clear policy: a layer's `clear_override` always applies when set;
//! otherwise the camera's own clear options apply exactly once, on the
//! camera's first sub-layer pass of the frame.

use std::cmp::Ordering;

use log::{debug, error, warn};

use crate::config::RenderConfig;
use crate::foundation::math::Vec3;
use crate::geometry::Frustum;
use crate::render::{
    ClearFlags, ClearOptions, GpuDevice, InstanceKey, LayerComposition, LayerHook, LayerId,
    PartitionKind, RenderError, RenderResult, RenderScene, ShaderPass, SortMode, SubLayerEntry,
};
use crate::scene::{Camera, CameraKey, LightKey, ShadowUpdateMode};

/// Per-frame counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Cameras that ran the entry sequence
    pub camera_passes: u32,
    /// Shadow passes rendered (cubemap faces count individually)
    pub shadow_passes: u32,
    /// Draw calls submitted, including shadow draws
    pub draw_calls: u32,
    /// Instances rejected by frustum culling in camera passes
    pub instances_culled: u32,
}

/// Submits a layer composition to a graphics device, once per frame
#[derive(Debug)]
pub struct ForwardRenderer {
    config: RenderConfig,
}

impl ForwardRenderer {
    /// Create a renderer with the given tunables
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render one frame
    ///
    /// Flushes dirty transforms and instance bounds, renders shadow passes,
    /// then runs every camera over the composition's sub-layer entries in
    /// order. Fails when an enabled layer exists but no camera is
    /// registered anywhere, or when a drawn material lacks a shader for the
    /// active pass.
    pub fn render_composition(
        &mut self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        device: &mut dyn GpuDevice,
    ) -> RenderResult<FrameStats> {
        let mut stats = FrameStats::default();

        scene.update_bounds();
        for (_, instance) in &mut scene.instances {
            instance.visible_this_frame = false;
        }

        let entries: Vec<SubLayerEntry> = composition.entries().to_vec();
        let mut layer_ids: Vec<LayerId> = Vec::new();
        for entry in &entries {
            if !layer_ids.contains(&entry.layer) {
                layer_ids.push(entry.layer);
            }
        }
        for &id in &layer_ids {
            if let Some(layer) = composition.layer_by_id_mut(id) {
                layer.prune_stale(scene);
            }
        }

        self.render_shadow_passes(scene, composition, device, &mut stats)?;

        let cameras = composition.cameras();
        if cameras.is_empty() {
            let any_enabled = layer_ids
                .iter()
                .filter_map(|&id| composition.layer_by_id(id))
                .any(|layer| layer.enabled);
            if any_enabled {
                return Err(RenderError::NoCamera);
            }
            return Ok(stats);
        }

        for camera_key in cameras {
            let Some(camera) = scene.cameras.get(camera_key) else {
                warn!("Composition '{}' references a stale camera", composition.name);
                continue;
            };
            let base_camera = camera.clone();
            stats.camera_passes += 1;
            let mut cleared = false;
            let mut cleared_layers: Vec<LayerId> = Vec::new();
            for entry in &entries {
                self.render_sub_layer(
                    scene,
                    composition,
                    device,
                    *entry,
                    camera_key,
                    &base_camera,
                    &mut cleared,
                    &mut cleared_layers,
                    &mut stats,
                )?;
            }
        }

        if self.config.log_frame_stats {
            debug!(
                "frame: {} camera passes, {} shadow passes, {} draws, {} culled",
                stats.camera_passes, stats.shadow_passes, stats.draw_calls, stats.instances_culled
            );
        }
        Ok(stats)
    }

    fn render_sub_layer(
        &self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        device: &mut dyn GpuDevice,
        entry: SubLayerEntry,
        camera_key: CameraKey,
        base_camera: &Camera,
        cleared: &mut bool,
        cleared_layers: &mut Vec<LayerId>,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        let Some(layer) = composition.layer_by_id(entry.layer) else {
            return Ok(());
        };
        if !layer.enabled || !layer.cameras().contains(&camera_key) {
            return Ok(());
        }
        let cull_mask = layer.cull_mask;
        let frustum_culling = layer.frustum_culling;
        let sort_mode = layer.sort_mode(entry.kind);
        let render_target = layer.render_target;
        let clear_override = layer.clear_override;
        let pass = layer.shader_pass;

        // A reference layer draws another layer's instance lists under its
        // own shader pass and settings
        let source = layer.reference.unwrap_or(entry.layer);
        let keys: Vec<InstanceKey> = match composition.layer_by_id(source) {
            Some(source_layer) => source_layer.instances(entry.kind).to_vec(),
            None => {
                warn!("Layer '{}' references missing layer id {}", layer.name, source);
                return Ok(());
            }
        };

        // Hooks see a per-pass copy of the camera, so a projection swap in
        // pre_cull lasts exactly one sub-layer pass
        let mut camera = base_camera.clone();
        if let Some(hook) = layer_hook(composition, entry.layer) {
            hook.pre_cull(&mut camera);
        }
        let frustum = camera.frustum();

        let mut visible: Vec<InstanceKey> = Vec::new();
        for &key in &keys {
            let Some(instance) = scene.instances.get(key) else {
                continue;
            };
            if !instance.drawable() || !instance.cull_mask.intersects(cull_mask) {
                continue;
            }
            if !scene.graph.is_enabled_in_hierarchy(instance.node) {
                continue;
            }
            if frustum_culling && !frustum.intersects_aabb(instance.world_aabb()) {
                stats.instances_culled += 1;
                continue;
            }
            visible.push(key);
        }
        if let Some(hook) = layer_hook(composition, entry.layer) {
            hook.post_cull(scene, &camera, &mut visible);
        }
        for &key in &visible {
            if let Some(instance) = scene.instances.get_mut(key) {
                instance.visible_this_frame = true;
            }
        }

        sort_instances(scene, &mut visible, sort_mode, camera.position, camera.forward());

        device.bind_render_target(render_target.or(camera.render_target))?;
        if let Some(clear) = clear_override {
            // The override fires once per camera, on the layer's first
            // sub-pass
            if !cleared_layers.contains(&entry.layer) {
                device.clear(&clear)?;
            }
        } else if !*cleared {
            device.clear(&camera.clear_options)?;
        }
        *cleared = true;
        if !cleared_layers.contains(&entry.layer) {
            cleared_layers.push(entry.layer);
        }

        device.set_view_projection(&camera.view_projection_matrix());
        if let Some(hook) = layer_hook(composition, entry.layer) {
            hook.pre_render(device, &camera);
        }
        for &key in &visible {
            stats.draw_calls += draw_instance(scene, device, key, pass)?;
        }
        if let Some(hook) = layer_hook(composition, entry.layer) {
            hook.post_render(device, &camera);
        }
        Ok(())
    }

    fn render_shadow_passes(
        &self,
        scene: &mut RenderScene,
        composition: &mut LayerComposition,
        device: &mut dyn GpuDevice,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        // Lights in entry order, first occurrence wins, each paired with
        // the layers whose instances it can shadow
        let mut light_layers: Vec<(LightKey, Vec<LayerId>)> = Vec::new();
        for entry in composition.entries() {
            let Some(layer) = composition.layer_by_id(entry.layer) else {
                continue;
            };
            if !layer.enabled {
                continue;
            }
            for &light in layer.lights() {
                match light_layers.iter_mut().find(|(key, _)| *key == light) {
                    Some((_, layers)) => {
                        if !layers.contains(&layer.id) {
                            layers.push(layer.id);
                        }
                    }
                    None => light_layers.push((light, vec![layer.id])),
                }
            }
        }

        for (light_key, layer_ids) in light_layers {
            let Some(light) = scene.lights.get(light_key) else {
                continue;
            };
            if !light.enabled
                || !light.cast_shadows
                || light.shadow_mode == ShadowUpdateMode::None
            {
                continue;
            }
            let light = light.clone();

            let mut casters: Vec<InstanceKey> = Vec::new();
            for &id in &layer_ids {
                let Some(layer) = composition.layer_by_id(id) else {
                    continue;
                };
                for kind in [PartitionKind::Opaque, PartitionKind::Transparent] {
                    for &key in layer.instances(kind) {
                        if casters.contains(&key) {
                            continue;
                        }
                        let Some(instance) = scene.instances.get(key) else {
                            continue;
                        };
                        if instance.drawable()
                            && instance.cast_shadows
                            && scene.graph.is_enabled_in_hierarchy(instance.node)
                        {
                            casters.push(key);
                        }
                    }
                }
            }

            let depth_clear = ClearOptions {
                flags: ClearFlags::DEPTH,
                ..ClearOptions::default()
            };
            for view_projection in light.shadow_view_projections() {
                let frustum = Frustum::from_view_projection(&view_projection);
                let mut in_volume: Vec<InstanceKey> = casters
                    .iter()
                    .copied()
                    .filter(|&key| {
                        scene
                            .instances
                            .get(key)
                            .is_some_and(|i| frustum.intersects_aabb(i.world_aabb()))
                    })
                    .collect();
                // Depth-only draws are state-sorted like opaques
                sort_instances(
                    scene,
                    &mut in_volume,
                    SortMode::MaterialMesh,
                    light.position,
                    light.direction,
                );

                device.bind_render_target(light.shadow_map)?;
                device.clear(&depth_clear)?;
                device.set_view_projection(&view_projection);
                stats.shadow_passes += 1;

                for &key in &in_volume {
                    if let Some(instance) = scene.instances.get_mut(key) {
                        instance.visible_this_frame = true;
                    }
                    stats.draw_calls += draw_instance(scene, device, key, ShaderPass::Shadow)?;
                }
            }

            if light.shadow_mode == ShadowUpdateMode::ThisFrame {
                if let Some(light) = scene.lights.get_mut(light_key) {
                    light.shadow_mode = ShadowUpdateMode::None;
                }
            }
        }
        Ok(())
    }
}

/// Submit one instance; returns the number of draw calls issued
fn draw_instance(
    scene: &mut RenderScene,
    device: &mut dyn GpuDevice,
    key: InstanceKey,
    pass: ShaderPass,
) -> RenderResult<u32> {
    let Some(instance) = scene.instances.get(key) else {
        return Ok(0);
    };
    let mesh_key = instance.mesh;
    let node = instance.node;
    let material_key = instance.material;
    let instance_count = instance.instance_count;
    let style = instance.render_style;

    let Some(material) = scene.materials.get(material_key) else {
        warn!("Skipping draw: stale material handle");
        return Ok(0);
    };
    let Some(shader) = material.shader(pass) else {
        error!(
            "Draw aborted: material '{}' has no shader for pass {:?}",
            material.name, pass
        );
        return Err(RenderError::NoShader {
            pass,
            material: material.name.clone(),
        });
    };
    let state = material.state;

    let Some(world) = scene.graph.world_transform(node) else {
        warn!("Skipping draw: instance node was removed");
        return Ok(0);
    };
    let Some(mesh) = scene.meshes.get(mesh_key) else {
        warn!("Skipping draw: stale mesh handle");
        return Ok(0);
    };

    device.bind_shader(shader)?;
    device.set_render_state(&state, style)?;
    device.bind_mesh_buffers(mesh)?;
    device.set_world_matrix(&world);

    let mut calls = 0;
    for range in mesh.ranges() {
        device.draw(
            range.primitive,
            range.base,
            range.count,
            range.indexed,
            instance_count,
        )?;
        calls += 1;
    }
    Ok(calls)
}

/// Mutable access to a layer's hook without holding the layer borrow
fn layer_hook(
    composition: &mut LayerComposition,
    id: LayerId,
) -> Option<&mut Box<dyn LayerHook>> {
    composition.layer_by_id_mut(id).and_then(|l| l.hook.as_mut())
}

/// Order survivors per the pass's sort discipline
///
/// Distance sorts measure from `position` along `forward` (the camera for
/// camera passes, the light for shadow passes). All sorts are stable, so
/// ties (and `draw_order` ties in particular) keep registration order.
fn sort_instances(
    scene: &RenderScene,
    keys: &mut [InstanceKey],
    mode: SortMode,
    position: Vec3,
    forward: Vec3,
) {
    match mode {
        SortMode::None => {}
        SortMode::Manual => {
            keys.sort_by_key(|&k| scene.instances.get(k).map_or(0, |i| i.draw_order));
        }
        SortMode::MaterialMesh => {
            keys.sort_by_key(|&k| scene.instances.get(k).map(|i| (i.material, i.mesh)));
        }
        SortMode::BackToFront | SortMode::FrontToBack => {
            keys.sort_by(|&a, &b| {
                let da = scene
                    .instances
                    .get(a)
                    .map_or(0.0, |i| i.sort_distance_for(position, forward));
                let db = scene
                    .instances
                    .get(b)
                    .map_or(0.0, |i| i.sort_distance_for(position, forward));
                let ordering = if mode == SortMode::BackToFront {
                    db.partial_cmp(&da)
                } else {
                    da.partial_cmp(&db)
                };
                ordering.unwrap_or(Ordering::Equal)
            });
        }
    }
}
