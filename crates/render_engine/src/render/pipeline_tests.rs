//! End-to-end pipeline tests against a recording device
//!
//! The device double records every command the renderer submits, so tests
//! assert on the exact draw sequence: ordering, clears, targets, and the
//! indices written for picking.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;

use crate::config::RenderConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::*;
use crate::scene::{Camera, CameraKey, Light, ShadowUpdateMode};

#[derive(Debug, Clone, PartialEq)]
enum Command {
    BindTarget(Option<RenderTargetHandle>),
    Clear(ClearFlags),
    BindShader(ShaderHandle),
    SetState(RenderStyle),
    BindMesh(String),
    SetViewProjection,
    SetWorld([f32; 3]),
    SetDrawIndex(u32),
    Draw { count: u32, instances: u32 },
}

#[derive(Debug, Default)]
struct RecordingDevice {
    commands: Vec<Command>,
    pick_result: Vec<u32>,
}

impl RecordingDevice {
    fn draw_positions(&self) -> Vec<[f32; 3]> {
        // The world matrix set immediately before each draw
        let mut positions = Vec::new();
        let mut last = None;
        for command in &self.commands {
            match command {
                Command::SetWorld(p) => last = Some(*p),
                Command::Draw { .. } => {
                    if let Some(p) = last {
                        positions.push(p);
                    }
                }
                _ => {}
            }
        }
        positions
    }

    fn count_draws(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count()
    }

    fn clears(&self) -> Vec<ClearFlags> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Clear(flags) => Some(*flags),
                _ => None,
            })
            .collect()
    }
}

impl GpuDevice for RecordingDevice {
    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>) -> RenderResult<()> {
        self.commands.push(Command::BindTarget(target));
        Ok(())
    }

    fn clear(&mut self, options: &ClearOptions) -> RenderResult<()> {
        self.commands.push(Command::Clear(options.flags));
        Ok(())
    }

    fn bind_shader(&mut self, shader: ShaderHandle) -> RenderResult<()> {
        self.commands.push(Command::BindShader(shader));
        Ok(())
    }

    fn set_render_state(&mut self, _state: &RenderState, style: RenderStyle) -> RenderResult<()> {
        self.commands.push(Command::SetState(style));
        Ok(())
    }

    fn bind_mesh_buffers(&mut self, mesh: &Mesh) -> RenderResult<()> {
        self.commands.push(Command::BindMesh(mesh.name.clone()));
        Ok(())
    }

    fn set_view_projection(&mut self, _matrix: &Mat4) {
        self.commands.push(Command::SetViewProjection);
    }

    fn set_world_matrix(&mut self, matrix: &Mat4) {
        self.commands.push(Command::SetWorld([
            matrix[(0, 3)],
            matrix[(1, 3)],
            matrix[(2, 3)],
        ]));
    }

    fn set_draw_index(&mut self, index: u32) {
        self.commands.push(Command::SetDrawIndex(index));
    }

    fn draw(
        &mut self,
        _primitive: PrimitiveType,
        _base: u32,
        count: u32,
        _indexed: bool,
        instances: u32,
    ) -> RenderResult<()> {
        self.commands.push(Command::Draw { count, instances });
        Ok(())
    }

    fn read_pick_rect(
        &mut self,
        _x: u32,
        _y: u32,
        width: u32,
        height: u32,
    ) -> RenderResult<Vec<u32>> {
        assert_eq!(self.pick_result.len(), (width * height) as usize);
        Ok(self.pick_result.clone())
    }
}

struct World {
    scene: RenderScene,
    composition: LayerComposition,
    camera: CameraKey,
    mesh: MeshKey,
}

/// Scene with one enabled layer, a camera at the origin looking down -Z,
/// and a cube mesh ready for instancing
fn world() -> World {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut scene = RenderScene::new();
    let mut camera = Camera::perspective(Vec3::zeros(), 60.0, 1.0, 0.1, 1000.0);
    camera.look_at(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 1.0, 0.0));
    let camera = scene.add_camera(camera);
    let mesh = scene.add_mesh(Mesh::cube("box", 0.5));

    let mut layer = Layer::new(0, "world");
    layer.add_camera(camera);
    let mut composition = LayerComposition::new("main");
    composition.push(layer);

    World {
        scene,
        composition,
        camera,
        mesh,
    }
}

fn forward_material(scene: &mut RenderScene, name: &str) -> MaterialKey {
    scene.add_material(Material::new(name).with_shader(ShaderPass::Forward, ShaderHandle(1)))
}

fn spawn(world: &mut World, material: MaterialKey, position: Vec3) -> InstanceKey {
    let node = world.scene.graph.add_child(world.scene.graph.root(), "inst");
    world.scene.graph.set_local_position(node, position);
    world
        .scene
        .add_instance(MeshInstance::new(world.mesh, material, node))
}

#[test]
fn test_transparents_draw_back_to_front_at_scale() {
    let mut w = world();
    let material = w.scene.add_material(
        Material::new("glass")
            .with_blend_mode(BlendMode::AlphaBlend)
            .with_shader(ShaderPass::Forward, ShaderHandle(1)),
    );

    // 60 instances at depths 1..=60, registered in a scrambled order
    let count = 60u32;
    let mut keys = Vec::new();
    for i in 0..count {
        let depth = 1.0 + ((i * 37) % count) as f32;
        let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -depth));
        keys.push(key);
        w.composition.add_instance(&w.scene, 0, key);
    }

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let stats = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    assert_eq!(stats.draw_calls, count);
    let positions = device.draw_positions();
    assert_eq!(positions.len(), count as usize);
    // Back to front: depth along -Z strictly decreasing, so z increasing
    for pair in positions.windows(2) {
        assert!(
            pair[0][2] < pair[1][2],
            "draws out of order: {:?} before {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_manual_sort_keeps_registration_order_on_ties() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    w.composition
        .layer_by_id_mut(0)
        .unwrap()
        .set_sort_mode(PartitionKind::Opaque, SortMode::Manual);

    // x encodes registration order; draw_order has ties
    let orders = [1, 0, 0, 2, 0];
    for (i, &order) in orders.iter().enumerate() {
        let key = spawn(&mut w, material, Vec3::new(i as f32 * 0.25, 0.0, -5.0));
        w.scene.instances[key].draw_order = order;
        w.composition.add_instance(&w.scene, 0, key);
    }

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    let drawn_x: Vec<f32> = device.draw_positions().iter().map(|p| p[0]).collect();
    // Ascending draw_order, ties in registration order
    assert_eq!(drawn_x, vec![0.25, 0.5, 1.0, 0.0, 0.75]);
}

#[test]
fn test_culling_skips_and_flags_instances() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    let ahead = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    let behind = spawn(&mut w, material, Vec3::new(0.0, 0.0, 5.0));
    w.composition.add_instance(&w.scene, 0, ahead);
    w.composition.add_instance(&w.scene, 0, behind);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let stats = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.instances_culled, 1);
    assert!(w.scene.instances[ahead].visible_this_frame);
    assert!(!w.scene.instances[behind].visible_this_frame);

    // Culling is idempotent: an unchanged scene renders identically
    let mut device2 = RecordingDevice::default();
    let stats2 = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device2)
        .unwrap();
    assert_eq!(stats, stats2);
    assert_eq!(device.commands, device2.commands);
}

#[test]
fn test_cull_mask_mismatch_excludes_instance() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    w.scene.instances[key].cull_mask = CullMask::from_bits_truncate(1 << 3);
    w.composition.add_instance(&w.scene, 0, key);
    w.composition.layer_by_id_mut(0).unwrap().cull_mask = CullMask::DEFAULT;

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let stats = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();
    assert_eq!(stats.draw_calls, 0);
}

#[test]
fn test_camera_clear_applies_once_and_overrides_win() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, key);

    // Second layer on the same camera, clearing only depth before it draws
    let mut overlay = Layer::new(1, "overlay");
    overlay.add_camera(w.camera);
    overlay.clear_override = Some(ClearOptions {
        flags: ClearFlags::DEPTH,
        ..ClearOptions::default()
    });
    w.composition.push(overlay);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    // One camera clear (first sub-layer only), then the override; the
    // transparent sub-layers add nothing
    assert_eq!(
        device.clears(),
        vec![ClearFlags::COLOR | ClearFlags::DEPTH, ClearFlags::DEPTH]
    );
}

#[test]
fn test_enabled_layer_without_cameras_is_fatal() {
    let mut w = world();
    w.composition.layer_by_id_mut(0).unwrap().remove_camera(w.camera);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let result = renderer.render_composition(&mut w.scene, &mut w.composition, &mut device);
    assert!(matches!(result, Err(RenderError::NoCamera)));

    // A fully disabled composition is not an error; there is nothing to do
    w.composition.layer_by_id_mut(0).unwrap().enabled = false;
    let result = renderer.render_composition(&mut w.scene, &mut w.composition, &mut device);
    assert!(result.is_ok());
}

#[test]
fn test_missing_pass_shader_is_fatal() {
    let mut w = world();
    let material = w.scene.add_material(Material::new("unshaded"));
    let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, key);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let result = renderer.render_composition(&mut w.scene, &mut w.composition, &mut device);
    assert!(matches!(
        result,
        Err(RenderError::NoShader { pass: ShaderPass::Forward, .. })
    ));
}

struct VetoHook {
    pre_cull_runs: Rc<RefCell<u32>>,
    pre_render_runs: Rc<RefCell<u32>>,
}

impl LayerHook for VetoHook {
    fn pre_cull(&mut self, _camera: &mut Camera) {
        *self.pre_cull_runs.borrow_mut() += 1;
    }

    fn post_cull(
        &mut self,
        _scene: &RenderScene,
        _camera: &Camera,
        visible: &mut Vec<InstanceKey>,
    ) {
        visible.clear();
    }

    fn pre_render(&mut self, _device: &mut dyn GpuDevice, _camera: &Camera) {
        *self.pre_render_runs.borrow_mut() += 1;
    }
}

#[test]
fn test_hooks_run_and_post_cull_edits_are_final() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, key);

    let pre_cull_runs = Rc::new(RefCell::new(0));
    let pre_render_runs = Rc::new(RefCell::new(0));
    w.composition.layer_by_id_mut(0).unwrap().hook = Some(Box::new(VetoHook {
        pre_cull_runs: Rc::clone(&pre_cull_runs),
        pre_render_runs: Rc::clone(&pre_render_runs),
    }));

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let stats = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    // Hook ran for both partitions of the layer, and its veto stuck
    assert_eq!(*pre_cull_runs.borrow(), 2);
    assert_eq!(*pre_render_runs.borrow(), 2);
    assert_eq!(stats.draw_calls, 0);
    assert!(!w.scene.instances[key].visible_this_frame);
}

#[test]
fn test_shadow_this_frame_renders_exactly_once() {
    let mut w = world();
    let material = w.scene.add_material(
        Material::new("lit")
            .with_shader(ShaderPass::Forward, ShaderHandle(1))
            .with_shader(ShaderPass::Shadow, ShaderHandle(2)),
    );
    let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, key);

    let mut sun = Light::directional("sun", Vec3::new(0.0, -1.0, 0.0));
    sun.cast_shadows = true;
    sun.shadow_mode = ShadowUpdateMode::ThisFrame;
    sun.shadow_map = Some(RenderTargetHandle(99));
    let sun = w.scene.add_light(sun);
    w.composition.layer_by_id_mut(0).unwrap().add_light(sun);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let stats = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    assert_eq!(stats.shadow_passes, 1);
    // Caster drawn with the shadow program into the shadow map
    assert!(device
        .commands
        .contains(&Command::BindTarget(Some(RenderTargetHandle(99)))));
    assert!(device.commands.contains(&Command::BindShader(ShaderHandle(2))));
    assert_eq!(w.scene.lights[sun].shadow_mode, ShadowUpdateMode::None);

    // One-shot mode is spent; the next frame renders no shadow pass
    let mut device2 = RecordingDevice::default();
    let stats2 = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device2)
        .unwrap();
    assert_eq!(stats2.shadow_passes, 0);
}

#[test]
fn test_realtime_shadows_render_every_frame() {
    let mut w = world();
    let material = w.scene.add_material(
        Material::new("lit")
            .with_shader(ShaderPass::Forward, ShaderHandle(1))
            .with_shader(ShaderPass::Shadow, ShaderHandle(2)),
    );
    let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, key);

    let mut lamp = Light::point("lamp", Vec3::new(0.0, 0.0, -5.0), 20.0);
    lamp.cast_shadows = true;
    lamp.shadow_mode = ShadowUpdateMode::Realtime;
    let lamp = w.scene.add_light(lamp);
    w.composition.layer_by_id_mut(0).unwrap().add_light(lamp);

    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    for _ in 0..2 {
        let mut device = RecordingDevice::default();
        let stats = renderer
            .render_composition(&mut w.scene, &mut w.composition, &mut device)
            .unwrap();
        // Six cubemap faces per frame
        assert_eq!(stats.shadow_passes, 6);
    }
}

#[test]
fn test_render_style_reaches_device() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    let solid = spawn(&mut w, material, Vec3::new(-1.0, 0.0, -5.0));
    let wire = spawn(&mut w, material, Vec3::new(1.0, 0.0, -5.0));
    w.scene.instances[wire].render_style = RenderStyle::Wireframe;
    w.composition.add_instance(&w.scene, 0, solid);
    w.composition.add_instance(&w.scene, 0, wire);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    // Same material and mesh, so ties keep registration order: the solid
    // instance submits first, each with its own rasterization style
    let styles: Vec<RenderStyle> = device
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::SetState(style) => Some(*style),
            _ => None,
        })
        .collect();
    assert_eq!(styles, vec![RenderStyle::Solid, RenderStyle::Wireframe]);
}

#[test]
fn test_reference_layer_reuses_draw_list_with_its_own_pass() {
    let mut w = world();
    let material = w.scene.add_material(
        Material::new("lit")
            .with_shader(ShaderPass::Forward, ShaderHandle(1))
            .with_shader(ShaderPass::Pick, ShaderHandle(9)),
    );
    let key = spawn(&mut w, material, Vec3::new(0.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, key);

    // Same draw list, different program: echo never holds instances itself
    let mut echo = Layer::new(1, "echo");
    echo.add_camera(w.camera);
    echo.reference = Some(0);
    echo.shader_pass = ShaderPass::Pick;
    w.composition.push(echo);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let stats = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    assert_eq!(stats.draw_calls, 2);
    assert!(device.commands.contains(&Command::BindShader(ShaderHandle(1))));
    assert!(device.commands.contains(&Command::BindShader(ShaderHandle(9))));
    let echo = w.composition.layer_by_id(1).unwrap();
    assert!(echo.instances(PartitionKind::Opaque).is_empty());
    assert!(echo.instances(PartitionKind::Transparent).is_empty());
}

#[test]
fn test_shadow_casters_draw_in_material_order() {
    let mut w = world();
    let mat_a = w.scene.add_material(
        Material::new("a")
            .with_shader(ShaderPass::Forward, ShaderHandle(1))
            .with_shader(ShaderPass::Shadow, ShaderHandle(2)),
    );
    let mat_b = w.scene.add_material(
        Material::new("b")
            .with_shader(ShaderPass::Forward, ShaderHandle(1))
            .with_shader(ShaderPass::Shadow, ShaderHandle(3)),
    );
    // Registered interleaved; the shadow pass buckets by material
    for (i, &material) in [mat_b, mat_a, mat_b, mat_a].iter().enumerate() {
        let key = spawn(&mut w, material, Vec3::new(i as f32, 0.0, -5.0));
        w.scene.instances[key].cast_shadows = true;
        w.composition.add_instance(&w.scene, 0, key);
    }

    let mut sun = Light::directional("sun", Vec3::new(0.0, -1.0, 0.0));
    sun.cast_shadows = true;
    sun.shadow_mode = ShadowUpdateMode::Realtime;
    let sun = w.scene.add_light(sun);
    w.composition.layer_by_id_mut(0).unwrap().add_light(sun);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    let shadow_shaders: Vec<ShaderHandle> = device
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::BindShader(s) if *s != ShaderHandle(1) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        shadow_shaders,
        vec![ShaderHandle(2), ShaderHandle(2), ShaderHandle(3), ShaderHandle(3)]
    );
}

#[test]
fn test_batched_scene_draws_once_for_the_merged_set() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    let a = spawn(&mut w, material, Vec3::new(-1.0, 0.0, -5.0));
    let b = spawn(&mut w, material, Vec3::new(1.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, a);
    w.composition.add_instance(&w.scene, 0, b);

    let mut batcher = BatchManager::new(&RenderConfig::default());
    let group = batcher.create_group("props", false, 0, None);
    w.scene.instances[a].batch_group = Some(group);
    w.scene.instances[b].batch_group = Some(group);
    w.scene.update_bounds();
    batcher.generate(&mut w.scene, &mut w.composition);

    let mut device = RecordingDevice::default();
    let mut renderer = ForwardRenderer::new(RenderConfig::default());
    let stats = renderer
        .render_composition(&mut w.scene, &mut w.composition, &mut device)
        .unwrap();

    // The two sources collapse into one submitted draw
    assert_eq!(stats.draw_calls, 1);
    let merged_aabb = w.scene.instances[batcher.batches()[0].instance].world_aabb();
    assert_relative_eq!(merged_aabb.center().x, 0.0);
}

#[test]
fn test_pick_region_maps_texels_to_instances() {
    let mut w = world();
    let material = forward_material(&mut w.scene, "plain");
    let a = spawn(&mut w, material, Vec3::new(-1.0, 0.0, -5.0));
    let b = spawn(&mut w, material, Vec3::new(1.0, 0.0, -5.0));
    w.composition.add_instance(&w.scene, 0, a);
    w.composition.add_instance(&w.scene, 0, b);

    let mut device = RecordingDevice::default();
    // 2x2 readback: instance 0 once, instance 1 twice, one empty texel
    device.pick_result = vec![0, 1, 1, u32::MAX];

    let picked = pick_region(
        &mut w.scene,
        &w.composition,
        &mut device,
        w.camera,
        ShaderHandle(42),
        RenderTargetHandle(7),
        PickRect {
            x: 10,
            y: 10,
            width: 2,
            height: 2,
        },
    )
    .unwrap();

    assert_eq!(picked, vec![a, b]);
    // Each candidate was tagged with its table index before drawing
    assert!(device.commands.contains(&Command::SetDrawIndex(0)));
    assert!(device.commands.contains(&Command::SetDrawIndex(1)));
    assert!(device.commands.contains(&Command::BindShader(ShaderHandle(42))));
}

#[test]
fn test_pick_with_stale_camera_fails() {
    let mut w = world();
    let camera = w.camera;
    w.scene.cameras.remove(camera);

    let mut device = RecordingDevice::default();
    let result = pick_region(
        &mut w.scene,
        &w.composition,
        &mut device,
        camera,
        ShaderHandle(42),
        RenderTargetHandle(7),
        PickRect {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        },
    );
    assert!(matches!(result, Err(RenderError::NoCamera)));
}
