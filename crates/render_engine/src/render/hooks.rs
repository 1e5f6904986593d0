//! Per-layer render hooks
//!
//! A layer may carry one boxed hook. The renderer calls it at four fixed
//! points per camera pass; every method has an empty default so a hook
//! implements only the stages it cares about.

use crate::render::{GpuDevice, InstanceKey, RenderScene};
use crate::scene::Camera;

/// Strategy hook invoked around a layer's cull and draw stages
///
/// `post_cull` receives the survivor list mutably and may add or remove
/// keys; the renderer draws exactly what the hook leaves behind.
#[allow(unused_variables)]
pub trait LayerHook {
    /// Before culling; may adjust the camera for this pass
    fn pre_cull(&mut self, camera: &mut Camera) {}

    /// After culling; may edit the visible set
    fn post_cull(&mut self, scene: &RenderScene, camera: &Camera, visible: &mut Vec<InstanceKey>) {}

    /// After the render target is bound, before any draw of this sub-layer
    fn pre_render(&mut self, device: &mut dyn GpuDevice, camera: &Camera) {}

    /// After the last draw of this sub-layer
    fn post_render(&mut self, device: &mut dyn GpuDevice, camera: &Camera) {}
}
