//! Graphics device boundary
//!
//! The rendering core never talks to a GPU API directly. Everything it
//! decides per frame is expressed as calls on the [`GpuDevice`] trait, so
//! backends (and test doubles) plug in underneath without the culling,
//! sorting, and batching layers knowing which one is active.

use bitflags::bitflags;

use crate::foundation::math::Mat4;
use crate::render::{Mesh, PrimitiveType, RenderResult, RenderState, RenderStyle};

/// Handle to a compiled shader program owned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// Handle to an off-screen render target owned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub u64);

bitflags! {
    /// Which attachments a clear touches
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        /// Clear the color attachment
        const COLOR = 1 << 0;
        /// Clear the depth attachment
        const DEPTH = 1 << 1;
        /// Clear the stencil attachment
        const STENCIL = 1 << 2;
    }
}

/// Clear values applied when a render pass begins
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearOptions {
    /// Clear color as linear RGBA
    pub color: [f32; 4],
    /// Depth clear value, 1.0 for a [0, 1] depth range
    pub depth: f32,
    /// Stencil clear value
    pub stencil: u32,
    /// Attachments to clear
    pub flags: ClearFlags,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
            flags: ClearFlags::COLOR | ClearFlags::DEPTH,
        }
    }
}

/// Abstract GPU command interface
///
/// Call order within a frame follows the submission loop: bind a render
/// target, clear, then for each draw bind shader and state, mesh buffers,
/// per-draw uniforms, and issue the draw. Implementations report failures
/// through [`RenderResult`] and must not panic.
pub trait GpuDevice {
    /// Bind a render target, or the backbuffer when `target` is `None`
    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>) -> RenderResult<()>;

    /// Clear the currently bound target's attachments
    fn clear(&mut self, options: &ClearOptions) -> RenderResult<()>;

    /// Bind a shader program for subsequent draws
    fn bind_shader(&mut self, shader: ShaderHandle) -> RenderResult<()>;

    /// Apply blend, depth, stencil, and cull state, plus the rasterization
    /// style (filled, wireframe, or points)
    fn set_render_state(&mut self, state: &RenderState, style: RenderStyle) -> RenderResult<()>;

    /// Bind the vertex and index buffers of a mesh
    fn bind_mesh_buffers(&mut self, mesh: &Mesh) -> RenderResult<()>;

    /// Set the view-projection matrix for subsequent draws
    fn set_view_projection(&mut self, matrix: &Mat4);

    /// Set the model-to-world matrix for the next draw
    fn set_world_matrix(&mut self, matrix: &Mat4);

    /// Set the flat object index written by pick-pass shaders
    fn set_draw_index(&mut self, index: u32);

    /// Issue a draw over one primitive range
    ///
    /// `base` and `count` index into the bound index buffer when `indexed`
    /// is true, into the vertex buffer otherwise. `instance_count` of zero
    /// is submitted as a single instance.
    fn draw(
        &mut self,
        primitive: PrimitiveType,
        base: u32,
        count: u32,
        indexed: bool,
        instance_count: u32,
    ) -> RenderResult<()>;

    /// Read back a rectangle of draw indices from the bound pick target
    ///
    /// Returns `width * height` values in row-major order; texels not
    /// covered by any draw hold `u32::MAX`.
    fn read_pick_rect(&mut self, x: u32, y: u32, width: u32, height: u32)
        -> RenderResult<Vec<u32>>;
}
