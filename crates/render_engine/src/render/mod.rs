//! # Rendering Core
//!
//! The CPU-side decision layer of the forward renderer. Per frame it
//! decides what to draw (culling), in what order (per-layer sort
//! disciplines), and how many draw calls are required (batching), then
//! submits the work through the [`GpuDevice`] boundary.
//!
//! ## Architecture
//!
//! - **`RenderScene`**: Explicit context object owning the scene graph and
//!   the arenas for meshes, materials, mesh instances, lights, and cameras
//! - **`Layer` / `LayerComposition`**: Ordered opaque/transparent sub-passes
//!   shared across cameras
//! - **`BatchManager`**: Merges compatible mesh instances into single draws
//! - **`ForwardRenderer`**: Per-camera, per-sub-layer cull, sort, and submit
//!
//! ## Error Policy
//!
//! Composition mutation is non-throwing: removing absent elements is a
//! silent no-op and lookups return `Option`. The fatal conditions are
//! drawing with no shader bound for the active pass and rendering a
//! composition that derives no camera.

mod batcher;
mod composition;
mod device;
mod forward;
mod hooks;
mod layer;
mod material;
mod mesh;
mod mesh_instance;
mod picking;
mod scene_ctx;

#[cfg(test)]
mod pipeline_tests;

pub use batcher::{Batch, BatchEvent, BatchGroup, BatchGroupId, BatchManager};
pub use composition::{CompositionEvent, LayerComposition, SubLayerEntry};
pub use device::{ClearFlags, ClearOptions, GpuDevice, RenderTargetHandle, ShaderHandle};
pub use forward::{ForwardRenderer, FrameStats};
pub use hooks::LayerHook;
pub use layer::{Layer, LayerId, PartitionKind, SortMode};
pub use material::{
    BlendMode, CullFace, DepthFunc, Material, MaterialKey, RenderState, ShaderPass, StencilState,
};
pub use mesh::{Mesh, MeshKey, PrimitiveRange, PrimitiveType, Vertex};
pub use mesh_instance::{
    default_sort_distance, CullMask, InstanceKey, MeshInstance, RenderStyle, ShaderParams,
    SortDistanceFn,
};
pub use picking::{pick_region, PickRect};
pub use scene_ctx::RenderScene;

use thiserror::Error;

/// Errors produced by the rendering core
#[derive(Error, Debug)]
pub enum RenderError {
    /// A draw was attempted with no shader bound for the active pass
    #[error("no shader bound for pass {pass:?} on material '{material}'")]
    NoShader {
        /// The shader pass that had no program
        pass: ShaderPass,
        /// Name of the offending material
        material: String,
    },

    /// A cull or sort pass was invoked without a camera
    #[error("render pass invoked with no camera")]
    NoCamera,

    /// A stale arena key was dereferenced where it must be live
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Error reported by the graphics device
    #[error("device error: {0}")]
    Device(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
