//! # Render Engine
//!
//! A CPU-side forward rendering core: given a hierarchy of transformable
//! scene nodes carrying drawable mesh instances, it decides what to draw,
//! in what order, and how many draw calls are required, then submits that
//! work to an abstract graphics device once per frame.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-indexed transform hierarchy with cached world
//!   matrices and lazy invalidation
//! - **Culling**: Frustum/volume intersection with a conservative edge policy
//! - **Layered Composition**: Ordered opaque/transparent sub-passes shared
//!   across cameras, with per-layer sort disciplines
//! - **Batching**: Render-state-aware merging of compatible mesh instances
//!   into minimal draw calls
//! - **Device Agnostic**: Draw submission goes through the [`render::GpuDevice`]
//!   trait; no graphics API is linked
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//!
//! let config = RenderConfig::default();
//! let mut scene = RenderScene::new();
//! let mut composition = LayerComposition::new("main");
//! composition.push(Layer::new(0, "world"));
//! let mut renderer = ForwardRenderer::new(config);
//! // per frame: renderer.render_composition(&mut scene, &mut composition, &mut device)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod events;
pub mod foundation;
pub mod geometry;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::RenderConfig,
        foundation::math::{Mat4, Quat, Transform, Vec3},
        geometry::{Aabb, BoundingSphere, Containment, Frustum, Ray},
        render::{
            Batch, BatchGroup, BatchManager, ClearFlags, ClearOptions, CullMask, ForwardRenderer,
            GpuDevice, Layer, LayerComposition, Material, Mesh, MeshInstance, RenderError,
            RenderResult, RenderScene, SortMode, Vertex,
        },
        scene::{Camera, Light, NodeKey, SceneGraph},
    };
}
