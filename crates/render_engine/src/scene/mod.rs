//! Scene-side state: transform hierarchy, cameras, and lights
//!
//! The scene graph is arena-indexed: nodes are stored in a slotmap and
//! referenced by stable [`NodeKey`] handles, with the parent held as a key
//! and children as an owned key list. This keeps removal and reparenting
//! safe without reference cycles.

mod camera;
mod graph;
mod light;

pub use camera::{Camera, Projection};
pub use graph::{NodeKey, SceneGraph, SceneNode};
pub use light::{Light, LightKind, LightKey, ShadowUpdateMode};

slotmap::new_key_type! {
    /// Stable handle to a camera owned by a render scene
    pub struct CameraKey;
}
