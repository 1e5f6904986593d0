//! Materials and render state
//!
//! A material couples a set of per-pass shader programs with the fixed
//! render state (blend, depth, stencil, cull) those programs are drawn
//! with. Its blend mode decides which partition of a layer an instance
//! lands in: anything that blends is transparent, everything else
//! (including alpha-tested cutouts) is opaque.

use std::collections::HashMap;

use crate::render::ShaderHandle;

slotmap::new_key_type! {
    /// Stable handle to a material owned by a render scene
    pub struct MaterialKey;
}

/// How fragment output combines with the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// No blending; fragments overwrite
    #[default]
    Opaque,
    /// Standard source-alpha blending
    AlphaBlend,
    /// Additive blending
    Additive,
    /// Multiplicative blending
    Multiply,
}

impl BlendMode {
    /// Whether this mode reads the framebuffer and therefore requires
    /// back-to-front submission
    pub fn is_transparent(self) -> bool {
        self != Self::Opaque
    }
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    /// Cull back faces
    #[default]
    Back,
    /// Cull front faces
    Front,
    /// Draw both faces
    None,
}

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    /// Pass when strictly closer
    Less,
    /// Pass when closer or equal
    #[default]
    LessEqual,
    /// Always pass
    Always,
}

/// Stencil test configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// Reference value compared against the buffer
    pub reference: u32,
    /// Mask applied to both sides of the comparison
    pub read_mask: u32,
    /// Mask applied to values written back
    pub write_mask: u32,
}

/// Fixed-function state a material is drawn with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// Framebuffer blend mode
    pub blend: BlendMode,
    /// Face culling mode
    pub cull_face: CullFace,
    /// Whether the depth test is enabled
    pub depth_test: bool,
    /// Whether depth writes are enabled
    pub depth_write: bool,
    /// Depth comparison function
    pub depth_func: DepthFunc,
    /// Stencil test, disabled when `None`
    pub stencil: Option<StencilState>,
    /// Alpha-test cutoff in [0, 1]; fragments below it are discarded
    pub alpha_test: Option<f32>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend: BlendMode::Opaque,
            cull_face: CullFace::Back,
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::LessEqual,
            stencil: None,
            alpha_test: None,
        }
    }
}

/// Named rendering pass a shader program is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderPass {
    /// Main lit forward pass
    Forward,
    /// Depth-only shadow map pass
    Shadow,
    /// Flat object-index pass for picking
    Pick,
}

/// Surface description shared by any number of mesh instances
#[derive(Debug, Clone)]
pub struct Material {
    /// Display name for logs and lookups
    pub name: String,
    /// Fixed-function state applied before drawing
    pub state: RenderState,
    shaders: HashMap<ShaderPass, ShaderHandle>,
}

impl Material {
    /// Create an opaque material with default render state and no shaders
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RenderState::default(),
            shaders: HashMap::new(),
        }
    }

    /// Set the blend mode (builder style)
    ///
    /// Blending materials default to depth-test without depth-write, the
    /// usual configuration for sorted transparents.
    pub fn with_blend_mode(mut self, blend: BlendMode) -> Self {
        self.state.blend = blend;
        if blend.is_transparent() {
            self.state.depth_write = false;
        }
        self
    }

    /// Set the shader program for a pass (builder style)
    pub fn with_shader(mut self, pass: ShaderPass, shader: ShaderHandle) -> Self {
        self.shaders.insert(pass, shader);
        self
    }

    /// Set an alpha-test cutoff (builder style)
    pub fn with_alpha_test(mut self, cutoff: f32) -> Self {
        self.state.alpha_test = Some(cutoff);
        self
    }

    /// Set the face culling mode (builder style)
    pub fn with_cull_face(mut self, cull_face: CullFace) -> Self {
        self.state.cull_face = cull_face;
        self
    }

    /// Shader program for a pass, if one is bound
    pub fn shader(&self, pass: ShaderPass) -> Option<ShaderHandle> {
        self.shaders.get(&pass).copied()
    }

    /// Replace the shader program for a pass
    pub fn set_shader(&mut self, pass: ShaderPass, shader: ShaderHandle) {
        self.shaders.insert(pass, shader);
    }

    /// Whether instances using this material belong in the transparent
    /// partition of a layer
    pub fn is_transparent(&self) -> bool {
        self.state.blend.is_transparent()
    }
}
