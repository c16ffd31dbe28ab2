//! Fixed-function rasterizer state
//!
//! Named presets bundle culling, depth, and blending so a pass can switch all
//! of them with one [`GraphicsDevice::apply_rasterizer_state`] call.
//!
//! [`GraphicsDevice::apply_rasterizer_state`]: crate::render::backend::GraphicsDevice::apply_rasterizer_state

use std::collections::HashMap;

/// Preset used by the opaque, alpha-discard, skinned and house passes
pub const GEOMETRY_PASS_NON_BLENDED: &str = "GeometryPass_NonBlended";

/// Preset used by the blended pass
pub const GEOMETRY_PASS_BLENDED: &str = "GeometryPass_Blended";

/// Face culling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Triangle winding treated as front facing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise (default)
    CounterClockwise,
    /// Clockwise, used while drawing reflections
    Clockwise,
}

/// Blend equation presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Blending disabled
    Opaque,
    /// `src_alpha, one_minus_src_alpha`
    Alpha,
}

/// Depth and stencil comparison functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    /// Never passes
    Never,
    /// Always passes
    Always,
    /// Passes when equal to the reference
    Equal,
    /// Passes when not equal to the reference
    NotEqual,
    /// Passes when less than the reference
    Less,
    /// Passes when less than or equal to the reference
    LessEqual,
}

/// Stencil buffer update operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    /// Keep the current value
    Keep,
    /// Write zero
    Zero,
    /// Write the reference value
    Replace,
}

/// Stencil test configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilState {
    /// Comparison against the reference value
    pub func: CompareFunc,
    /// Reference value
    pub reference: i32,
    /// Mask applied to both reference and stored value
    pub read_mask: u32,
    /// Operation when the stencil test fails
    pub stencil_fail: StencilOp,
    /// Operation when stencil passes but depth fails
    pub depth_fail: StencilOp,
    /// Operation when both tests pass
    pub pass: StencilOp,
}

impl StencilState {
    /// Stamp `reference` wherever a fragment passes the depth test
    pub fn write(reference: i32) -> Self {
        Self {
            func: CompareFunc::Always,
            reference,
            read_mask: 0xFF,
            stencil_fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Replace,
        }
    }

    /// Only rasterize where the stored value equals `reference`, never update it
    pub fn equal(reference: i32) -> Self {
        Self {
            func: CompareFunc::Equal,
            reference,
            read_mask: 0xFF,
            stencil_fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Keep,
        }
    }
}

/// Culling, depth and blend state applied as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizerState {
    /// Face culling
    pub cull_mode: CullMode,
    /// Enable depth testing
    pub depth_test: bool,
    /// Enable depth writing
    pub depth_write: bool,
    /// Depth comparison
    pub depth_func: CompareFunc,
    /// Blend equation
    pub blend: BlendMode,
    /// Point size for point primitives
    pub point_size: f32,
}

impl RasterizerState {
    /// Back-face culled, depth tested and written, no blending
    pub fn non_blended() -> Self {
        Self {
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
            depth_func: CompareFunc::Less,
            blend: BlendMode::Opaque,
            point_size: 1.0,
        }
    }

    /// Alpha blended, depth tested but not written
    pub fn blended() -> Self {
        Self {
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: false,
            depth_func: CompareFunc::Less,
            blend: BlendMode::Alpha,
            point_size: 1.0,
        }
    }
}

/// Registry of named rasterizer presets
#[derive(Debug, Clone)]
pub struct RasterizerPresets {
    states: HashMap<String, RasterizerState>,
}

impl RasterizerPresets {
    /// Empty registry
    pub fn empty() -> Self {
        Self { states: HashMap::new() }
    }

    /// Register or replace a preset
    pub fn insert(&mut self, name: impl Into<String>, state: RasterizerState) {
        self.states.insert(name.into(), state);
    }

    /// Look up a preset by name
    pub fn get(&self, name: &str) -> Option<&RasterizerState> {
        self.states.get(name)
    }
}

impl Default for RasterizerPresets {
    fn default() -> Self {
        let mut presets = Self::empty();
        presets.insert(GEOMETRY_PASS_NON_BLENDED, RasterizerState::non_blended());
        presets.insert(GEOMETRY_PASS_BLENDED, RasterizerState::blended());
        presets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_presets_registered() {
        let presets = RasterizerPresets::default();
        let opaque = presets.get(GEOMETRY_PASS_NON_BLENDED).unwrap();
        let blended = presets.get(GEOMETRY_PASS_BLENDED).unwrap();

        assert!(opaque.depth_write);
        assert_eq!(opaque.blend, BlendMode::Opaque);
        assert!(!blended.depth_write);
        assert_eq!(blended.blend, BlendMode::Alpha);
        assert!(presets.get("Missing").is_none());
    }
}
