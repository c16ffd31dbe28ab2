//! # Geometry Rendering Core
//!
//! Everything needed to fill the deferred G-Buffer for up to four split-screen
//! viewports: the backend seam ([`GraphicsDevice`]), the shader preprocessor
//! and hot-reloadable programs, the frame profiler, viewports and mirrors, and
//! the geometry, house and mirror passes that consume a per-frame
//! [`RenderSnapshot`].
//!
//! ## Frame Structure
//!
//! ```text
//! Renderer::render_frame
//!   ├─ GeometryPass        opaque → alpha discard → blended → skinned → wires → ragdolls
//!   ├─ HouseGeometryPass   direct per-item draws with per-item textures
//!   └─ MirrorGeometryPass  MASK → GEOMETRY → CLEANUP
//! ```
//!
//! Submission is single threaded. Pass ordering is the only synchronization:
//! the depth copy precedes the stencil mask, which precedes the reflected draw.

pub mod backend;
pub mod draw_commands;
pub mod environment;
pub mod frame_data;
pub mod framebuffer;
pub mod frustum;
pub mod mirror;
pub mod passes;
pub mod profiler;
pub mod renderer;
pub mod shader;
pub mod state;
pub mod viewport;

pub use backend::{
    GraphicsDevice, RecordingDevice, DeviceCommand,
    StageHandle, ProgramHandle, UniformLocation, UniformValue,
    FramebufferHandle, TextureHandle, MeshBufferHandle, QueryHandle,
    VertexSource, DepthAttachment,
};
pub use draw_commands::{DrawIndexedIndirectCommand, DrawCommandsSet, DrawCategory, RenderItem, HouseRenderItem, MeshRange};
pub use environment::DebugEnvironment;
pub use frame_data::{RenderSnapshot, ViewportData, CameraPose, DecorativeMesh, DecorativeKind, RagdollDebugMesh, RagdollSubmesh};
pub use framebuffer::{Framebuffer, FramebufferDesc, FramebufferRegistry, GBufferTargets};
pub use frustum::Frustum;
pub use mirror::{Mirror, MirrorDesc, MirrorId, MirrorManager, MirrorView};
pub use passes::{GeometryPassPipeline, MirrorPipeline, PassContext};
pub use profiler::{FrameProfiler, ZoneStats};
pub use renderer::Renderer;
pub use shader::{ShaderProgram, ShaderLibrary, ShaderPreprocessor, ShaderError, ShaderStage};
pub use state::{RasterizerState, RasterizerPresets, StencilState, CompareFunc, StencilOp, FrontFace};
pub use viewport::{Viewport, ViewportIndex, ViewportManager, PerViewport, PixelRect, ShadingMode, SplitscreenMode, VIEWPORT_COUNT};

use thiserror::Error;

/// Rendering system errors
///
/// Shader build failures have their own type ([`ShaderError`]) because they
/// are always recovered locally by keeping the previous program.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A per-viewport or per-mirror index was outside its fixed range
    ///
    /// Most accessors return a safe default instead; this is raised only by
    /// the strict lookups that callers opt into.
    #[error("Index {index} out of range for {what} (capacity {capacity})")]
    OutOfRangeQuery {
        /// What was being indexed
        what: &'static str,
        /// The offending index
        index: usize,
        /// Valid range is `0..capacity`
        capacity: usize,
    },

    /// A named framebuffer, shader, or texture lookup failed
    #[error("Missing {kind} '{name}'")]
    MissingResource {
        /// Resource category
        kind: &'static str,
        /// Lookup name
        name: String,
    },

    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),
}

impl RenderError {
    /// Shorthand for [`RenderError::MissingResource`]
    pub fn missing(kind: &'static str, name: impl Into<String>) -> Self {
        Self::MissingResource { kind, name: name.into() }
    }
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
