//! Backend abstraction for the geometry core
//!
//! [`GraphicsDevice`] is the single seam between the passes in this crate and
//! a concrete graphics API. It exposes exactly the operations the geometry,
//! house and mirror passes, the shader programs, and the frame profiler need,
//! in the granularity they are issued. Implementations translate each call to
//! the API of their choice (an OpenGL 4.6 context in the shipping engine).
//!
//! All calls are made from the single frame-owning thread, in submission
//! order. Nothing here synchronizes beyond that order.

pub mod recording;

pub use recording::{RecordingDevice, DeviceCommand};

use crate::foundation::math::{IVec2, Mat4, Vec2, Vec3, Vec4};
use crate::render::draw_commands::DrawIndexedIndirectCommand;
use crate::render::framebuffer::FramebufferDesc;
use crate::render::shader::ShaderStage;
use crate::render::state::{FrontFace, RasterizerState, StencilState};
use crate::render::viewport::{PixelRect, ViewportIndex};
use crate::render::RenderResult;

/// Handle to a compiled (or failed) shader stage object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(pub u32);

/// Handle to a linked (or failed) program object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Resolved uniform binding location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u32);

/// Handle to a 2D texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to a self-contained vertex/index buffer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshBufferHandle(pub u32);

/// Handle to a GPU timestamp query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryHandle(pub u32);

/// Typed uniform payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `bool` (uploaded as int)
    Bool(bool),
    /// `int`
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2(Vec2),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `ivec2`
    IVec2(IVec2),
    /// `mat4`
    Mat4(Mat4),
}

macro_rules! impl_uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for UniformValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

impl_uniform_from! {
    bool => Bool,
    i32 => Int,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    IVec2 => IVec2,
    Mat4 => Mat4,
}

/// Which vertex/index storage subsequent draws read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSource {
    /// Global static vertex/index storage
    Static,
    /// Skinned vertex buffer plus weighted index buffer
    Skinned,
    /// A standalone mesh buffer (house shell, wires, ragdoll debug meshes)
    Mesh(MeshBufferHandle),
}

/// Depth attachment slot of a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthAttachment {
    /// The depth/stencil texture the scene renders into
    Primary,
    /// A copy of the primary depth used while drawing reflections
    Backup,
}

/// Result of compiling one stage
#[derive(Debug, Clone)]
pub struct StageCompileOutput {
    /// The stage object; must be released by the caller either way
    pub handle: StageHandle,
    /// Compile status
    pub success: bool,
    /// Compiler info log
    pub info_log: String,
}

/// Result of linking a program
#[derive(Debug, Clone)]
pub struct ProgramLinkOutput {
    /// The program object; must be released by the caller on failure
    pub handle: ProgramHandle,
    /// Link status
    pub success: bool,
    /// Linker info log
    pub info_log: String,
}

/// Graphics backend operations consumed by the geometry core
pub trait GraphicsDevice {
    // === Shaders ===

    /// Create and compile one shader stage from flattened source
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> StageCompileOutput;

    /// Release a stage object
    fn delete_stage(&mut self, stage: StageHandle);

    /// Create a program, attach `stages`, and link it
    fn link_program(&mut self, stages: &[StageHandle]) -> ProgramLinkOutput;

    /// Release a program object
    fn delete_program(&mut self, program: ProgramHandle);

    /// Make `program` current
    fn use_program(&mut self, program: ProgramHandle);

    /// Query the binding location of a named uniform
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Upload a uniform value to the current program
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    // === Framebuffers ===

    /// Create a framebuffer with the described attachments
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RenderResult<FramebufferHandle>;

    /// Bind a framebuffer for drawing
    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Select which color attachments (by slot) receive fragment outputs
    fn draw_buffers(&mut self, framebuffer: FramebufferHandle, slots: &[u32]);

    /// Copy the primary depth/stencil attachment into the backup
    fn copy_depth_to_backup(&mut self, framebuffer: FramebufferHandle);

    /// Attach the given depth texture as the framebuffer's depth/stencil attachment
    fn attach_depth(&mut self, framebuffer: FramebufferHandle, attachment: DepthAttachment);

    /// Clear the attached depth
    fn clear_depth(&mut self, framebuffer: FramebufferHandle, value: f32);

    /// Clear the attached stencil
    fn clear_stencil(&mut self, framebuffer: FramebufferHandle, value: i32);

    /// Set the viewport and scissor rectangle for one split-screen slot
    fn set_viewport(&mut self, index: ViewportIndex, rect: PixelRect);

    // === Fixed-function state ===

    /// Apply a full rasterizer preset
    fn apply_rasterizer_state(&mut self, state: &RasterizerState);

    /// Enable or disable writes to every color channel
    fn set_color_write(&mut self, enabled: bool);

    /// Depth test and depth write toggles
    fn set_depth_state(&mut self, test: bool, write: bool);

    /// Enable the stencil test with `state`, or disable it with `None`
    fn set_stencil_state(&mut self, state: Option<StencilState>);

    /// Stencil write mask
    fn set_stencil_write_mask(&mut self, mask: u32);

    /// Front face winding
    fn set_front_face(&mut self, winding: FrontFace);

    /// Enable or disable user clip distance `index`
    fn set_clip_plane(&mut self, index: u32, enabled: bool);

    // === Draws ===

    /// Select the vertex/index storage for subsequent draws
    fn bind_vertex_source(&mut self, source: VertexSource);

    /// Bind a 2D texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Issue every command in one indirect multi-draw
    fn multi_draw_indirect(&mut self, commands: &[DrawIndexedIndirectCommand]);

    /// Issue one indirect command as a direct instanced draw
    fn draw_indexed_instanced(&mut self, command: &DrawIndexedIndirectCommand);

    /// Plain indexed triangle draw with a base vertex
    fn draw_indexed(&mut self, index_count: u32, base_index: u32, base_vertex: i32);

    // === Timestamp queries ===

    /// Create a timestamp query object
    fn create_timestamp_query(&mut self) -> QueryHandle;

    /// Release a timestamp query object
    fn delete_query(&mut self, query: QueryHandle);

    /// Record the GPU timestamp into `query` once prior commands complete
    fn issue_timestamp(&mut self, query: QueryHandle);

    /// Non-blocking read of a timestamp in nanoseconds; `None` until available
    fn timestamp_result(&mut self, query: QueryHandle) -> Option<u64>;
}
