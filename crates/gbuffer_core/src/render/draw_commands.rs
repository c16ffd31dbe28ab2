//! Indirect draw commands and per-frame batches
//!
//! [`DrawIndexedIndirectCommand`] matches the GPU's indirect command layout
//! and is uploaded as raw bytes. [`DrawCommandsSet`] holds one command list
//! per viewport for each draw category.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Aabb, Mat4};
use crate::render::viewport::{PerViewport, ViewportIndex};

/// One indexed indirect draw, laid out as the backend expects it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawIndexedIndirectCommand {
    /// Indices per instance
    pub index_count: u32,
    /// Instance count
    pub instance_count: u32,
    /// First index in the global index storage
    pub first_index: u32,
    /// Added to every index before vertex fetch
    pub base_vertex: i32,
    /// First instance id, used to look up per-instance data
    pub base_instance: u32,
}

impl DrawIndexedIndirectCommand {
    /// Single-instance draw of a mesh range, tagged with an instance id
    pub fn for_mesh(mesh: &MeshRange, base_instance: u32) -> Self {
        Self {
            index_count: mesh.index_count,
            instance_count: 1,
            first_index: mesh.base_index,
            base_vertex: mesh.base_vertex,
            base_instance,
        }
    }
}

/// Location of a mesh in vertex/index storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshRange {
    /// Offset added to indices
    pub base_vertex: i32,
    /// First index
    pub base_index: u32,
    /// Vertex count
    pub vertex_count: u32,
    /// Index count
    pub index_count: u32,
}

/// A single batched drawable
///
/// The batching stage writes these into a per-instance buffer; an indirect
/// command's `base_instance` is the item's position in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    /// World transform
    pub model_matrix: Mat4,
    /// Mesh addressing
    pub mesh: MeshRange,
    /// Base color texture index
    pub base_color_texture_index: u32,
    /// Normal map texture index
    pub normal_texture_index: u32,
    /// Roughness/metalness/AO texture index
    pub rma_texture_index: u32,
}

/// A house shell drawable, drawn directly with its own textures bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HouseRenderItem {
    /// Base color texture index
    pub base_color_texture_index: u32,
    /// Normal map texture index
    pub normal_texture_index: u32,
    /// Roughness/metalness/AO texture index
    pub rma_texture_index: u32,
    /// Mesh addressing within the house buffer
    pub mesh: MeshRange,
    /// World-space bounds
    pub aabb: Aabb,
}

/// Draw command categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawCategory {
    /// Opaque static geometry
    Opaque,
    /// Alpha-tested static geometry
    AlphaDiscard,
    /// Translucent geometry
    Blended,
    /// Animated geometry
    Skinned,
    /// Geometry drawn inside a mirror's reflection
    MirrorClipped,
}

impl DrawCategory {
    /// Every category
    pub const ALL: [DrawCategory; 5] = [
        DrawCategory::Opaque,
        DrawCategory::AlphaDiscard,
        DrawCategory::Blended,
        DrawCategory::Skinned,
        DrawCategory::MirrorClipped,
    ];
}

type Batch = PerViewport<Vec<DrawIndexedIndirectCommand>>;

/// Per-viewport indirect batches for one frame
#[derive(Debug, Clone, Default)]
pub struct DrawCommandsSet {
    opaque: Batch,
    alpha_discard: Batch,
    blended: Batch,
    skinned: Batch,
    mirror_clipped: Batch,
}

impl DrawCommandsSet {
    /// Empty batches
    pub fn new() -> Self {
        Self::default()
    }

    fn batch(&self, category: DrawCategory) -> &Batch {
        match category {
            DrawCategory::Opaque => &self.opaque,
            DrawCategory::AlphaDiscard => &self.alpha_discard,
            DrawCategory::Blended => &self.blended,
            DrawCategory::Skinned => &self.skinned,
            DrawCategory::MirrorClipped => &self.mirror_clipped,
        }
    }

    fn batch_mut(&mut self, category: DrawCategory) -> &mut Batch {
        match category {
            DrawCategory::Opaque => &mut self.opaque,
            DrawCategory::AlphaDiscard => &mut self.alpha_discard,
            DrawCategory::Blended => &mut self.blended,
            DrawCategory::Skinned => &mut self.skinned,
            DrawCategory::MirrorClipped => &mut self.mirror_clipped,
        }
    }

    /// Commands for one category and viewport
    pub fn get(&self, category: DrawCategory, viewport: ViewportIndex) -> &[DrawIndexedIndirectCommand] {
        &self.batch(category)[viewport]
    }

    /// Append a command
    pub fn push(&mut self, category: DrawCategory, viewport: ViewportIndex, command: DrawIndexedIndirectCommand) {
        self.batch_mut(category)[viewport].push(command);
    }

    /// Replace a viewport's commands for a category
    pub fn set(&mut self, category: DrawCategory, viewport: ViewportIndex, commands: Vec<DrawIndexedIndirectCommand>) {
        self.batch_mut(category)[viewport] = commands;
    }

    /// Total command count across every category and viewport
    pub fn total_commands(&self) -> usize {
        DrawCategory::ALL
            .iter()
            .map(|category| self.batch(*category).iter().map(Vec::len).sum::<usize>())
            .sum()
    }
}
