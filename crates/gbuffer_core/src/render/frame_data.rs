//! Per-frame render snapshot
//!
//! Everything the passes read in one frame, produced upstream and consumed
//! read-only. Nothing in the render passes mutates a snapshot.

use crate::foundation::math::{Mat4, Vec3};
use crate::render::backend::{MeshBufferHandle, TextureHandle};
use crate::render::draw_commands::{DrawCommandsSet, HouseRenderItem, MeshRange, RenderItem};
use crate::render::viewport::PerViewport;

/// World-space camera orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Eye position
    pub position: Vec3,
    /// Unit view direction
    pub forward: Vec3,
    /// Unit up direction
    pub up: Vec3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            forward: -Vec3::z(),
            up: Vec3::y(),
        }
    }
}

/// Camera matrices of one viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportData {
    /// Projection matrix
    pub projection: Mat4,
    /// View matrix
    pub view: Mat4,
    /// `projection * view`
    pub projection_view: Mat4,
    /// Camera the view matrix was built from
    pub camera: CameraPose,
}

impl ViewportData {
    /// Build from a projection and a view, deriving the product
    pub fn new(projection: Mat4, view: Mat4, camera: CameraPose) -> Self {
        Self {
            projection,
            view,
            projection_view: projection * view,
            camera,
        }
    }
}

impl Default for ViewportData {
    fn default() -> Self {
        Self::new(Mat4::identity(), Mat4::identity(), CameraPose::default())
    }
}

/// Kinds of decorative wire meshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorativeKind {
    /// Strings of Christmas lights
    ChristmasLights,
    /// Wires between power poles
    PowerLineWire,
}

/// A non-batched wire mesh drawn with its own buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorativeMesh {
    /// What the mesh is
    pub kind: DecorativeKind,
    /// Vertex/index buffer
    pub mesh: MeshBufferHandle,
    /// Indices to draw
    pub index_count: u32,
}

/// One rigid body's piece of a ragdoll debug mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RagdollSubmesh {
    /// Range within the ragdoll's buffer
    pub range: MeshRange,
    /// World transform of the driving rigid body
    pub model_matrix: Mat4,
    /// Debug color
    pub color: Vec3,
}

/// Physics visualization of one ragdoll
#[derive(Debug, Clone, PartialEq)]
pub struct RagdollDebugMesh {
    /// Vertex/index buffer shared by every submesh
    pub mesh: MeshBufferHandle,
    /// Draw this ragdoll
    pub enabled: bool,
    /// Per-rigid-body pieces
    pub submeshes: Vec<RagdollSubmesh>,
}

/// Read-only input of one frame
#[derive(Debug, Clone, Default)]
pub struct RenderSnapshot {
    /// Indirect batches by category and viewport
    pub draw_commands: DrawCommandsSet,
    /// Camera matrices by viewport
    pub viewport_data: PerViewport<ViewportData>,
    /// Per-instance data the indirect batches index into
    pub render_items: Vec<RenderItem>,
    /// House shell items
    pub house_items: Vec<HouseRenderItem>,
    /// Buffer the house items address
    pub house_mesh: Option<MeshBufferHandle>,
    /// Wire meshes
    pub decorative_meshes: Vec<DecorativeMesh>,
    /// Ragdoll debug meshes
    pub ragdolls: Vec<RagdollDebugMesh>,
    /// Texture table addressed by the items' texture indices
    pub textures: Vec<TextureHandle>,
}

impl RenderSnapshot {
    /// Resolve a texture index, `None` when outside the table
    pub fn texture(&self, index: u32) -> Option<TextureHandle> {
        self.textures.get(index as usize).copied()
    }

    /// Resolve an item's three material textures
    pub fn house_item_textures(&self, item: &HouseRenderItem) -> Option<[TextureHandle; 3]> {
        Some([
            self.texture(item.base_color_texture_index)?,
            self.texture(item.normal_texture_index)?,
            self.texture(item.rma_texture_index)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Aabb;

    #[test]
    fn test_house_textures_require_every_index() {
        let snapshot = RenderSnapshot {
            textures: vec![TextureHandle(10), TextureHandle(11)],
            ..RenderSnapshot::default()
        };
        let mut item = HouseRenderItem {
            base_color_texture_index: 0,
            normal_texture_index: 1,
            rma_texture_index: 1,
            mesh: MeshRange::default(),
            aabb: Aabb::default(),
        };
        assert_eq!(
            snapshot.house_item_textures(&item),
            Some([TextureHandle(10), TextureHandle(11), TextureHandle(11)])
        );

        item.rma_texture_index = 2;
        assert!(snapshot.house_item_textures(&item).is_none());
    }
}
