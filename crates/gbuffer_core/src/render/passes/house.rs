//! House geometry pass
//!
//! House shell items carry their own textures, so they are drawn one by one
//! with direct base-vertex draws instead of through the indirect batches.

use crate::foundation::math::Mat4;
use crate::render::backend::{GraphicsDevice, MeshBufferHandle, VertexSource};
use crate::render::draw_commands::HouseRenderItem;
use crate::render::frame_data::RenderSnapshot;
use crate::render::framebuffer::{GBufferTargets, GBUFFER};
use crate::render::shader::{names, ShaderLibrary, SourceReader};
use crate::render::state::GEOMETRY_PASS_NON_BLENDED;

use super::{GeometryPassPipeline, PassContext};

impl GeometryPassPipeline {
    /// Record the house pass over every visible viewport
    pub fn house_geometry_pass<R: SourceReader>(
        ctx: &PassContext<'_>,
        shaders: &mut ShaderLibrary<R>,
        device: &mut dyn GraphicsDevice,
    ) {
        let Some(gbuffer) = ctx.framebuffers.get(GBUFFER) else {
            log::warn!("[HOUSE] Framebuffer '{}' missing, skipping pass", GBUFFER);
            return;
        };
        let Some(shader) = shaders.get_linked_mut(names::DEBUG_TEXTURED) else {
            log::warn!("[HOUSE] Shader '{}' unavailable, skipping pass", names::DEBUG_TEXTURED);
            return;
        };
        let Some(house_mesh) = ctx.snapshot.house_mesh else {
            return;
        };

        gbuffer.bind(device);
        gbuffer.set_draw_targets(device, GBufferTargets::ALL);
        ctx.apply_preset(device, GEOMETRY_PASS_NON_BLENDED);

        shader.bind(device);
        shader.set_mat4(device, "u_model", Mat4::identity());
        shader.set_bool(device, "u_flipNormalMapY", ctx.config.flip_normal_map_y);

        for viewport in ctx.viewports.visible() {
            ctx.set_viewport(device, viewport);
            shader.set_int(device, "u_viewportIndex", viewport.index().get() as i32);
            draw_house_items(device, ctx.snapshot, house_mesh, ctx.snapshot.house_items.iter());
        }
    }
}

/// Bind each item's three material textures and draw it
///
/// Items with an empty index range or a texture index outside the
/// snapshot's table are skipped.
pub(crate) fn draw_house_items<'a>(
    device: &mut dyn GraphicsDevice,
    snapshot: &RenderSnapshot,
    house_mesh: MeshBufferHandle,
    items: impl Iterator<Item = &'a HouseRenderItem>,
) {
    device.bind_vertex_source(VertexSource::Mesh(house_mesh));
    for item in items {
        if item.mesh.index_count == 0 {
            continue;
        }
        let Some(textures) = snapshot.house_item_textures(item) else {
            log::debug!("[HOUSE] Item references a texture outside the table, skipped");
            continue;
        };
        for (unit, texture) in textures.into_iter().enumerate() {
            device.bind_texture(unit as u32, texture);
        }
        device.draw_indexed(item.mesh.index_count, item.mesh.base_index, item.mesh.base_vertex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RendererConfig;
    use crate::foundation::math::{Aabb, Vec3};
    use crate::render::backend::{DeviceCommand, RecordingDevice, TextureHandle, UniformValue};
    use crate::render::draw_commands::MeshRange;
    use crate::render::environment::DebugEnvironment;
    use crate::render::passes::test_support;
    use crate::render::state::RasterizerPresets;
    use crate::render::viewport::{SplitscreenMode, ViewportManager};

    fn item(texture_index: u32, index_count: u32) -> HouseRenderItem {
        HouseRenderItem {
            base_color_texture_index: texture_index,
            normal_texture_index: texture_index,
            rma_texture_index: texture_index,
            mesh: MeshRange { base_vertex: 4, base_index: 12, vertex_count: 8, index_count },
            aabb: Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)),
        }
    }

    fn house_snapshot() -> RenderSnapshot {
        RenderSnapshot {
            house_mesh: Some(MeshBufferHandle(9)),
            house_items: vec![item(0, 6), item(5, 6), item(1, 0)],
            textures: vec![TextureHandle(100), TextureHandle(101)],
            ..RenderSnapshot::default()
        }
    }

    fn run(snapshot: &RenderSnapshot, viewports: &ViewportManager) -> RecordingDevice {
        let mut device = RecordingDevice::new();
        let config = RendererConfig::default();
        let mut shaders = test_support::shader_library(&mut device);
        let framebuffers = test_support::framebuffers(&mut device, &config);
        let presets = RasterizerPresets::default();
        device.clear_commands();

        let ctx = PassContext {
            config: &config,
            framebuffers: &framebuffers,
            presets: &presets,
            viewports,
            snapshot,
            environment: DebugEnvironment::default(),
        };
        GeometryPassPipeline::house_geometry_pass(&ctx, &mut shaders, &mut device);
        device
    }

    #[test]
    fn test_items_with_unknown_textures_are_skipped() {
        let device = run(&house_snapshot(), &ViewportManager::new());

        assert_eq!(device.draw_calls(), 1);
        assert!(device.commands().contains(&DeviceCommand::DrawIndexed {
            index_count: 6,
            base_index: 12,
            base_vertex: 4,
        }));
        assert_eq!(device.count(|cmd| matches!(cmd, DeviceCommand::BindTexture { .. })), 3);
    }

    #[test]
    fn test_each_visible_viewport_draws_house() {
        let mut viewports = ViewportManager::new();
        viewports.set_splitscreen_mode(SplitscreenMode::TwoPlayer);
        let device = run(&house_snapshot(), &viewports);

        assert_eq!(device.draw_calls(), 2);
        assert_eq!(
            device.uniform_values("u_viewportIndex"),
            vec![UniformValue::Int(0), UniformValue::Int(1)]
        );
    }

    #[test]
    fn test_no_house_mesh_draws_nothing() {
        let snapshot = RenderSnapshot { house_mesh: None, ..house_snapshot() };
        let device = run(&snapshot, &ViewportManager::new());
        assert_eq!(device.draw_calls(), 0);
    }
}
