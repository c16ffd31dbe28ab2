//! Main G-Buffer geometry pass
//!
//! Sub-passes run in a fixed order, each over every visible viewport:
//! opaque, alpha discard, blended, skinned, decorative wires, ragdoll debug.

use crate::render::backend::{GraphicsDevice, VertexSource};
use crate::render::draw_commands::DrawCategory;
use crate::render::framebuffer::{Framebuffer, GBufferTargets, GBUFFER};
use crate::render::shader::{names, ShaderLibrary, ShaderProgram, SourceReader};
use crate::render::state::{GEOMETRY_PASS_BLENDED, GEOMETRY_PASS_NON_BLENDED};

use super::PassContext;

/// Fills the G-Buffer from the frame's indirect batches
pub struct GeometryPassPipeline;

impl GeometryPassPipeline {
    /// Record the geometry pass
    ///
    /// Does nothing if the G-Buffer or its program is unavailable. A missing
    /// wire or ragdoll program skips only that sub-pass.
    pub fn geometry_pass<R: SourceReader>(
        ctx: &PassContext<'_>,
        shaders: &mut ShaderLibrary<R>,
        device: &mut dyn GraphicsDevice,
    ) {
        let Some(gbuffer) = ctx.framebuffers.get(GBUFFER) else {
            log::warn!("[GEOMETRY] Framebuffer '{}' missing, skipping pass", GBUFFER);
            return;
        };
        let Some(shader) = shaders.get_linked_mut(names::GBUFFER) else {
            log::warn!("[GEOMETRY] Shader '{}' unavailable, skipping pass", names::GBUFFER);
            return;
        };

        gbuffer.bind(device);
        device.bind_vertex_source(VertexSource::Static);
        shader.bind(device);
        shader.set_bool(device, "u_flipNormalMapY", ctx.config.flip_normal_map_y);

        Self::static_geometry(ctx, gbuffer, shader, device);
        Self::skinned_geometry(ctx, gbuffer, shader, device);

        match shaders.get_linked_mut(names::CHRISTMAS_LIGHTS_WIRE) {
            Some(wire_shader) => Self::decorative_wires(ctx, wire_shader, device),
            None => log::warn!("[GEOMETRY] Shader '{}' unavailable, skipping wires", names::CHRISTMAS_LIGHTS_WIRE),
        }
        match shaders.get_linked_mut(names::DEBUG_RAGDOLL) {
            Some(ragdoll_shader) => Self::ragdolls(ctx, ragdoll_shader, device),
            None => log::warn!("[GEOMETRY] Shader '{}' unavailable, skipping ragdolls", names::DEBUG_RAGDOLL),
        }
    }

    fn static_geometry(
        ctx: &PassContext<'_>,
        gbuffer: &Framebuffer,
        shader: &mut ShaderProgram,
        device: &mut dyn GraphicsDevice,
    ) {
        gbuffer.set_draw_targets(device, GBufferTargets::ALL);
        ctx.apply_preset(device, GEOMETRY_PASS_NON_BLENDED);
        ctx.draw_category(device, DrawCategory::Opaque);

        shader.set_bool(device, "u_alphaDiscard", true);
        ctx.draw_category(device, DrawCategory::AlphaDiscard);
        shader.set_bool(device, "u_alphaDiscard", false);

        // Translucent surfaces only contribute color
        gbuffer.set_draw_targets(device, GBufferTargets::BASE_COLOR);
        ctx.apply_preset(device, GEOMETRY_PASS_BLENDED);
        ctx.draw_category(device, DrawCategory::Blended);
    }

    fn skinned_geometry(
        ctx: &PassContext<'_>,
        gbuffer: &Framebuffer,
        shader: &mut ShaderProgram,
        device: &mut dyn GraphicsDevice,
    ) {
        shader.bind(device);
        gbuffer.set_draw_targets(device, GBufferTargets::ALL);
        ctx.apply_preset(device, GEOMETRY_PASS_NON_BLENDED);
        device.bind_vertex_source(VertexSource::Skinned);
        ctx.draw_category(device, DrawCategory::Skinned);
    }

    fn decorative_wires(ctx: &PassContext<'_>, shader: &mut ShaderProgram, device: &mut dyn GraphicsDevice) {
        shader.bind(device);
        ctx.apply_preset(device, GEOMETRY_PASS_NON_BLENDED);

        for viewport in ctx.viewports.visible() {
            ctx.set_viewport(device, viewport);
            let data = &ctx.snapshot.viewport_data[viewport.index()];
            shader.set_int(device, "playerIndex", viewport.index().get() as i32);
            shader.set_mat4(device, "projection", data.projection);
            shader.set_mat4(device, "view", data.view);

            for wire in &ctx.snapshot.decorative_meshes {
                device.bind_vertex_source(VertexSource::Mesh(wire.mesh));
                device.draw_indexed(wire.index_count, 0, 0);
            }
        }
    }

    fn ragdolls(ctx: &PassContext<'_>, shader: &mut ShaderProgram, device: &mut dyn GraphicsDevice) {
        shader.bind(device);
        ctx.apply_preset(device, GEOMETRY_PASS_NON_BLENDED);

        for viewport in ctx.viewports.visible() {
            ctx.set_viewport(device, viewport);
            let data = &ctx.snapshot.viewport_data[viewport.index()];
            shader.set_int(device, "u_playerIndex", viewport.index().get() as i32);
            shader.set_mat4(device, "u_projectionView", data.projection_view);
            shader.set_mat4(device, "u_projection", data.projection);
            shader.set_mat4(device, "u_view", data.view);

            for ragdoll in ctx.snapshot.ragdolls.iter().filter(|ragdoll| ragdoll.enabled) {
                device.bind_vertex_source(VertexSource::Mesh(ragdoll.mesh));
                for submesh in &ragdoll.submeshes {
                    if submesh.range.index_count == 0 {
                        continue;
                    }
                    shader.set_mat4(device, "u_model", submesh.model_matrix);
                    shader.set_vec3(device, "u_color", submesh.color);
                    device.draw_indexed(submesh.range.index_count, submesh.range.base_index, submesh.range.base_vertex);
                }
            }
        }
    }
}
