//! Mirror reflection pass
//!
//! Runs as three stages over every visible viewport that has a mirror:
//!
//! 1. `Mask` stamps stencil 1 where the mirror surface is visible, testing
//!    against a backup of the scene depth.
//! 2. `Geometry` redraws the scene from the reflected camera inside that
//!    stencil, with a fresh depth range, reversed winding and the mirror
//!    plane as a clip plane.
//! 3. `Cleanup` restores winding, clipping, stencil and the primary depth.
//!
//! Only one reflection bounce is drawn.

use crate::foundation::math::Mat4;
use crate::render::backend::{GraphicsDevice, VertexSource};
use crate::render::draw_commands::DrawCategory;
use crate::render::framebuffer::{Framebuffer, GBufferTargets, GBUFFER};
use crate::render::mirror::{Mirror, MirrorManager, MirrorView};
use crate::render::shader::{names, ShaderLibrary, ShaderProgram, SourceReader};
use crate::render::state::{FrontFace, StencilState};
use crate::render::viewport::Viewport;

use super::house::draw_house_items;
use super::{submit_batch, PassContext};

const MIRROR_STENCIL_REF: i32 = 1;
const MIRROR_CLIP_PLANE: u32 = 0;

/// Stage of the mirror pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStage {
    /// Stamp mirror silhouettes into the stencil
    Mask,
    /// Draw reflected geometry inside the stencil
    Geometry,
    /// Restore default state
    Cleanup,
}

impl MirrorStage {
    /// Stages in execution order
    pub const SEQUENCE: [MirrorStage; 3] = [MirrorStage::Mask, MirrorStage::Geometry, MirrorStage::Cleanup];
}

type ActiveMirror<'a> = (&'a Viewport, &'a Mirror);

/// Draws planar reflections into the G-Buffer
pub struct MirrorPipeline;

impl MirrorPipeline {
    /// Record the mirror pass
    ///
    /// Does nothing when no visible viewport references a live mirror.
    pub fn mirror_geometry_pass<R: SourceReader>(
        ctx: &PassContext<'_>,
        shaders: &mut ShaderLibrary<R>,
        mirrors: &MirrorManager,
        device: &mut dyn GraphicsDevice,
    ) {
        let active: Vec<ActiveMirror<'_>> = ctx
            .viewports
            .visible()
            .filter_map(|viewport| {
                let mirror = viewport.mirror_id.and_then(|id| mirrors.get(id))?;
                Some((viewport, mirror))
            })
            .collect();
        if active.is_empty() {
            return;
        }

        let Some(gbuffer) = ctx.framebuffers.get(GBUFFER) else {
            log::warn!("[MIRROR] Framebuffer '{}' missing, skipping pass", GBUFFER);
            return;
        };
        if shaders.get_linked_mut(names::MIRROR_MASK).is_none() {
            log::warn!("[MIRROR] Shader '{}' unavailable, skipping pass", names::MIRROR_MASK);
            return;
        }

        gbuffer.bind(device);
        if let Err(e) = gbuffer.backup_depth(device) {
            log::warn!("[MIRROR] {}, skipping pass", e);
            return;
        }

        for stage in MirrorStage::SEQUENCE {
            log::trace!("[MIRROR] {:?} stage for {} viewport(s)", stage, active.len());
            match stage {
                MirrorStage::Mask => Self::mask(ctx, shaders, gbuffer, &active, device),
                MirrorStage::Geometry => Self::geometry(ctx, shaders, gbuffer, &active, device),
                MirrorStage::Cleanup => Self::cleanup(gbuffer, device),
            }
        }
    }

    fn mask<R: SourceReader>(
        ctx: &PassContext<'_>,
        shaders: &mut ShaderLibrary<R>,
        gbuffer: &Framebuffer,
        active: &[ActiveMirror<'_>],
        device: &mut dyn GraphicsDevice,
    ) {
        // Depth test against the scene without overwriting it
        if let Err(e) = gbuffer.use_backup_depth(device) {
            log::warn!("[MIRROR] {}", e);
        }
        device.set_color_write(false);
        device.set_depth_state(true, false);
        gbuffer.clear_stencil(device, 0);
        device.set_stencil_state(Some(StencilState::write(MIRROR_STENCIL_REF)));
        device.set_stencil_write_mask(0xFF);

        let Some(shader) = shaders.get_linked_mut(names::MIRROR_MASK) else {
            return;
        };
        shader.bind(device);
        device.bind_vertex_source(VertexSource::Static);

        for (viewport, mirror) in active {
            ctx.set_viewport(device, viewport);
            let data = &ctx.snapshot.viewport_data[viewport.index()];
            shader.set_mat4(device, "u_projectionView", data.projection_view);
            shader.set_mat4(device, "u_model", *mirror.world_matrix());
            let mesh = mirror.mesh();
            device.draw_indexed(mesh.index_count, mesh.base_index, mesh.base_vertex);
        }
    }

    fn geometry<R: SourceReader>(
        ctx: &PassContext<'_>,
        shaders: &mut ShaderLibrary<R>,
        gbuffer: &Framebuffer,
        active: &[ActiveMirror<'_>],
        device: &mut dyn GraphicsDevice,
    ) {
        device.set_color_write(true);
        gbuffer.set_draw_targets(device, GBufferTargets::ALL);
        gbuffer.clear_depth(device, 1.0);
        device.set_depth_state(true, true);
        device.set_front_face(FrontFace::Clockwise);
        device.set_clip_plane(MIRROR_CLIP_PLANE, true);
        device.set_stencil_state(Some(StencilState::equal(MIRROR_STENCIL_REF)));
        device.set_stencil_write_mask(0x00);

        match shaders.get_linked_mut(names::GBUFFER_MIRROR) {
            Some(shader) => {
                shader.bind(device);
                shader.set_bool(device, "u_flipNormalMapY", ctx.config.flip_normal_map_y);
                device.bind_vertex_source(VertexSource::Static);

                for (viewport, mirror) in active {
                    ctx.set_viewport(device, viewport);
                    set_reflection_uniforms(shader, viewport, mirror.view(viewport.index()), device);
                    submit_batch(
                        device,
                        ctx.environment,
                        ctx.snapshot.draw_commands.get(DrawCategory::MirrorClipped, viewport.index()),
                    );
                }
            }
            None => log::warn!("[MIRROR] Shader '{}' unavailable, skipping reflected geometry", names::GBUFFER_MIRROR),
        }

        let Some(house_mesh) = ctx.snapshot.house_mesh else {
            return;
        };
        match shaders.get_linked_mut(names::HOUSE_MIRROR) {
            Some(shader) => {
                shader.bind(device);
                shader.set_mat4(device, "u_model", Mat4::identity());
                shader.set_bool(device, "u_flipNormalMapY", ctx.config.flip_normal_map_y);

                for (viewport, mirror) in active {
                    let view = mirror.view(viewport.index());
                    ctx.set_viewport(device, viewport);
                    set_reflection_uniforms(shader, viewport, view, device);
                    let visible_items = ctx
                        .snapshot
                        .house_items
                        .iter()
                        .filter(|item| view.frustum.intersects_aabb(&item.aabb));
                    draw_house_items(device, ctx.snapshot, house_mesh, visible_items);
                }
            }
            None => log::warn!("[MIRROR] Shader '{}' unavailable, skipping reflected house", names::HOUSE_MIRROR),
        }
    }

    fn cleanup(gbuffer: &Framebuffer, device: &mut dyn GraphicsDevice) {
        device.set_front_face(FrontFace::CounterClockwise);
        device.set_clip_plane(MIRROR_CLIP_PLANE, false);
        device.set_stencil_state(None);
        device.set_stencil_write_mask(0xFF);
        gbuffer.use_primary_depth(device);
    }
}

fn set_reflection_uniforms(
    shader: &mut ShaderProgram,
    viewport: &Viewport,
    view: &MirrorView,
    device: &mut dyn GraphicsDevice,
) {
    shader.set_mat4(device, "u_view", view.view);
    shader.set_mat4(device, "u_projection", view.projection);
    shader.set_mat4(device, "u_projectionView", view.projection * view.view);
    shader.set_vec4(device, "u_clipPlane", view.clip_plane);
    shader.set_int(device, "u_viewportIndex", viewport.index().get() as i32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MirrorConfig, RendererConfig};
    use crate::foundation::math::{Aabb, Vec3};
    use crate::render::backend::{DepthAttachment, DeviceCommand, MeshBufferHandle, RecordingDevice, TextureHandle, UniformValue};
    use crate::render::draw_commands::{DrawIndexedIndirectCommand, HouseRenderItem, MeshRange};
    use crate::render::environment::DebugEnvironment;
    use crate::render::frame_data::{CameraPose, RenderSnapshot};
    use crate::render::mirror::MirrorDesc;
    use crate::render::passes::test_support;
    use crate::render::state::RasterizerPresets;
    use crate::render::viewport::{ViewportIndex, ViewportManager};

    fn mesh(index_count: u32) -> MeshRange {
        MeshRange { base_vertex: 0, base_index: 0, vertex_count: index_count, index_count }
    }

    fn house_item(center: Vec3) -> HouseRenderItem {
        let half = Vec3::new(0.2, 0.2, 0.2);
        HouseRenderItem {
            base_color_texture_index: 0,
            normal_texture_index: 0,
            rma_texture_index: 0,
            mesh: mesh(6),
            aabb: Aabb::new(center - half, center + half),
        }
    }

    struct Scene {
        config: RendererConfig,
        viewports: ViewportManager,
        mirrors: MirrorManager,
        snapshot: RenderSnapshot,
    }

    /// Floor mirror at y = 1 seen by viewport 0's camera from above
    fn scene(with_mirror: bool) -> Scene {
        let config = RendererConfig::default();
        let mut viewports = ViewportManager::new();
        let mut mirrors = MirrorManager::new(MirrorConfig::default());
        let mut snapshot = RenderSnapshot::default();

        snapshot.viewport_data[ViewportIndex::FIRST].camera = CameraPose {
            position: Vec3::new(0.0, 3.0, 0.0),
            forward: Vec3::new(0.0, -0.8, -0.6),
            up: Vec3::y(),
        };
        snapshot
            .draw_commands
            .push(DrawCategory::MirrorClipped, ViewportIndex::FIRST, DrawIndexedIndirectCommand::for_mesh(&mesh(6), 0));
        snapshot.house_mesh = Some(MeshBufferHandle(3));
        snapshot.textures = vec![TextureHandle(1)];
        // In front of the reflected camera, then far behind it
        snapshot.house_items = vec![house_item(Vec3::new(0.0, 0.6, -1.2)), house_item(Vec3::new(0.0, -40.0, 30.0))];

        if with_mirror {
            let id = mirrors.add(&MirrorDesc {
                parent_id: 1,
                mesh: mesh(6),
                local_bounds: Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 1.0)),
                local_normal: Vec3::y(),
            });
            viewports.get_mut(ViewportIndex::FIRST).mirror_id = Some(id);
            let lift = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
            mirrors.update(|_| Some(lift), &viewports, &snapshot.viewport_data, config.gbuffer_resolution);
        }

        Scene { config, viewports, mirrors, snapshot }
    }

    fn run(scene: &Scene) -> RecordingDevice {
        let mut device = RecordingDevice::new();
        let mut shaders = test_support::shader_library(&mut device);
        let framebuffers = test_support::framebuffers(&mut device, &scene.config);
        let presets = RasterizerPresets::default();
        device.clear_commands();

        let ctx = PassContext {
            config: &scene.config,
            framebuffers: &framebuffers,
            presets: &presets,
            viewports: &scene.viewports,
            snapshot: &scene.snapshot,
            environment: DebugEnvironment::default(),
        };
        MirrorPipeline::mirror_geometry_pass(&ctx, &mut shaders, &scene.mirrors, &mut device);
        device
    }

    fn position(device: &RecordingDevice, wanted: &DeviceCommand) -> usize {
        device
            .commands()
            .iter()
            .position(|cmd| cmd == wanted)
            .unwrap_or_else(|| panic!("{:?} not recorded", wanted))
    }

    #[test]
    fn test_no_active_mirror_is_a_no_op() {
        let device = run(&scene(false));
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_stages_run_in_order() {
        let device = run(&scene(true));
        let fb = match device.commands().iter().find(|cmd| matches!(cmd, DeviceCommand::BindFramebuffer(_))) {
            Some(DeviceCommand::BindFramebuffer(handle)) => *handle,
            _ => panic!("G-Buffer never bound"),
        };

        let copy = position(&device, &DeviceCommand::CopyDepthToBackup(fb));
        let backup = position(&device, &DeviceCommand::AttachDepth { framebuffer: fb, attachment: DepthAttachment::Backup });
        let stamp = position(&device, &DeviceCommand::SetStencilState(Some(StencilState::write(1))));
        let test = position(&device, &DeviceCommand::SetStencilState(Some(StencilState::equal(1))));
        let flip = position(&device, &DeviceCommand::SetFrontFace(FrontFace::Clockwise));
        let primary = position(&device, &DeviceCommand::AttachDepth { framebuffer: fb, attachment: DepthAttachment::Primary });
        assert!(copy < backup && backup < stamp && stamp < test && test < primary);
        assert!(flip < primary);

        let tail = &device.commands()[device.commands().len() - 5..];
        assert_eq!(
            tail,
            &[
                DeviceCommand::SetFrontFace(FrontFace::CounterClockwise),
                DeviceCommand::SetClipPlane { index: 0, enabled: false },
                DeviceCommand::SetStencilState(None),
                DeviceCommand::SetStencilWriteMask(0xFF),
                DeviceCommand::AttachDepth { framebuffer: fb, attachment: DepthAttachment::Primary },
            ]
        );
    }

    #[test]
    fn test_reflection_uses_mirror_clip_plane() {
        let scene = scene(true);
        let device = run(&scene);
        let mirror = scene.mirrors.iter().next().unwrap();

        let planes = device.uniform_values("u_clipPlane");
        assert!(!planes.is_empty());
        assert!(planes.iter().all(|plane| *plane == UniformValue::Vec4(mirror.clip_plane(0))));
    }

    #[test]
    fn test_house_items_are_culled_by_mirror_frustum() {
        let device = run(&scene(true));

        // Mask draw, one mirror-clipped batch, one visible house item
        assert_eq!(device.count(|cmd| matches!(cmd, DeviceCommand::DrawIndexed { .. })), 2);
        assert_eq!(device.count(|cmd| matches!(cmd, DeviceCommand::MultiDrawIndirect(_))), 1);
        assert_eq!(device.count(|cmd| matches!(cmd, DeviceCommand::BindTexture { .. })), 3);
    }
}
