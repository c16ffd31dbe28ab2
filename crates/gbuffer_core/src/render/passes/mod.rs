//! # Render Passes
//!
//! The passes that fill the G-Buffer. Each reads the frame's
//! [`RenderSnapshot`] and the viewport layout through a [`PassContext`] and
//! records its work on a [`GraphicsDevice`].
//!
//! Passes never fail: a missing framebuffer or program is logged and the
//! affected pass (or sub-pass) draws nothing for the frame.

pub mod geometry;
pub mod house;
pub mod mirror;

pub use geometry::GeometryPassPipeline;
pub use mirror::MirrorPipeline;

use crate::core::RendererConfig;
use crate::render::backend::GraphicsDevice;
use crate::render::draw_commands::{DrawCategory, DrawIndexedIndirectCommand};
use crate::render::environment::DebugEnvironment;
use crate::render::frame_data::RenderSnapshot;
use crate::render::framebuffer::FramebufferRegistry;
use crate::render::state::RasterizerPresets;
use crate::render::viewport::{Viewport, ViewportManager};

/// Read-only frame state shared by every pass
///
/// Programs are passed next to it as `&mut ShaderLibrary` because setting a
/// uniform fills the program's location cache.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    /// Renderer settings
    pub config: &'a RendererConfig,
    /// Named framebuffers
    pub framebuffers: &'a FramebufferRegistry,
    /// Named rasterizer states
    pub presets: &'a RasterizerPresets,
    /// Viewport layout and visibility
    pub viewports: &'a ViewportManager,
    /// The frame's read-only input
    pub snapshot: &'a RenderSnapshot,
    /// Frame-capture tool signal
    pub environment: DebugEnvironment,
}

impl PassContext<'_> {
    /// Point the device at a viewport's region of the G-Buffer
    pub(crate) fn set_viewport(&self, device: &mut dyn GraphicsDevice, viewport: &Viewport) {
        let (width, height) = self.config.gbuffer_resolution;
        device.set_viewport(viewport.index(), viewport.pixel_rect(width, height));
    }

    /// Bind a named rasterizer preset, warning if it is not registered
    pub(crate) fn apply_preset(&self, device: &mut dyn GraphicsDevice, name: &str) {
        match self.presets.get(name) {
            Some(state) => device.apply_rasterizer_state(state),
            None => log::warn!("[RENDER] Rasterizer preset '{}' not registered", name),
        }
    }

    /// Submit one category's batch for every visible viewport
    pub(crate) fn draw_category(&self, device: &mut dyn GraphicsDevice, category: DrawCategory) {
        for viewport in self.viewports.visible() {
            self.set_viewport(device, viewport);
            submit_batch(
                device,
                self.environment,
                self.snapshot.draw_commands.get(category, viewport.index()),
            );
        }
    }
}

/// Submit an indirect batch
///
/// With a capture tool attached each command becomes its own instanced draw.
/// Empty batches submit nothing.
pub(crate) fn submit_batch(
    device: &mut dyn GraphicsDevice,
    environment: DebugEnvironment,
    commands: &[DrawIndexedIndirectCommand],
) {
    if commands.is_empty() {
        return;
    }
    if environment.capture_tool_attached {
        for command in commands {
            device.draw_indexed_instanced(command);
        }
    } else {
        device.multi_draw_indirect(commands);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the pass tests

    use super::*;
    use crate::render::framebuffer::FramebufferDesc;
    use crate::render::shader::{names, MemorySourceReader, ShaderLibrary, ShaderPreprocessor};

    /// Every program the passes use, as trivial sources
    pub fn shader_library(device: &mut dyn GraphicsDevice) -> ShaderLibrary<MemorySourceReader> {
        const PROGRAMS: [&str; 7] = [
            names::GBUFFER,
            names::DEBUG_TEXTURED,
            names::CHRISTMAS_LIGHTS_WIRE,
            names::DEBUG_RAGDOLL,
            names::MIRROR_MASK,
            names::GBUFFER_MIRROR,
            names::HOUSE_MIRROR,
        ];
        let mut reader = MemorySourceReader::new();
        for name in PROGRAMS {
            reader.insert(format!("shaders/{}.vert", name), "#version 460\nvoid main() {}\n");
            reader.insert(format!("shaders/{}.frag", name), "#version 460\nvoid main() {}\n");
        }
        let mut library = ShaderLibrary::new(ShaderPreprocessor::new(reader, "shaders", false));
        for name in PROGRAMS {
            let vert = format!("{}.vert", name);
            let frag = format!("{}.frag", name);
            library.load(device, name, &[vert.as_str(), frag.as_str()]).unwrap();
        }
        library
    }

    /// Registry holding a G-Buffer at the configured resolution
    pub fn framebuffers(device: &mut dyn GraphicsDevice, config: &RendererConfig) -> FramebufferRegistry {
        let (width, height) = config.gbuffer_resolution;
        let mut registry = FramebufferRegistry::new();
        registry.create(device, FramebufferDesc::gbuffer(width, height)).unwrap();
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{DeviceCommand, RecordingDevice};
    use crate::render::draw_commands::MeshRange;

    fn batch() -> Vec<DrawIndexedIndirectCommand> {
        let mesh = MeshRange { base_vertex: 0, base_index: 0, vertex_count: 3, index_count: 3 };
        (0..3).map(|i| DrawIndexedIndirectCommand::for_mesh(&mesh, i)).collect()
    }

    #[test]
    fn test_batch_is_one_multi_draw_without_capture_tool() {
        let mut device = RecordingDevice::new();
        submit_batch(&mut device, DebugEnvironment::new(false), &batch());

        assert_eq!(device.draw_calls(), 1);
        assert!(matches!(&device.commands()[0], DeviceCommand::MultiDrawIndirect(cmds) if cmds.len() == 3));
    }

    #[test]
    fn test_batch_is_split_with_capture_tool() {
        let mut device = RecordingDevice::new();
        submit_batch(&mut device, DebugEnvironment::new(true), &batch());

        assert_eq!(device.draw_calls(), 3);
        assert_eq!(device.count(|cmd| matches!(cmd, DeviceCommand::DrawIndexedInstanced(_))), 3);
    }

    #[test]
    fn test_empty_batch_submits_nothing() {
        let mut device = RecordingDevice::new();
        submit_batch(&mut device, DebugEnvironment::new(true), &[]);
        assert!(device.commands().is_empty());
    }
}
