//! Frame orchestration
//!
//! The [`Renderer`] owns the long-lived render state (programs, framebuffers,
//! rasterizer presets, profiler) and records one frame of G-Buffer work:
//! geometry, house, then mirrors, each inside a profiler zone.

use crate::core::RendererConfig;
use crate::render::backend::GraphicsDevice;
use crate::render::environment::DebugEnvironment;
use crate::render::frame_data::RenderSnapshot;
use crate::render::framebuffer::{FramebufferDesc, FramebufferRegistry};
use crate::render::mirror::MirrorManager;
use crate::render::passes::{GeometryPassPipeline, MirrorPipeline, PassContext};
use crate::render::profiler::FrameProfiler;
use crate::render::shader::{FsSourceReader, ShaderLibrary, ShaderPreprocessor, SourceReader};
use crate::render::state::RasterizerPresets;
use crate::render::viewport::ViewportManager;
use crate::render::{RenderError, RenderResult};

/// Profiler zone names, one per pass
pub mod zones {
    /// Main geometry pass
    pub const GEOMETRY_PASS: &str = "GeometryPass";
    /// House geometry pass
    pub const HOUSE_GEOMETRY_PASS: &str = "HouseGeometryPass";
    /// Mirror pass
    pub const MIRROR_GEOMETRY_PASS: &str = "MirrorGeometryPass";
}

/// G-Buffer renderer
pub struct Renderer<R: SourceReader = FsSourceReader> {
    config: RendererConfig,
    shaders: ShaderLibrary<R>,
    framebuffers: FramebufferRegistry,
    presets: RasterizerPresets,
    profiler: FrameProfiler,
    environment: DebugEnvironment,
}

impl Renderer<FsSourceReader> {
    /// Renderer reading shaders from `config.shaders.root_dir` on disk
    ///
    /// The capture-tool signal is detected from the process environment
    /// according to `config.capture_tool`.
    pub fn new(config: RendererConfig) -> Self {
        let environment = DebugEnvironment::detect(config.capture_tool);
        let preprocessor = ShaderPreprocessor::from_dir(
            config.shaders.root_dir.clone(),
            environment.capture_tool_attached,
        );
        Self::with_preprocessor(config, preprocessor, environment)
    }
}

impl<R: SourceReader> Renderer<R> {
    /// Renderer using a caller-supplied shader preprocessor
    pub fn with_preprocessor(
        config: RendererConfig,
        preprocessor: ShaderPreprocessor<R>,
        environment: DebugEnvironment,
    ) -> Self {
        let profiler = FrameProfiler::new(config.profiler);
        Self {
            config,
            shaders: ShaderLibrary::new(preprocessor),
            framebuffers: FramebufferRegistry::new(),
            presets: RasterizerPresets::default(),
            profiler,
            environment,
        }
    }

    /// Create the G-Buffer and build every configured program
    ///
    /// Programs that fail to build are logged and left unlinked; the passes
    /// that need them skip their work until a hotload succeeds.
    pub fn init(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        let (width, height) = self.config.gbuffer_resolution;
        self.framebuffers
            .create(device, FramebufferDesc::gbuffer(width, height))
            .map_err(|e| RenderError::InitializationFailed(format!("G-Buffer: {}", e)))?;

        let failures = self.shaders.load_all(device, &self.config.shaders.programs);
        log::info!(
            "[RENDERER] Initialized {}x{} G-Buffer, {} programs ({} failed), capture tool {}",
            width,
            height,
            self.config.shaders.programs.len(),
            failures,
            if self.environment.capture_tool_attached { "attached" } else { "not attached" }
        );
        Ok(())
    }

    /// Record one frame of G-Buffer work
    pub fn render_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        snapshot: &RenderSnapshot,
        viewports: &ViewportManager,
        mirrors: &MirrorManager,
    ) {
        let ctx = PassContext {
            config: &self.config,
            framebuffers: &self.framebuffers,
            presets: &self.presets,
            viewports,
            snapshot,
            environment: self.environment,
        };
        let shaders = &mut self.shaders;

        self.profiler.frame(device, |profiler, device| {
            profiler.zone(device, zones::GEOMETRY_PASS, |_, device| {
                GeometryPassPipeline::geometry_pass(&ctx, shaders, device);
            });
            profiler.zone(device, zones::HOUSE_GEOMETRY_PASS, |_, device| {
                GeometryPassPipeline::house_geometry_pass(&ctx, shaders, device);
            });
            profiler.zone(device, zones::MIRROR_GEOMETRY_PASS, |_, device| {
                MirrorPipeline::mirror_geometry_pass(&ctx, shaders, mirrors, device);
            });
        });
    }

    /// Rebuild every program from source, returning how many failed
    pub fn hotload_shaders(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        self.shaders.hotload_all(device)
    }

    /// Renderer settings
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Program registry
    pub fn shaders(&self) -> &ShaderLibrary<R> {
        &self.shaders
    }

    /// Program registry, mutably (e.g. to edit in-memory sources)
    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary<R> {
        &mut self.shaders
    }

    /// Framebuffer registry
    pub fn framebuffers(&self) -> &FramebufferRegistry {
        &self.framebuffers
    }

    /// Frame profiler
    pub fn profiler(&self) -> &FrameProfiler {
        &self.profiler
    }

    /// Capture-tool signal in effect
    pub fn environment(&self) -> DebugEnvironment {
        self.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProfilerConfig;
    use crate::render::backend::{DeviceCommand, RecordingDevice};
    use crate::render::shader::MemorySourceReader;

    fn renderer() -> Renderer<MemorySourceReader> {
        let config = RendererConfig {
            profiler: ProfilerConfig { skip_frames: 0, ..ProfilerConfig::default() },
            ..RendererConfig::default()
        };
        let mut reader = MemorySourceReader::new();
        for desc in &config.shaders.programs {
            for stage in &desc.stages {
                reader.insert(format!("{}/{}", config.shaders.root_dir, stage), "#version 460\nvoid main() {}\n");
            }
        }
        let preprocessor = ShaderPreprocessor::new(reader, config.shaders.root_dir.clone(), false);
        Renderer::with_preprocessor(config, preprocessor, DebugEnvironment::default())
    }

    #[test]
    fn test_init_creates_gbuffer_and_programs() {
        let mut device = RecordingDevice::new();
        let mut renderer = renderer();
        renderer.init(&mut device).unwrap();

        assert!(renderer.framebuffers().get(crate::render::framebuffer::GBUFFER).is_some());
        let programs = renderer.config().shaders.programs.len();
        assert_eq!(device.live_programs(), programs);
        assert_eq!(device.live_stages(), 0);
    }

    #[test]
    fn test_render_frame_profiles_each_pass() {
        let mut device = RecordingDevice::new();
        let mut renderer = renderer();
        renderer.init(&mut device).unwrap();

        let snapshot = RenderSnapshot::default();
        let viewports = ViewportManager::new();
        let mirrors = MirrorManager::default();
        for _ in 0..3 {
            renderer.render_frame(&mut device, &snapshot, &viewports, &mirrors);
        }

        assert!(device.count(|cmd| matches!(cmd, DeviceCommand::BindFramebuffer(_))) > 0);
        #[cfg(feature = "profiling")]
        {
            let zones = renderer.profiler().zone_list();
            assert!(zones.contains(zones::GEOMETRY_PASS));
            assert!(zones.contains(zones::HOUSE_GEOMETRY_PASS));
            assert!(zones.contains(zones::MIRROR_GEOMETRY_PASS));
        }
    }

    #[test]
    fn test_init_fails_for_empty_gbuffer() {
        let mut device = RecordingDevice::new();
        let mut renderer = renderer();
        renderer.config.gbuffer_resolution = (0, 0);
        assert!(matches!(renderer.init(&mut device), Err(RenderError::InitializationFailed(_))));
    }
}
