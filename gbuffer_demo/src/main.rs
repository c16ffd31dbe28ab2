//! Split-screen mirror demo
//!
//! Drives the G-Buffer renderer headlessly for a few seconds of simulated
//! frames: two players orbit a floor mirror, the shaders are hotloaded
//! mid-run (once with a broken edit, once fixed), and the profiler report is
//! logged periodically.
//!
//! Usage: `split_screen_mirror [config.toml|config.ron]`

use gbuffer_core::config::{Config, ConfigError};
use gbuffer_core::core::RendererConfig;
use gbuffer_core::foundation::math::{Aabb, Mat4, Mat4Ext, Vec3};
use gbuffer_core::render::shader::{MemorySourceReader, ShaderPreprocessor};
use gbuffer_core::render::{
    CameraPose, DebugEnvironment, DrawCategory, DrawIndexedIndirectCommand, HouseRenderItem, MeshBufferHandle,
    MeshRange, MirrorDesc, MirrorManager, RecordingDevice, RenderError, RenderSnapshot, Renderer, SplitscreenMode,
    TextureHandle, ViewportData, ViewportIndex, ViewportManager,
};

const FRAME_COUNT: u64 = 180;
const REPORT_INTERVAL: u64 = 60;
const MIRROR_PARENT: u64 = 1;
const BROKEN_MARKER: &str = "undefined_symbol";

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("renderer: {0}")]
    Render(#[from] RenderError),
}

/// Minimal GLSL for every program the renderer builds
fn shader_sources(root: &str) -> MemorySourceReader {
    let simple = "#version 460 core\nvoid main() {\n}\n";
    MemorySourceReader::new()
        .with_file(format!("{root}/common/gbuffer_common.glsl"), "vec3 decode_normal(vec3 n) {\n    return n * 2.0 - 1.0;\n}\n")
        .with_file(format!("{root}/GBuffer.vert"), simple)
        .with_file(
            format!("{root}/GBuffer.frag"),
            "#version 460 core\n#include \"common/gbuffer_common.glsl\"\nvoid main() {\n}\n",
        )
        .with_file(format!("{root}/GBufferMirror.vert"), simple)
        .with_file(format!("{root}/DebugTextured.vert"), simple)
        .with_file(format!("{root}/DebugTextured.frag"), simple)
        .with_file(format!("{root}/HouseMirror.vert"), simple)
        .with_file(format!("{root}/ChristmasLightsWire.vert"), simple)
        .with_file(format!("{root}/ChristmasLightsWire.frag"), simple)
        .with_file(format!("{root}/DebugRagdoll.vert"), simple)
        .with_file(format!("{root}/DebugRagdoll.frag"), simple)
        .with_file(format!("{root}/MirrorMask.vert"), simple)
        .with_file(format!("{root}/MirrorMask.frag"), simple)
}

struct SplitScreenMirrorApp {
    renderer: Renderer<MemorySourceReader>,
    device: RecordingDevice,
    viewports: ViewportManager,
    mirrors: MirrorManager,
    snapshot: RenderSnapshot,
}

impl SplitScreenMirrorApp {
    fn new(config: RendererConfig) -> Result<Self, DemoError> {
        let environment = DebugEnvironment::detect(config.capture_tool);
        let preprocessor = ShaderPreprocessor::new(
            shader_sources(&config.shaders.root_dir),
            config.shaders.root_dir.clone(),
            environment.capture_tool_attached,
        );
        let mirrors = MirrorManager::new(config.mirror);
        let mut renderer = Renderer::with_preprocessor(config, preprocessor, environment);
        let mut device = RecordingDevice::new();
        renderer.init(&mut device)?;

        let mut viewports = ViewportManager::new();
        viewports.set_splitscreen_mode(SplitscreenMode::TwoPlayer);

        let mut app = Self {
            renderer,
            device,
            viewports,
            mirrors,
            snapshot: RenderSnapshot::default(),
        };
        app.build_level();
        Ok(app)
    }

    fn build_level(&mut self) {
        let quad = MeshRange { base_vertex: 0, base_index: 0, vertex_count: 4, index_count: 6 };
        let mirror = self.mirrors.add(&MirrorDesc {
            parent_id: MIRROR_PARENT,
            mesh: quad,
            local_bounds: Aabb::new(Vec3::new(-2.0, 0.0, -2.0), Vec3::new(2.0, 0.0, 2.0)),
            local_normal: Vec3::y(),
        });
        for index in ViewportIndex::ALL {
            self.viewports.get_mut(index).mirror_id = Some(mirror);
        }

        let crate_mesh = MeshRange { base_vertex: 4, base_index: 6, vertex_count: 24, index_count: 36 };
        self.snapshot.textures = (0..3).map(TextureHandle).collect();
        self.snapshot.house_mesh = Some(MeshBufferHandle(1));
        self.snapshot.house_items = (0..4)
            .map(|i| {
                let center = Vec3::new(i as f32 * 2.0 - 3.0, 1.0, -4.0);
                HouseRenderItem {
                    base_color_texture_index: 0,
                    normal_texture_index: 1,
                    rma_texture_index: 2,
                    mesh: crate_mesh,
                    aabb: Aabb::new(center - Vec3::repeat(0.5), center + Vec3::repeat(0.5)),
                }
            })
            .collect();

        for index in ViewportIndex::ALL {
            for (category, instances) in [
                (DrawCategory::Opaque, 12),
                (DrawCategory::AlphaDiscard, 3),
                (DrawCategory::Blended, 2),
                (DrawCategory::Skinned, 1),
                (DrawCategory::MirrorClipped, 12),
            ] {
                let commands = (0..instances)
                    .map(|i| DrawIndexedIndirectCommand::for_mesh(&crate_mesh, i))
                    .collect();
                self.snapshot.draw_commands.set(category, index, commands);
            }
        }
    }

    /// Orbit each player's camera around the mirror
    fn update_cameras(&mut self, frame: u64) {
        let (width, height) = self.renderer.config().gbuffer_resolution;
        for index in ViewportIndex::ALL {
            let angle = frame as f32 * 0.02 + index.get() as f32 * std::f32::consts::PI;
            let position = Vec3::new(6.0 * angle.cos(), 3.0, 6.0 * angle.sin());
            let camera = CameraPose {
                position,
                forward: (-position).normalize(),
                up: Vec3::y(),
            };
            let view = Mat4::look_at(position, Vec3::zeros(), Vec3::y());
            let viewport = self.viewports.get_mut(index);
            let projection = viewport.projection_matrix(width, height);
            let data = ViewportData::new(projection, view, camera);
            viewport.update_frustum(&data.projection_view);
            self.snapshot.viewport_data[index] = data;
        }

        let mirror_world = Mat4::identity();
        self.mirrors.update(
            |parent| (parent == MIRROR_PARENT).then_some(mirror_world),
            &self.viewports,
            &self.snapshot.viewport_data,
            self.renderer.config().gbuffer_resolution,
        );
    }

    /// Edit a shader on "disk" and hotload everything
    fn edit_and_hotload(&mut self, source: &str) {
        let path = format!("{}/GBuffer.frag", self.renderer.config().shaders.root_dir);
        self.renderer
            .shaders_mut()
            .preprocessor_mut()
            .reader_mut()
            .insert(path, source);
        let failures = self.renderer.hotload_shaders(&mut self.device);
        log::info!("Hotload finished with {} failed program(s)", failures);
    }

    fn run(&mut self) {
        self.device.fail_compile_on(BROKEN_MARKER, "'undefined_symbol' : undeclared identifier");

        for frame in 1..=FRAME_COUNT {
            self.update_cameras(frame);
            self.device.clear_commands();
            self.renderer
                .render_frame(&mut self.device, &self.snapshot, &self.viewports, &self.mirrors);

            if frame == FRAME_COUNT / 3 {
                log::info!("Hotloading a broken G-Buffer shader; the previous program stays bound");
                self.edit_and_hotload(&format!(
                    "#version 460 core\n#include \"common/gbuffer_common.glsl\"\nvoid main() {{\n    {};\n}}\n",
                    BROKEN_MARKER
                ));
            } else if frame == 2 * FRAME_COUNT / 3 {
                log::info!("Hotloading the fixed G-Buffer shader");
                self.edit_and_hotload("#version 460 core\n#include \"common/gbuffer_common.glsl\"\nvoid main() {\n}\n");
            }

            if frame % REPORT_INTERVAL == 0 {
                self.log_report(frame);
            }
        }
    }

    fn log_report(&self, frame: u64) {
        let profiler = self.renderer.profiler();
        log::info!("Frame {}: {} device calls, {} draws", frame, self.device.commands().len(), self.device.draw_calls());
        for ((zone, cpu), gpu) in profiler
            .zone_list()
            .lines()
            .zip(profiler.cpu_timing_list().lines())
            .zip(profiler.gpu_timing_list().lines())
        {
            log::info!("  {:<20} cpu {:>10}  gpu {:>10}", zone, cpu, gpu);
        }
        log::info!("  CPU {}", profiler.total_cpu_frame_time());
        log::info!("  GPU {}", profiler.total_gpu_frame_time());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    gbuffer_core::foundation::logging::init_deferred();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "renderer.toml".to_string());
    let config = RendererConfig::load_or_default(&config_path).map_err(DemoError::from)?;

    // RUST_LOG overrides the configured level
    gbuffer_core::foundation::logging::apply_level(&config.log_level);

    config.validate().map_err(DemoError::from)?;

    log::info!("Starting split-screen mirror demo ({} frames)", FRAME_COUNT);
    let mut app = SplitScreenMirrorApp::new(config)?;
    app.run();
    log::info!("Demo finished");
    Ok(())
}
