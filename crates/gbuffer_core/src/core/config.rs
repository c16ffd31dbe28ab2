//! # Renderer Configuration
//!
//! All tunables of the geometry core in one serializable tree. Loaded from
//! TOML or RON through the [`Config`] trait, or built in code with the
//! `with_*` setters.
//!
//! ```toml
//! gbuffer_resolution = [1920, 1080]
//! flip_normal_map_y = false
//! capture_tool = "Auto"
//!
//! [shaders]
//! root_dir = "res/shaders/OpenGL"
//!
//! [profiler]
//! average_frame_count = 60
//! skip_frames = 1
//! output_precision = 2
//!
//! [mirror]
//! far_distance = 5.0
//! plane_epsilon = 0.0001
//! ```

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError, ConfigFormat};

/// One named shader program and the stage files it is linked from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderProgramDesc {
    /// Lookup name used by the render passes
    pub name: String,
    /// Stage files relative to the shader root
    pub stages: Vec<String>,
}

impl ShaderProgramDesc {
    /// Create a program description
    pub fn new(name: impl Into<String>, stages: &[&str]) -> Self {
        Self {
            name: name.into(),
            stages: stages.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// # Shader Configuration
///
/// Where shader sources live and which programs the renderer builds at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory every shader path is resolved against
    pub root_dir: String,
    /// Programs loaded by `Renderer::init`
    pub programs: Vec<ShaderProgramDesc>,
}

impl ShaderConfig {
    /// Create a shader configuration rooted at `root_dir` with the default program set
    pub fn new(root_dir: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            programs: Self::default_programs(),
        }
    }

    /// Programs the geometry and mirror passes look up by name
    pub fn default_programs() -> Vec<ShaderProgramDesc> {
        use crate::render::shader::names;
        vec![
            ShaderProgramDesc::new(names::GBUFFER, &["GBuffer.vert", "GBuffer.frag"]),
            ShaderProgramDesc::new(names::DEBUG_TEXTURED, &["DebugTextured.vert", "DebugTextured.frag"]),
            ShaderProgramDesc::new(names::CHRISTMAS_LIGHTS_WIRE, &["ChristmasLightsWire.vert", "ChristmasLightsWire.frag"]),
            ShaderProgramDesc::new(names::DEBUG_RAGDOLL, &["DebugRagdoll.vert", "DebugRagdoll.frag"]),
            ShaderProgramDesc::new(names::MIRROR_MASK, &["MirrorMask.vert", "MirrorMask.frag"]),
            ShaderProgramDesc::new(names::GBUFFER_MIRROR, &["GBufferMirror.vert", "GBuffer.frag"]),
            ShaderProgramDesc::new(names::HOUSE_MIRROR, &["HouseMirror.vert", "DebugTextured.frag"]),
        ]
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.root_dir.is_empty() {
            return Err("Shader root directory cannot be empty".to_string());
        }
        for program in &self.programs {
            if program.stages.is_empty() {
                return Err(format!("Shader program '{}' has no stages", program.name));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("res/shaders/OpenGL")
    }
}

/// # Profiler Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Rolling average window in frames
    pub average_frame_count: usize,
    /// Leading frames excluded from all timing while queries settle
    pub skip_frames: u64,
    /// Decimal places in formatted timings
    pub output_precision: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            average_frame_count: 60,
            skip_frames: 1,
            output_precision: 2,
        }
    }
}

/// # Mirror Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Far plane of the reflected camera's projection
    pub far_distance: f32,
    /// Bias added to the clip plane so the mirror surface does not clip itself
    pub plane_epsilon: f32,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            far_distance: 5.0,
            plane_epsilon: 1e-4,
        }
    }
}

/// How the frame-capture tool signal is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureToolMode {
    /// Detect from the process environment
    #[default]
    Auto,
    /// Behave as if a capture tool is attached
    ForceOn,
    /// Ignore any attached capture tool
    ForceOff,
}

/// # Renderer Configuration
///
/// Top-level configuration of the geometry core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// G-Buffer size in pixels
    pub gbuffer_resolution: (u32, u32),
    /// Flip the green channel of normal maps
    pub flip_normal_map_y: bool,
    /// Capture tool signal source
    pub capture_tool: CaptureToolMode,
    /// Shader sources and programs
    pub shaders: ShaderConfig,
    /// Frame profiler tunables
    pub profiler: ProfilerConfig,
    /// Mirror reflection tunables
    pub mirror: MirrorConfig,
}

impl RendererConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            gbuffer_resolution: (1920, 1080),
            flip_normal_map_y: false,
            capture_tool: CaptureToolMode::Auto,
            shaders: ShaderConfig::default(),
            profiler: ProfilerConfig::default(),
            mirror: MirrorConfig::default(),
        }
    }

    /// Set the G-Buffer resolution
    pub fn with_gbuffer_resolution(mut self, width: u32, height: u32) -> Self {
        self.gbuffer_resolution = (width, height);
        self
    }

    /// Set shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the capture tool mode
    pub fn with_capture_tool(mut self, mode: CaptureToolMode) -> Self {
        self.capture_tool = mode;
        self
    }

    /// Set profiler configuration
    pub fn with_profiler(mut self, profiler: ProfilerConfig) -> Self {
        self.profiler = profiler;
        self
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.gbuffer_resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid("G-Buffer resolution must be non-zero".to_string()));
        }
        if self.profiler.average_frame_count == 0 {
            return Err(ConfigError::Invalid("Profiler average window must be at least 1 frame".to_string()));
        }
        if self.mirror.far_distance <= 0.0 {
            return Err(ConfigError::Invalid("Mirror far distance must be positive".to_string()));
        }
        self.shaders.validate().map_err(ConfigError::Invalid)
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RendererConfig {}
