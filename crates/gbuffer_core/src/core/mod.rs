//! # Core Module
//!
//! Shared configuration for every subsystem of the geometry core.

pub mod config;

// Re-export commonly used config types
pub use config::{
    RendererConfig,
    ShaderConfig,
    ShaderProgramDesc,
    ProfilerConfig,
    MirrorConfig,
    CaptureToolMode,
    Config,
    ConfigError,
    ConfigFormat,
};
