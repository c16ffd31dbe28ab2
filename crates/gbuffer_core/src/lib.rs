//! # G-Buffer Geometry Core
//!
//! The geometry half of a deferred renderer for up to four split-screen
//! viewports.
//!
//! ## Features
//!
//! - **Geometry Pass**: opaque, alpha-tested, blended and skinned indirect
//!   batches plus decorative wires, ragdoll debug meshes and house geometry
//! - **Planar Mirrors**: stencil-masked, clip-plane bounded reflections with a
//!   per-viewport reflected camera
//! - **Shader Hot Reload**: `#include` flattening with per-line provenance so
//!   driver errors point at the original file; failed rebuilds keep the old
//!   program
//! - **Frame Profiler**: nested CPU and GPU timing zones with rolling
//!   averages, compiled out without the `profiling` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gbuffer_core::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     gbuffer_core::foundation::logging::init_with_level("info");
//!
//!     let config = RendererConfig::load_or_default("renderer.toml")?;
//!     let mut device = RecordingDevice::new();
//!     let mut renderer = Renderer::new(config);
//!     renderer.init(&mut device)?;
//!
//!     let viewports = ViewportManager::new();
//!     let mirrors = MirrorManager::default();
//!     let snapshot = RenderSnapshot::default();
//!     renderer.render_frame(&mut device, &snapshot, &viewports, &mirrors);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::Config,
        core::{CaptureToolMode, MirrorConfig, ProfilerConfig, RendererConfig, ShaderConfig},
        foundation::{
            math::{Mat4, Vec3, Vec4},
            time::Stopwatch,
        },
        render::{
            CameraPose, DrawCategory, DrawCommandsSet, DrawIndexedIndirectCommand, FrameProfiler, GraphicsDevice,
            MirrorDesc, MirrorId, MirrorManager, RecordingDevice, RenderError, RenderSnapshot, Renderer,
            SplitscreenMode, ViewportData, ViewportIndex, ViewportManager,
        },
    };
}
