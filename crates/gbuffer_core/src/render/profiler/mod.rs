//! # Frame Profiler
//!
//! CPU wall-clock and GPU timestamp timing for whole frames and for named,
//! nestable zones inside a frame. Every figure is a rolling average over the
//! configured window.
//!
//! ## Usage
//!
//! ```no_run
//! # use gbuffer_core::render::{FrameProfiler, RecordingDevice};
//! # use gbuffer_core::core::ProfilerConfig;
//! let mut device = RecordingDevice::new();
//! let mut profiler = FrameProfiler::new(ProfilerConfig::default());
//!
//! profiler.frame(&mut device, |profiler, device| {
//!     profiler.zone(device, "GeometryPass", |_, _| {
//!         // draw
//!     });
//! });
//! log::info!("{}", profiler.zone_list());
//! ```
//!
//! GPU timestamps are read back one frame after they are issued, so GPU
//! figures describe the previous frame. Zones not entered during a frame are
//! destroyed at the end of it.
//!
//! Building without the `profiling` feature swaps in a type with the same API
//! whose methods do nothing.

mod rolling_average;

#[cfg(feature = "profiling")]
mod timer;
#[cfg(feature = "profiling")]
pub use timer::FrameProfiler;

#[cfg(not(feature = "profiling"))]
mod noop;
#[cfg(not(feature = "profiling"))]
pub use noop::FrameProfiler;

pub use rolling_average::RollingAverage;

/// Averages of one zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneStats {
    /// Mean CPU duration in milliseconds
    pub cpu_ms: f64,
    /// Mean GPU duration in milliseconds
    pub gpu_ms: f64,
    /// CPU samples in the window
    pub cpu_samples: usize,
    /// GPU samples in the window
    pub gpu_samples: usize,
}

/// Fixed-point milliseconds, e.g. `"1.25 ms"`
#[cfg_attr(not(feature = "profiling"), allow(dead_code))]
pub(crate) fn format_ms(ms: f64, precision: usize) -> String {
    format!("{:.*} ms", precision, ms)
}
