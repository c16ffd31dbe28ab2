//! Profiler stand-in used when the `profiling` feature is off

use crate::core::ProfilerConfig;
use crate::render::backend::GraphicsDevice;

use super::ZoneStats;

/// Frame profiler with every operation compiled out
#[derive(Debug, Default)]
pub struct FrameProfiler;

#[allow(clippy::unused_self)]
impl FrameProfiler {
    /// Create the profiler; the configuration is ignored
    pub fn new(_config: ProfilerConfig) -> Self {
        Self
    }

    /// Always 0
    #[inline]
    pub fn frame_id(&self) -> u64 {
        0
    }

    /// Does nothing
    #[inline]
    pub fn begin_frame(&mut self, _device: &mut dyn GraphicsDevice) {}

    /// Does nothing
    #[inline]
    pub fn end_frame(&mut self, _device: &mut dyn GraphicsDevice) {}

    /// Does nothing
    #[inline]
    pub fn begin_zone(&mut self, _device: &mut dyn GraphicsDevice, _name: &str) {}

    /// Does nothing
    #[inline]
    pub fn end_zone(&mut self, _device: &mut dyn GraphicsDevice, _name: &str) {}

    /// Runs `f`
    #[inline]
    pub fn zone<T>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        _name: &str,
        f: impl FnOnce(&mut Self, &mut dyn GraphicsDevice) -> T,
    ) -> T {
        f(self, device)
    }

    /// Runs `f`
    #[inline]
    pub fn frame<T>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        f: impl FnOnce(&mut Self, &mut dyn GraphicsDevice) -> T,
    ) -> T {
        f(self, device)
    }

    /// Does nothing
    #[inline]
    pub fn reset(&mut self, _device: &mut dyn GraphicsDevice) {}

    /// Always empty
    pub fn zone_list(&self) -> &str {
        ""
    }

    /// Always empty
    pub fn cpu_timing_list(&self) -> &str {
        ""
    }

    /// Always empty
    pub fn gpu_timing_list(&self) -> &str {
        ""
    }

    /// Always empty
    pub fn total_cpu_frame_time(&self) -> &str {
        ""
    }

    /// Always empty
    pub fn total_gpu_frame_time(&self) -> &str {
        ""
    }

    /// Always 0
    pub fn zone_count(&self) -> usize {
        0
    }

    /// Always `None`
    pub fn zone_stats(&self, _name: &str) -> Option<ZoneStats> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::RecordingDevice;

    #[test]
    fn test_disabled_profiler_issues_nothing() {
        let mut device = RecordingDevice::new();
        let mut profiler = FrameProfiler::default();
        let value = profiler.frame(&mut device, |p, d| p.zone(d, "Pass", |_, _| 7));

        assert_eq!(value, 7);
        assert!(device.commands().is_empty());
        assert_eq!(profiler.zone_list(), "");
    }
}
