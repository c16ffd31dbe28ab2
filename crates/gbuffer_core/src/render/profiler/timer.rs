//! Timestamp-query backed profiler

use std::collections::HashMap;

use crate::core::ProfilerConfig;
use crate::foundation::time::Stopwatch;
use crate::render::backend::{GraphicsDevice, QueryHandle};

use super::{format_ms, RollingAverage, ZoneStats};

/// Start/end timestamp pair written during one frame
#[derive(Debug, Clone, Copy)]
struct QueryPair {
    start: QueryHandle,
    end: QueryHandle,
    start_frame: u64,
    end_frame: u64,
    pending: bool,
}

impl QueryPair {
    fn create(device: &mut dyn GraphicsDevice) -> Self {
        Self {
            start: device.create_timestamp_query(),
            end: device.create_timestamp_query(),
            start_frame: 0,
            end_frame: 0,
            pending: false,
        }
    }

    fn destroy(&self, device: &mut dyn GraphicsDevice) {
        device.delete_query(self.start);
        device.delete_query(self.end);
    }

    /// GPU milliseconds and start timestamp of a pair issued within `frame_id`
    fn resolve(&mut self, device: &mut dyn GraphicsDevice, frame_id: u64) -> Option<(f64, u64)> {
        if !self.pending || self.start_frame != frame_id || self.end_frame != frame_id {
            return None;
        }
        let start = device.timestamp_result(self.start)?;
        let end = device.timestamp_result(self.end)?;
        self.pending = false;
        Some((end.saturating_sub(start) as f64 / 1e6, start))
    }
}

#[derive(Debug)]
struct Zone {
    cpu: RollingAverage,
    gpu: RollingAverage,
    stopwatch: Stopwatch,
    depth: u32,
    /// Indexed by frame parity
    queries: [QueryPair; 2],
    touched_frame: u64,
    last_gpu_start: Option<u64>,
    creation_order: u64,
}

impl Zone {
    fn create(device: &mut dyn GraphicsDevice, window: usize, creation_order: u64) -> Self {
        Self {
            cpu: RollingAverage::new(window),
            gpu: RollingAverage::new(window),
            stopwatch: Stopwatch::new(),
            depth: 0,
            queries: [QueryPair::create(device), QueryPair::create(device)],
            touched_frame: 0,
            last_gpu_start: None,
            creation_order,
        }
    }

    fn destroy(&self, device: &mut dyn GraphicsDevice) {
        for pair in &self.queries {
            pair.destroy(device);
        }
    }
}

#[derive(Debug, Default)]
struct Report {
    zone_list: String,
    cpu_timing_list: String,
    gpu_timing_list: String,
    total_cpu: String,
    total_gpu: String,
}

/// CPU and GPU frame/zone timer
#[derive(Debug)]
pub struct FrameProfiler {
    config: ProfilerConfig,
    frame_id: u64,
    frame_queries: Option<[QueryPair; 2]>,
    frame_stopwatch: Stopwatch,
    cpu_frame: RollingAverage,
    gpu_frame: RollingAverage,
    zones: HashMap<String, Zone>,
    next_creation_order: u64,
    report: Report,
}

fn parity(frame_id: u64) -> usize {
    (frame_id % 2) as usize
}

impl FrameProfiler {
    /// Profiler with the given window, warm-up and precision
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            frame_id: 0,
            frame_queries: None,
            frame_stopwatch: Stopwatch::new(),
            cpu_frame: RollingAverage::new(config.average_frame_count),
            gpu_frame: RollingAverage::new(config.average_frame_count),
            zones: HashMap::new(),
            next_creation_order: 0,
            report: Report::default(),
        }
    }

    /// Frames begun since creation or the last reset
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    fn warming_up(&self) -> bool {
        self.frame_id <= self.config.skip_frames
    }

    /// Start a frame
    pub fn begin_frame(&mut self, device: &mut dyn GraphicsDevice) {
        let queries = *self
            .frame_queries
            .get_or_insert_with(|| [QueryPair::create(device), QueryPair::create(device)]);
        self.frame_id += 1;

        if self.warming_up() {
            self.report = Report::default();
            self.frame_stopwatch.reset();
            return;
        }

        self.frame_stopwatch.restart();
        let slot = parity(self.frame_id);
        device.issue_timestamp(queries[slot].start);
        if let Some(pairs) = self.frame_queries.as_mut() {
            pairs[slot].start_frame = self.frame_id;
        }
    }

    /// Finish a frame: sample timings, rebuild the report, evict idle zones
    pub fn end_frame(&mut self, device: &mut dyn GraphicsDevice) {
        if self.warming_up() {
            return;
        }
        let frame_id = self.frame_id;

        if self.frame_stopwatch.is_running() {
            self.frame_stopwatch.stop();
            self.cpu_frame.push(self.frame_stopwatch.elapsed_millis_f64());
        }

        if let Some(pairs) = self.frame_queries.as_mut() {
            let slot = parity(frame_id);
            device.issue_timestamp(pairs[slot].end);
            pairs[slot].end_frame = frame_id;
            pairs[slot].pending = true;

            if let Some((gpu_ms, _)) = pairs[1 - slot].resolve(device, frame_id - 1) {
                self.gpu_frame.push(gpu_ms);
            }
        }

        for zone in self.zones.values_mut() {
            let previous = 1 - parity(frame_id);
            if let Some((gpu_ms, start)) = zone.queries[previous].resolve(device, frame_id - 1) {
                zone.gpu.push(gpu_ms);
                zone.last_gpu_start = Some(start);
            }
        }

        self.build_report(device);
        self.evict_idle_zones(device);
    }

    /// Enter a zone; nested entries of the same name only count depth
    pub fn begin_zone(&mut self, device: &mut dyn GraphicsDevice, name: &str) {
        if self.frame_queries.is_none() || self.warming_up() {
            return;
        }
        let frame_id = self.frame_id;
        if !self.zones.contains_key(name) {
            let zone = Zone::create(device, self.config.average_frame_count, self.next_creation_order);
            self.next_creation_order += 1;
            self.zones.insert(name.to_string(), zone);
        }
        let Some(zone) = self.zones.get_mut(name) else {
            return;
        };

        zone.touched_frame = frame_id;
        if zone.depth == 0 {
            zone.stopwatch.restart();
            let pair = &mut zone.queries[parity(frame_id)];
            device.issue_timestamp(pair.start);
            pair.start_frame = frame_id;
        }
        zone.depth += 1;
    }

    /// Leave a zone; the outermost exit records the timings
    pub fn end_zone(&mut self, device: &mut dyn GraphicsDevice, name: &str) {
        if self.frame_queries.is_none() || self.warming_up() {
            return;
        }
        let frame_id = self.frame_id;
        let Some(zone) = self.zones.get_mut(name) else {
            return;
        };
        if zone.depth == 0 {
            return;
        }

        zone.depth -= 1;
        if zone.depth == 0 {
            if zone.stopwatch.is_running() {
                zone.stopwatch.stop();
                zone.cpu.push(zone.stopwatch.elapsed_millis_f64());
            }
            let pair = &mut zone.queries[parity(frame_id)];
            device.issue_timestamp(pair.end);
            pair.end_frame = frame_id;
            pair.pending = true;
            zone.touched_frame = frame_id;
        }
    }

    /// Run `f` inside a zone
    pub fn zone<T>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        f: impl FnOnce(&mut Self, &mut dyn GraphicsDevice) -> T,
    ) -> T {
        self.begin_zone(device, name);
        let result = f(self, device);
        self.end_zone(device, name);
        result
    }

    /// Run `f` as one frame
    pub fn frame<T>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        f: impl FnOnce(&mut Self, &mut dyn GraphicsDevice) -> T,
    ) -> T {
        self.begin_frame(device);
        let result = f(self, device);
        self.end_frame(device);
        result
    }

    /// Destroy every query and zone and start counting frames from zero
    pub fn reset(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(pairs) = self.frame_queries.take() {
            for pair in &pairs {
                pair.destroy(device);
            }
        }
        for zone in self.zones.values() {
            zone.destroy(device);
        }
        self.zones.clear();
        self.cpu_frame.clear();
        self.gpu_frame.clear();
        self.frame_stopwatch.reset();
        self.frame_id = 0;
        self.report = Report::default();
    }

    fn build_report(&mut self, device: &mut dyn GraphicsDevice) {
        let frame_id = self.frame_id;
        let precision = self.config.output_precision;

        let mut ordered: Vec<(u64, u64, &String, &Zone)> = self
            .zones
            .iter()
            .filter(|(_, zone)| zone.touched_frame == frame_id)
            .map(|(name, zone)| {
                let current = device.timestamp_result(zone.queries[parity(frame_id)].start);
                let start = current.or(zone.last_gpu_start).unwrap_or(u64::MAX);
                (start, zone.creation_order, name, zone)
            })
            .collect();
        ordered.sort_by_key(|(start, order, _, _)| (*start, *order));

        let mut report = Report::default();
        for (_, _, name, zone) in ordered {
            report.zone_list.push_str(name);
            report.zone_list.push('\n');
            report.cpu_timing_list.push_str(&format_ms(zone.cpu.value(), precision));
            report.cpu_timing_list.push('\n');
            report.gpu_timing_list.push_str(&format_ms(zone.gpu.value(), precision));
            report.gpu_timing_list.push('\n');
        }
        report.total_cpu = format!("Total: {}", format_ms(self.cpu_frame.value(), precision));
        report.total_gpu = format!("Total: {}", format_ms(self.gpu_frame.value(), precision));
        self.report = report;
    }

    fn evict_idle_zones(&mut self, device: &mut dyn GraphicsDevice) {
        let frame_id = self.frame_id;
        self.zones.retain(|name, zone| {
            let keep = zone.touched_frame == frame_id;
            if !keep {
                log::trace!("[PROFILER] Evicting idle zone '{}'", name);
                zone.destroy(device);
            }
            keep
        });
    }

    /// Zone names of the last frame, ordered by GPU start, one per line
    pub fn zone_list(&self) -> &str {
        &self.report.zone_list
    }

    /// Average CPU time per zone, matching [`zone_list`](Self::zone_list)
    pub fn cpu_timing_list(&self) -> &str {
        &self.report.cpu_timing_list
    }

    /// Average GPU time per zone, matching [`zone_list`](Self::zone_list)
    pub fn gpu_timing_list(&self) -> &str {
        &self.report.gpu_timing_list
    }

    /// Average CPU frame time
    pub fn total_cpu_frame_time(&self) -> &str {
        &self.report.total_cpu
    }

    /// Average GPU frame time
    pub fn total_gpu_frame_time(&self) -> &str {
        &self.report.total_gpu
    }

    /// Number of live zones
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Averages of a live zone
    pub fn zone_stats(&self, name: &str) -> Option<ZoneStats> {
        self.zones.get(name).map(|zone| ZoneStats {
            cpu_ms: zone.cpu.value(),
            gpu_ms: zone.gpu.value(),
            cpu_samples: zone.cpu.len(),
            gpu_samples: zone.gpu.len(),
        })
    }
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::RecordingDevice;
    use approx::assert_relative_eq;

    fn warmed_up(device: &mut RecordingDevice) -> FrameProfiler {
        let mut profiler = FrameProfiler::default();
        profiler.frame(device, |_, _| {});
        profiler
    }

    #[test]
    fn test_warmup_frames_are_ignored() {
        let mut device = RecordingDevice::new();
        let mut profiler = FrameProfiler::default();
        profiler.frame(&mut device, |p, d| p.zone(d, "Early", |_, _| {}));

        assert_eq!(profiler.zone_count(), 0);
        assert_eq!(profiler.zone_list(), "");
    }

    #[test]
    fn test_nested_zone_times_outermost_pair() {
        let mut device = RecordingDevice::new();
        device.set_gpu_tick(1_000_000);
        let mut profiler = warmed_up(&mut device);

        profiler.begin_frame(&mut device);
        profiler.begin_zone(&mut device, "Nested");
        profiler.begin_zone(&mut device, "Nested");
        profiler.end_zone(&mut device, "Nested");
        profiler.end_zone(&mut device, "Nested");
        profiler.end_frame(&mut device);
        profiler.frame(&mut device, |p, d| p.zone(d, "Nested", |_, _| {}));

        // Only the outer pair issues timestamps, one tick apart
        let stats = profiler.zone_stats("Nested").unwrap();
        assert_eq!(stats.cpu_samples, 2);
        assert_eq!(stats.gpu_samples, 1);
        assert_relative_eq!(stats.gpu_ms, 1.0);
    }

    #[test]
    fn test_untouched_zone_is_evicted_with_its_queries() {
        let mut device = RecordingDevice::new();
        let mut profiler = warmed_up(&mut device);

        profiler.frame(&mut device, |p, d| {
            p.zone(d, "Always", |_, _| {});
            p.zone(d, "Sometimes", |_, _| {});
        });
        assert_eq!(profiler.zone_count(), 2);
        let queries_with_both = device.live_queries();

        profiler.frame(&mut device, |p, d| p.zone(d, "Always", |_, _| {}));

        assert_eq!(profiler.zone_count(), 1);
        assert!(profiler.zone_stats("Sometimes").is_none());
        assert!(!profiler.zone_list().contains("Sometimes"));
        assert_eq!(device.live_queries(), queries_with_both - 4);
    }

    #[test]
    fn test_gpu_samples_are_read_one_frame_late() {
        let mut device = RecordingDevice::new();
        let mut profiler = warmed_up(&mut device);

        profiler.frame(&mut device, |p, d| p.zone(d, "Pass", |_, _| {}));
        assert_eq!(profiler.zone_stats("Pass").unwrap().gpu_samples, 0);

        profiler.frame(&mut device, |p, d| p.zone(d, "Pass", |_, _| {}));
        let stats = profiler.zone_stats("Pass").unwrap();
        assert_eq!(stats.gpu_samples, 1);
        assert!(stats.gpu_ms > 0.0);
    }

    #[test]
    fn test_zone_left_open_across_frames_records_no_gpu_sample() {
        let mut device = RecordingDevice::new();
        let mut profiler = warmed_up(&mut device);

        profiler.begin_frame(&mut device);
        profiler.begin_zone(&mut device, "Straddle");
        profiler.end_frame(&mut device);

        profiler.begin_frame(&mut device);
        profiler.end_zone(&mut device, "Straddle");
        profiler.end_frame(&mut device);

        profiler.frame(&mut device, |p, d| p.zone(d, "Straddle", |_, _| {}));
        assert_eq!(profiler.zone_stats("Straddle").unwrap().gpu_samples, 0);
    }

    #[test]
    fn test_report_orders_by_gpu_start_and_formats() {
        let mut device = RecordingDevice::new();
        let mut profiler = warmed_up(&mut device);

        profiler.frame(&mut device, |p, d| {
            p.zone(d, "First", |_, _| {});
            p.zone(d, "Second", |p, d| p.zone(d, "Inner", |_, _| {}));
        });

        assert_eq!(profiler.zone_list(), "First\nSecond\nInner\n");
        assert_eq!(profiler.cpu_timing_list().lines().count(), 3);
        assert!(profiler.gpu_timing_list().lines().all(|line| line.ends_with(" ms")));
        assert!(profiler.total_cpu_frame_time().starts_with("Total: "));
        assert!(profiler.total_gpu_frame_time().ends_with(" ms"));
    }

    #[test]
    fn test_reset_releases_everything() {
        let mut device = RecordingDevice::new();
        let mut profiler = warmed_up(&mut device);
        profiler.frame(&mut device, |p, d| p.zone(d, "Pass", |_, _| {}));

        profiler.reset(&mut device);
        assert_eq!(device.live_queries(), 0);
        assert_eq!(profiler.frame_id(), 0);
        assert_eq!(profiler.zone_count(), 0);
    }
}
