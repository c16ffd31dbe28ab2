//! Headless device that records every call
//!
//! `RecordingDevice` implements [`GraphicsDevice`] without a GPU. Each call is
//! appended to a command list that tests and tools can inspect. Shader
//! compile and link failures, and missing uniforms, can be scripted so the
//! failure paths of the shader programs are reachable without a driver.

use std::collections::{HashMap, HashSet};

use super::*;

/// One recorded device call
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// `compile_stage`
    CompileStage { stage: ShaderStage, handle: StageHandle, success: bool },
    /// `delete_stage`
    DeleteStage(StageHandle),
    /// `link_program`
    LinkProgram { stages: Vec<StageHandle>, handle: ProgramHandle, success: bool },
    /// `delete_program`
    DeleteProgram(ProgramHandle),
    /// `use_program`
    UseProgram(ProgramHandle),
    /// `uniform_location`
    QueryUniformLocation { program: ProgramHandle, name: String },
    /// `set_uniform`
    SetUniform { location: UniformLocation, value: UniformValue },
    /// `create_framebuffer`
    CreateFramebuffer { name: String, handle: FramebufferHandle },
    /// `bind_framebuffer`
    BindFramebuffer(FramebufferHandle),
    /// `draw_buffers`
    DrawBuffers { framebuffer: FramebufferHandle, slots: Vec<u32> },
    /// `copy_depth_to_backup`
    CopyDepthToBackup(FramebufferHandle),
    /// `attach_depth`
    AttachDepth { framebuffer: FramebufferHandle, attachment: DepthAttachment },
    /// `clear_depth`
    ClearDepth { framebuffer: FramebufferHandle, value: f32 },
    /// `clear_stencil`
    ClearStencil { framebuffer: FramebufferHandle, value: i32 },
    /// `set_viewport`
    SetViewport { index: ViewportIndex, rect: PixelRect },
    /// `apply_rasterizer_state`
    ApplyRasterizerState(RasterizerState),
    /// `set_color_write`
    SetColorWrite(bool),
    /// `set_depth_state`
    SetDepthState { test: bool, write: bool },
    /// `set_stencil_state`
    SetStencilState(Option<StencilState>),
    /// `set_stencil_write_mask`
    SetStencilWriteMask(u32),
    /// `set_front_face`
    SetFrontFace(FrontFace),
    /// `set_clip_plane`
    SetClipPlane { index: u32, enabled: bool },
    /// `bind_vertex_source`
    BindVertexSource(VertexSource),
    /// `bind_texture`
    BindTexture { unit: u32, texture: TextureHandle },
    /// `multi_draw_indirect`
    MultiDrawIndirect(Vec<DrawIndexedIndirectCommand>),
    /// `draw_indexed_instanced`
    DrawIndexedInstanced(DrawIndexedIndirectCommand),
    /// `draw_indexed`
    DrawIndexed { index_count: u32, base_index: u32, base_vertex: i32 },
    /// `create_timestamp_query`
    CreateQuery(QueryHandle),
    /// `delete_query`
    DeleteQuery(QueryHandle),
    /// `issue_timestamp`
    IssueTimestamp(QueryHandle),
}

impl DeviceCommand {
    /// True for every draw submission
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::MultiDrawIndirect(_) | Self::DrawIndexedInstanced(_) | Self::DrawIndexed { .. }
        )
    }
}

#[derive(Debug, Clone)]
enum CompileFailure {
    /// Log in the driver's `ERROR: 0:<line>: <message>` form
    Formatted(String),
    /// Log passed through verbatim
    Raw(String),
}

/// A [`GraphicsDevice`] that records calls instead of executing them
#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<DeviceCommand>,
    next_handle: u32,
    next_location: i32,
    compile_failures: Vec<(String, CompileFailure)>,
    link_failure: Option<String>,
    hidden_uniforms: HashSet<String>,
    locations: HashMap<(ProgramHandle, String), UniformLocation>,
    location_names: HashMap<UniformLocation, String>,
    live_programs: HashSet<ProgramHandle>,
    live_stages: HashSet<StageHandle>,
    live_queries: HashSet<QueryHandle>,
    timestamps: HashMap<QueryHandle, u64>,
    gpu_clock_ns: u64,
    gpu_tick_ns: u64,
}

impl RecordingDevice {
    /// New device with an empty log
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            next_handle: 1,
            next_location: 0,
            compile_failures: Vec::new(),
            link_failure: None,
            hidden_uniforms: HashSet::new(),
            locations: HashMap::new(),
            location_names: HashMap::new(),
            live_programs: HashSet::new(),
            live_stages: HashSet::new(),
            live_queries: HashSet::new(),
            timestamps: HashMap::new(),
            gpu_clock_ns: 0,
            gpu_tick_ns: 1_000,
        }
    }

    /// Fail any stage whose source contains `marker`, reporting `message` at the marker's line
    pub fn fail_compile_on(&mut self, marker: impl Into<String>, message: impl Into<String>) {
        self.compile_failures.push((marker.into(), CompileFailure::Formatted(message.into())));
    }

    /// Fail any stage whose source contains `marker` with a verbatim info log
    pub fn fail_compile_with_raw_log(&mut self, marker: impl Into<String>, log: impl Into<String>) {
        self.compile_failures.push((marker.into(), CompileFailure::Raw(log.into())));
    }

    /// Stop failing compiles
    pub fn clear_compile_failures(&mut self) {
        self.compile_failures.clear();
    }

    /// Fail every link with this info log until cleared with `None`
    pub fn set_link_failure(&mut self, log: Option<String>) {
        self.link_failure = log;
    }

    /// Report `name` as absent from every program
    pub fn hide_uniform(&mut self, name: impl Into<String>) {
        self.hidden_uniforms.insert(name.into());
    }

    /// Nanoseconds the GPU clock advances per timestamp
    pub fn set_gpu_tick(&mut self, nanoseconds: u64) {
        self.gpu_tick_ns = nanoseconds;
    }

    /// Recorded calls in submission order
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget recorded calls, keeping object state
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Count recorded calls matching a predicate
    pub fn count(&self, predicate: impl Fn(&DeviceCommand) -> bool) -> usize {
        self.commands.iter().filter(|cmd| predicate(cmd)).count()
    }

    /// Number of `set_viewport` calls for a slot
    pub fn viewport_calls(&self, index: ViewportIndex) -> usize {
        self.count(|cmd| matches!(cmd, DeviceCommand::SetViewport { index: i, .. } if *i == index))
    }

    /// Number of draw submissions of any kind
    pub fn draw_calls(&self) -> usize {
        self.count(DeviceCommand::is_draw)
    }

    /// Every value uploaded to a uniform with this name, in order
    pub fn uniform_values(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DeviceCommand::SetUniform { location, value }
                    if self.location_names.get(location).map(String::as_str) == Some(name) =>
                {
                    Some(*value)
                }
                _ => None,
            })
            .collect()
    }

    /// Programs created and not yet deleted
    pub fn live_programs(&self) -> usize {
        self.live_programs.len()
    }

    /// Stages created and not yet deleted
    pub fn live_stages(&self) -> usize {
        self.live_stages.len()
    }

    /// Queries created and not yet deleted
    pub fn live_queries(&self) -> usize {
        self.live_queries.len()
    }

    fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn compile_log(&self, source: &str) -> Option<String> {
        self.compile_failures.iter().find_map(|(marker, failure)| {
            let line = source.lines().position(|line| line.contains(marker.as_str()))?;
            Some(match failure {
                CompileFailure::Formatted(message) => format!("ERROR: 0:{}: {}\n", line, message),
                CompileFailure::Raw(log) => log.clone(),
            })
        })
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> StageCompileOutput {
        let handle = StageHandle(self.allocate());
        let info_log = self.compile_log(source).unwrap_or_default();
        let success = info_log.is_empty();
        self.live_stages.insert(handle);
        self.commands.push(DeviceCommand::CompileStage { stage, handle, success });
        StageCompileOutput { handle, success, info_log }
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        self.live_stages.remove(&stage);
        self.commands.push(DeviceCommand::DeleteStage(stage));
    }

    fn link_program(&mut self, stages: &[StageHandle]) -> ProgramLinkOutput {
        let handle = ProgramHandle(self.allocate());
        let (success, info_log) = match &self.link_failure {
            Some(log) => (false, log.clone()),
            None => (true, String::new()),
        };
        self.live_programs.insert(handle);
        self.commands.push(DeviceCommand::LinkProgram { stages: stages.to_vec(), handle, success });
        ProgramLinkOutput { handle, success, info_log }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.live_programs.remove(&program);
        self.commands.push(DeviceCommand::DeleteProgram(program));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.commands.push(DeviceCommand::QueryUniformLocation { program, name: name.to_string() });
        if self.hidden_uniforms.contains(name) {
            return None;
        }
        let key = (program, name.to_string());
        if let Some(location) = self.locations.get(&key) {
            return Some(*location);
        }
        let location = UniformLocation(self.next_location);
        self.next_location += 1;
        self.locations.insert(key, location);
        self.location_names.insert(location, name.to_string());
        Some(location)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.commands.push(DeviceCommand::SetUniform { location, value });
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RenderResult<FramebufferHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(crate::render::RenderError::BackendError(format!(
                "framebuffer '{}' has zero size",
                desc.name
            )));
        }
        let handle = FramebufferHandle(self.allocate());
        self.commands.push(DeviceCommand::CreateFramebuffer { name: desc.name.clone(), handle });
        Ok(handle)
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.commands.push(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn draw_buffers(&mut self, framebuffer: FramebufferHandle, slots: &[u32]) {
        self.commands.push(DeviceCommand::DrawBuffers { framebuffer, slots: slots.to_vec() });
    }

    fn copy_depth_to_backup(&mut self, framebuffer: FramebufferHandle) {
        self.commands.push(DeviceCommand::CopyDepthToBackup(framebuffer));
    }

    fn attach_depth(&mut self, framebuffer: FramebufferHandle, attachment: DepthAttachment) {
        self.commands.push(DeviceCommand::AttachDepth { framebuffer, attachment });
    }

    fn clear_depth(&mut self, framebuffer: FramebufferHandle, value: f32) {
        self.commands.push(DeviceCommand::ClearDepth { framebuffer, value });
    }

    fn clear_stencil(&mut self, framebuffer: FramebufferHandle, value: i32) {
        self.commands.push(DeviceCommand::ClearStencil { framebuffer, value });
    }

    fn set_viewport(&mut self, index: ViewportIndex, rect: PixelRect) {
        self.commands.push(DeviceCommand::SetViewport { index, rect });
    }

    fn apply_rasterizer_state(&mut self, state: &RasterizerState) {
        self.commands.push(DeviceCommand::ApplyRasterizerState(state.clone()));
    }

    fn set_color_write(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetColorWrite(enabled));
    }

    fn set_depth_state(&mut self, test: bool, write: bool) {
        self.commands.push(DeviceCommand::SetDepthState { test, write });
    }

    fn set_stencil_state(&mut self, state: Option<StencilState>) {
        self.commands.push(DeviceCommand::SetStencilState(state));
    }

    fn set_stencil_write_mask(&mut self, mask: u32) {
        self.commands.push(DeviceCommand::SetStencilWriteMask(mask));
    }

    fn set_front_face(&mut self, winding: FrontFace) {
        self.commands.push(DeviceCommand::SetFrontFace(winding));
    }

    fn set_clip_plane(&mut self, index: u32, enabled: bool) {
        self.commands.push(DeviceCommand::SetClipPlane { index, enabled });
    }

    fn bind_vertex_source(&mut self, source: VertexSource) {
        self.commands.push(DeviceCommand::BindVertexSource(source));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands.push(DeviceCommand::BindTexture { unit, texture });
    }

    fn multi_draw_indirect(&mut self, commands: &[DrawIndexedIndirectCommand]) {
        self.commands.push(DeviceCommand::MultiDrawIndirect(commands.to_vec()));
    }

    fn draw_indexed_instanced(&mut self, command: &DrawIndexedIndirectCommand) {
        self.commands.push(DeviceCommand::DrawIndexedInstanced(*command));
    }

    fn draw_indexed(&mut self, index_count: u32, base_index: u32, base_vertex: i32) {
        self.commands.push(DeviceCommand::DrawIndexed { index_count, base_index, base_vertex });
    }

    fn create_timestamp_query(&mut self) -> QueryHandle {
        let query = QueryHandle(self.allocate());
        self.live_queries.insert(query);
        self.commands.push(DeviceCommand::CreateQuery(query));
        query
    }

    fn delete_query(&mut self, query: QueryHandle) {
        self.live_queries.remove(&query);
        self.timestamps.remove(&query);
        self.commands.push(DeviceCommand::DeleteQuery(query));
    }

    fn issue_timestamp(&mut self, query: QueryHandle) {
        self.gpu_clock_ns += self.gpu_tick_ns;
        self.timestamps.insert(query, self.gpu_clock_ns);
        self.commands.push(DeviceCommand::IssueTimestamp(query));
    }

    fn timestamp_result(&mut self, query: QueryHandle) -> Option<u64> {
        self.timestamps.get(&query).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_compile_failure_reports_marker_line() {
        let mut device = RecordingDevice::new();
        device.fail_compile_on("BROKEN", "syntax error");

        let ok = device.compile_stage(ShaderStage::Vertex, "void main() {}\n");
        let bad = device.compile_stage(ShaderStage::Fragment, "#version 450\nBROKEN\n");

        assert!(ok.success);
        assert!(!bad.success);
        assert_eq!(bad.info_log, "ERROR: 0:1: syntax error\n");
        assert_eq!(device.live_stages(), 2);
    }

    #[test]
    fn test_uniform_locations_are_stable_per_program() {
        let mut device = RecordingDevice::new();
        device.hide_uniform("u_missing");
        let program = ProgramHandle(7);

        let a = device.uniform_location(program, "u_model");
        let b = device.uniform_location(program, "u_model");
        assert_eq!(a, b);
        assert!(device.uniform_location(program, "u_missing").is_none());

        device.set_uniform(a.unwrap(), UniformValue::Float(2.0));
        assert_eq!(device.uniform_values("u_model"), vec![UniformValue::Float(2.0)]);
    }

    #[test]
    fn test_timestamps_increase() {
        let mut device = RecordingDevice::new();
        let a = device.create_timestamp_query();
        let b = device.create_timestamp_query();
        assert!(device.timestamp_result(a).is_none());

        device.issue_timestamp(a);
        device.issue_timestamp(b);
        assert!(device.timestamp_result(b).unwrap() > device.timestamp_result(a).unwrap());

        device.delete_query(a);
        assert_eq!(device.live_queries(), 1);
    }
}
