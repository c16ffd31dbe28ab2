//! Compiled shader programs
//!
//! [`ProgramBuilder`] turns a list of stage files into a linked program
//! handle or an error, releasing every intermediate object either way.
//! [`ShaderProgram`] owns the live handle and only replaces it when a build
//! succeeds.

use std::collections::HashMap;

use crate::foundation::math::{IVec2, Mat4, Vec2, Vec3, Vec4};
use crate::render::backend::{GraphicsDevice, ProgramHandle, StageHandle, UniformLocation, UniformValue};

use super::diagnostics::{self, StageDiagnostics};
use super::preprocessor::{PreprocessedSource, ShaderPreprocessor, SourceReader};
use super::{ShaderError, ShaderResult, ShaderStage};

/// Builds program handles from stage files
pub struct ProgramBuilder<'a, R: SourceReader> {
    preprocessor: &'a ShaderPreprocessor<R>,
}

impl<'a, R: SourceReader> ProgramBuilder<'a, R> {
    /// Builder resolving stage files through `preprocessor`
    pub fn new(preprocessor: &'a ShaderPreprocessor<R>) -> Self {
        Self { preprocessor }
    }

    /// Preprocess, compile and link `paths` into a new program
    ///
    /// Every stage is compiled even after one fails so that all errors are
    /// reported together. Nothing the build creates outlives it unless the
    /// link succeeds.
    pub fn build(&self, device: &mut dyn GraphicsDevice, paths: &[String]) -> ShaderResult<ProgramHandle> {
        let sources = match self.load_sources(paths) {
            Ok(sources) => sources,
            Err(err) => {
                log::error!("[SHADER]{}", diagnostics::source_error_block(&err));
                return Err(err);
            }
        };

        let mut stages: Vec<StageHandle> = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();
        for (path, stage, source) in &sources {
            let output = device.compile_stage(*stage, &source.source);
            stages.push(output.handle);
            if !output.success {
                failures.push(StageDiagnostics::from_log(path.as_str(), &output.info_log, &source.line_map));
            }
        }

        if !failures.is_empty() {
            release_stages(device, &stages);
            log::error!("[SHADER]{}", diagnostics::compile_error_block(&failures));
            return Err(ShaderError::Compile { stages: failures });
        }

        let linked = device.link_program(&stages);
        release_stages(device, &stages);

        if !linked.success {
            device.delete_program(linked.handle);
            let program = paths.join("/");
            let log = diagnostics::format_link_log(&linked.info_log);
            log::error!("[SHADER]{}", diagnostics::link_error_block(&program, &log));
            return Err(ShaderError::Link { program, log });
        }

        Ok(linked.handle)
    }

    fn load_sources<'p>(&self, paths: &'p [String]) -> ShaderResult<Vec<(&'p String, ShaderStage, PreprocessedSource)>> {
        paths
            .iter()
            .map(|path| {
                let stage = ShaderStage::from_path(path).ok_or_else(|| ShaderError::UnknownStage { path: path.clone() })?;
                Ok((path, stage, self.preprocessor.preprocess(path)?))
            })
            .collect()
    }
}

fn release_stages(device: &mut dyn GraphicsDevice, stages: &[StageHandle]) {
    for stage in stages {
        device.delete_stage(*stage);
    }
}

/// A named, hot-reloadable shader program
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    name: String,
    paths: Vec<String>,
    handle: Option<ProgramHandle>,
    uniform_locations: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    /// Unbuilt program for the given stage files
    pub fn new(name: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            name: name.into(),
            paths,
            handle: None,
            uniform_locations: HashMap::new(),
        }
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage files the program is built from
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Live program handle, `None` until a build succeeds
    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    /// Number of cached uniform lookups, including misses
    pub fn cached_uniform_count(&self) -> usize {
        self.uniform_locations.len()
    }

    /// Cached lookup for `name`: `None` if never queried, `Some(None)` if absent
    pub fn cached_location(&self, name: &str) -> Option<Option<UniformLocation>> {
        self.uniform_locations.get(name).copied()
    }

    /// Build from the stored paths, replacing the live handle on success
    ///
    /// On failure the previous handle and uniform cache are left untouched.
    pub fn build<R: SourceReader>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        preprocessor: &ShaderPreprocessor<R>,
    ) -> ShaderResult<()> {
        let handle = ProgramBuilder::new(preprocessor).build(device, &self.paths)?;
        if let Some(old) = self.handle.replace(handle) {
            device.delete_program(old);
        }
        self.uniform_locations.clear();
        log::debug!("[SHADER] Linked '{}' from {}", self.name, self.paths.join(", "));
        Ok(())
    }

    /// Recompile from source
    pub fn hotload<R: SourceReader>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        preprocessor: &ShaderPreprocessor<R>,
    ) -> ShaderResult<()> {
        self.build(device, preprocessor)
    }

    /// Make this program current
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        if let Some(handle) = self.handle {
            device.use_program(handle);
        }
    }

    /// Upload a uniform by name, resolving its location once
    pub fn set_uniform(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: impl Into<UniformValue>) {
        let Some(handle) = self.handle else {
            return;
        };
        let location = match self.uniform_locations.get(name) {
            Some(cached) => *cached,
            None => {
                let location = device.uniform_location(handle, name);
                self.uniform_locations.insert(name.to_string(), location);
                location
            }
        };
        if let Some(location) = location {
            device.set_uniform(location, value.into());
        }
    }

    /// Set a `bool` uniform
    pub fn set_bool(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: bool) {
        self.set_uniform(device, name, value);
    }

    /// Set an `int` uniform
    pub fn set_int(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: i32) {
        self.set_uniform(device, name, value);
    }

    /// Set a `float` uniform
    pub fn set_float(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: f32) {
        self.set_uniform(device, name, value);
    }

    /// Set a `vec2` uniform
    pub fn set_vec2(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: Vec2) {
        self.set_uniform(device, name, value);
    }

    /// Set a `vec3` uniform
    pub fn set_vec3(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: Vec3) {
        self.set_uniform(device, name, value);
    }

    /// Set a `vec4` uniform
    pub fn set_vec4(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: Vec4) {
        self.set_uniform(device, name, value);
    }

    /// Set an `ivec2` uniform
    pub fn set_ivec2(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: IVec2) {
        self.set_uniform(device, name, value);
    }

    /// Set a `mat4` uniform
    pub fn set_mat4(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: Mat4) {
        self.set_uniform(device, name, value);
    }
}
