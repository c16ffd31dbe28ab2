//! Named shader program registry

use std::collections::HashMap;

use crate::core::ShaderProgramDesc;
use crate::render::backend::GraphicsDevice;

use super::preprocessor::{FsSourceReader, ShaderPreprocessor, SourceReader};
use super::program::ShaderProgram;
use super::ShaderResult;

/// Every shader program of the renderer, by name
///
/// Programs that failed their first build are still registered so a later
/// hot reload can bring them up once the source is fixed.
#[derive(Debug)]
pub struct ShaderLibrary<R: SourceReader = FsSourceReader> {
    preprocessor: ShaderPreprocessor<R>,
    programs: HashMap<String, ShaderProgram>,
}

impl<R: SourceReader> ShaderLibrary<R> {
    /// Empty library resolving sources through `preprocessor`
    pub fn new(preprocessor: ShaderPreprocessor<R>) -> Self {
        Self {
            preprocessor,
            programs: HashMap::new(),
        }
    }

    /// Preprocessor used for every build
    pub fn preprocessor(&self) -> &ShaderPreprocessor<R> {
        &self.preprocessor
    }

    /// Mutable preprocessor, e.g. to edit in-memory sources before a hot reload
    pub fn preprocessor_mut(&mut self) -> &mut ShaderPreprocessor<R> {
        &mut self.preprocessor
    }

    /// Register and build a program, replacing any program of the same name
    ///
    /// A failed build never replaces an existing program; it is only
    /// registered when the name is new.
    pub fn load(&mut self, device: &mut dyn GraphicsDevice, name: &str, paths: &[&str]) -> ShaderResult<()> {
        let paths = paths.iter().map(|path| (*path).to_string()).collect();
        let mut program = ShaderProgram::new(name, paths);
        let result = program.build(device, &self.preprocessor);
        if result.is_err() && self.programs.contains_key(name) {
            log::warn!("[SHADER] Keeping previous '{}' after failed load", name);
            return result;
        }
        if let Some(previous) = self.programs.insert(name.to_string(), program) {
            if let Some(handle) = previous.handle() {
                device.delete_program(handle);
            }
        }
        result
    }

    /// Load every described program, returning how many failed to build
    pub fn load_all(&mut self, device: &mut dyn GraphicsDevice, descs: &[ShaderProgramDesc]) -> usize {
        descs
            .iter()
            .filter(|desc| {
                let stages: Vec<&str> = desc.stages.iter().map(String::as_str).collect();
                self.load(device, &desc.name, &stages).is_err()
            })
            .count()
    }

    /// Look up a program
    pub fn get(&self, name: &str) -> Option<&ShaderProgram> {
        self.programs.get(name)
    }

    /// Look up a program mutably (needed to set uniforms)
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ShaderProgram> {
        self.programs.get_mut(name)
    }

    /// A program that has a live handle
    pub fn get_linked_mut(&mut self, name: &str) -> Option<&mut ShaderProgram> {
        self.programs.get_mut(name).filter(|program| program.handle().is_some())
    }

    /// Registered program names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    /// Rebuild every program from source, returning how many failed
    ///
    /// Failed programs keep their previous handles.
    pub fn hotload_all(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        let preprocessor = &self.preprocessor;
        let failures = self
            .programs
            .values_mut()
            .filter_map(|program| program.hotload(device, preprocessor).err())
            .count();
        log::info!(
            "[SHADER] Hotloaded {} programs ({} failed)",
            self.programs.len(),
            failures
        );
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::RecordingDevice;
    use crate::render::shader::{names, MemorySourceReader};

    fn library() -> ShaderLibrary<MemorySourceReader> {
        let reader = MemorySourceReader::new()
            .with_file("s/GBuffer.vert", "#version 450\nvoid main(){}\n")
            .with_file("s/GBuffer.frag", "#version 450\nvoid main(){}\n");
        ShaderLibrary::new(ShaderPreprocessor::new(reader, "s", false))
    }

    #[test]
    fn test_failed_load_is_still_registered() {
        let mut device = RecordingDevice::new();
        let mut library = library();

        assert!(library.load(&mut device, "Broken", &["Missing.vert"]).is_err());
        assert!(library.get("Broken").is_some());
        assert!(library.get_linked_mut("Broken").is_none());
    }

    #[test]
    fn test_hotload_picks_up_edited_source() {
        let mut device = RecordingDevice::new();
        let mut library = library();
        library.load(&mut device, names::GBUFFER, &["GBuffer.vert", "GBuffer.frag"]).unwrap();
        let before = library.get(names::GBUFFER).unwrap().handle();

        library
            .preprocessor_mut()
            .reader_mut()
            .insert("s/GBuffer.frag", "#version 450\nBROKEN\n");
        device.fail_compile_on("BROKEN", "syntax error");
        assert_eq!(library.hotload_all(&mut device), 1);
        assert_eq!(library.get(names::GBUFFER).unwrap().handle(), before);

        library
            .preprocessor_mut()
            .reader_mut()
            .insert("s/GBuffer.frag", "#version 450\nvoid main(){ }\n");
        assert_eq!(library.hotload_all(&mut device), 0);
        assert_ne!(library.get(names::GBUFFER).unwrap().handle(), before);
    }

    #[test]
    fn test_failed_reload_keeps_working_program() {
        let mut device = RecordingDevice::new();
        let mut library = library();
        library.load(&mut device, "A", &["GBuffer.vert", "GBuffer.frag"]).unwrap();
        let before = library.get("A").unwrap().handle();

        assert!(library.load(&mut device, "A", &["GBuffer.vert", "Missing.frag"]).is_err());

        let program = library.get("A").unwrap();
        assert!(before.is_some());
        assert_eq!(program.handle(), before);
        assert_eq!(program.paths(), ["GBuffer.vert", "GBuffer.frag"]);
        assert_eq!(device.live_programs(), 1);
    }

    #[test]
    fn test_reload_releases_replaced_program() {
        let mut device = RecordingDevice::new();
        let mut library = library();
        library.load(&mut device, "A", &["GBuffer.vert", "GBuffer.frag"]).unwrap();
        library.load(&mut device, "A", &["GBuffer.vert", "GBuffer.frag"]).unwrap();
        assert_eq!(device.live_programs(), 1);
        assert_eq!(library.names().count(), 1);
    }
}
