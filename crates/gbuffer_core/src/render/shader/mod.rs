//! # Shader Programs
//!
//! GLSL sources are flattened by the [`ShaderPreprocessor`], compiled and
//! linked by [`ShaderProgram`], and looked up by name through the
//! [`ShaderLibrary`].
//!
//! ## Hot Reload
//!
//! Rebuilding a program is transactional. A build that fails to compile or
//! link is logged and discarded; the previously linked program stays bound
//! and keeps its uniform cache, so editing a shader while the renderer runs
//! never leaves a pass without a program.

pub mod diagnostics;
pub mod library;
pub mod preprocessor;
pub mod program;

pub use diagnostics::StageDiagnostics;
pub use library::ShaderLibrary;
pub use preprocessor::{
    FsSourceReader, MemorySourceReader, PreprocessedSource, ShaderPreprocessor, SourceLocation, SourceReader,
};
pub use program::{ProgramBuilder, ShaderProgram};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Program names the render passes look up
pub mod names {
    /// Main G-Buffer writer for static and skinned geometry
    pub const GBUFFER: &str = "GBuffer";
    /// House geometry with per-item textures
    pub const DEBUG_TEXTURED: &str = "DebugTextured";
    /// Unlit decorative wires
    pub const CHRISTMAS_LIGHTS_WIRE: &str = "ChristmasLightsWire";
    /// Ragdoll physics visualization
    pub const DEBUG_RAGDOLL: &str = "DebugRagdoll";
    /// Solid stencil writer for mirror silhouettes
    pub const MIRROR_MASK: &str = "MirrorMask";
    /// G-Buffer writer for reflected static geometry
    pub const GBUFFER_MIRROR: &str = "GBufferMirror";
    /// House geometry seen in a mirror
    pub const HOUSE_MIRROR: &str = "HouseMirror";
}

/// Programmable pipeline stage, named by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// `.vert`
    Vertex,
    /// `.frag`
    Fragment,
    /// `.geom`
    Geometry,
    /// `.tesc`
    TessControl,
    /// `.tese`
    TessEvaluation,
    /// `.comp`
    Compute,
}

impl ShaderStage {
    /// Stage for a shader file's extension, `None` if unrecognized
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        match path.as_ref().extension()?.to_str()? {
            "vert" => Some(Self::Vertex),
            "frag" => Some(Self::Fragment),
            "geom" => Some(Self::Geometry),
            "tesc" => Some(Self::TessControl),
            "tese" => Some(Self::TessEvaluation),
            "comp" => Some(Self::Compute),
            _ => None,
        }
    }
}

/// Shader build errors
///
/// Every variant is recovered by keeping the previously linked program.
#[derive(Error, Debug)]
pub enum ShaderError {
    /// A root or included source file could not be read
    #[error("Failed to open shader file: {}", path.display())]
    FileNotFound {
        /// Path as resolved against the shader root
        path: PathBuf,
        /// Reader failure
        #[source]
        cause: std::io::Error,
    },

    /// A stage file has no recognized extension
    #[error("Unknown shader stage for '{path}'")]
    UnknownStage {
        /// Stage file as given
        path: String,
    },

    /// One or more stages failed to compile
    #[error("{} shader stage(s) failed to compile", stages.len())]
    Compile {
        /// Remapped errors for each failing stage
        stages: Vec<StageDiagnostics>,
    },

    /// Every stage compiled but the program failed to link
    #[error("Linking failed for {program}")]
    Link {
        /// Stage files joined with '/'
        program: String,
        /// Indented, truncated linker log
        log: String,
    },
}

/// Result type for shader operations
pub type ShaderResult<T> = Result<T, ShaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_extension() {
        assert_eq!(ShaderStage::from_path("GBuffer.vert"), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_path("dir/Lighting.comp"), Some(ShaderStage::Compute));
        assert_eq!(ShaderStage::from_path("terrain.tese"), Some(ShaderStage::TessEvaluation));
        assert_eq!(ShaderStage::from_path("common.glsl"), None);
        assert_eq!(ShaderStage::from_path("noext"), None);
    }
}
