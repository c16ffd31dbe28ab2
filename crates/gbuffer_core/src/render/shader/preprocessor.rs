//! GLSL include expansion
//!
//! Flattens a root shader file and everything it `#include`s into one source
//! string, recording for every output line the file and line it came from so
//! compiler errors can be reported against the files the author edits.
//!
//! Expansion is depth first. Each file is included at most once per
//! compilation unit, which also breaks include cycles. Included files may not
//! redeclare `#version`; such lines are dropped with a warning. When a frame
//! capture tool is attached, `#define ENABLE_BINDLESS 0` is emitted once,
//! right after the root's first `#version` line.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{ShaderError, ShaderResult};

/// Directive inserted after the root `#version` when capturing
pub const BINDLESS_OFF_DEFINE: &str = "#define ENABLE_BINDLESS 0";

const UTF8_BOM: &str = "\u{feff}";

/// File access used by the preprocessor
pub trait SourceReader {
    /// Read a whole file as text
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Canonical form of `path`, used to detect repeated includes
    ///
    /// Must not fail: paths that cannot be resolved are normalized lexically.
    fn canonicalize(&self, path: &Path) -> PathBuf;
}

/// Reads shader sources from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceReader;

impl SourceReader for FsSourceReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| normalize_lexically(path))
    }
}

/// Serves shader sources from memory
#[derive(Debug, Clone, Default)]
pub struct MemorySourceReader {
    files: HashMap<PathBuf, String>,
}

impl MemorySourceReader {
    /// Empty file set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.files.insert(normalize_lexically(path.as_ref()), contents.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }
}

impl SourceReader for MemorySourceReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(&normalize_lexically(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        normalize_lexically(path)
    }
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Origin of one flattened output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// File name without directories
    pub file: String,
    /// 1-based line in that file
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.file, self.line)
    }
}

/// A flattened compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessedSource {
    /// Source handed to the compiler, one `\n` after every line
    pub source: String,
    /// Origin of each output line, indexed by 0-based output line
    pub line_map: Vec<SourceLocation>,
    /// Non-fatal problems found while expanding
    pub warnings: Vec<String>,
}

impl PreprocessedSource {
    fn push_line(&mut self, line: &str, location: SourceLocation) {
        self.source.push_str(line);
        self.source.push('\n');
        self.line_map.push(location);
    }

    /// Origin of a 0-based output line
    pub fn location(&self, output_line: usize) -> Option<&SourceLocation> {
        self.line_map.get(output_line)
    }
}

struct ExpansionState {
    visited: HashSet<PathBuf>,
    bindless_define_emitted: bool,
}

/// Flattens shader sources rooted at a shader directory
#[derive(Debug, Clone)]
pub struct ShaderPreprocessor<R: SourceReader = FsSourceReader> {
    reader: R,
    root_dir: PathBuf,
    capture_tool_attached: bool,
}

impl ShaderPreprocessor<FsSourceReader> {
    /// Preprocessor reading from disk under `root_dir`
    pub fn from_dir(root_dir: impl Into<PathBuf>, capture_tool_attached: bool) -> Self {
        Self::new(FsSourceReader, root_dir, capture_tool_attached)
    }
}

impl<R: SourceReader> ShaderPreprocessor<R> {
    /// Preprocessor over any source reader
    pub fn new(reader: R, root_dir: impl Into<PathBuf>, capture_tool_attached: bool) -> Self {
        Self {
            reader,
            root_dir: root_dir.into(),
            capture_tool_attached,
        }
    }

    /// Directory stage paths are resolved against
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Whether the bindless define is injected
    pub fn capture_tool_attached(&self) -> bool {
        self.capture_tool_attached
    }

    /// Underlying source reader
    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Flatten the file at `relative_path` under the shader root
    pub fn preprocess(&self, relative_path: impl AsRef<Path>) -> ShaderResult<PreprocessedSource> {
        let root = self.reader.canonicalize(&self.root_dir.join(relative_path));
        let mut state = ExpansionState {
            visited: HashSet::from([root.clone()]),
            bindless_define_emitted: false,
        };
        let mut output = PreprocessedSource::default();
        self.expand(&root, true, &mut state, &mut output)?;

        for warning in &output.warnings {
            log::warn!("[SHADER] {}", warning);
        }
        Ok(output)
    }

    fn expand(
        &self,
        path: &Path,
        is_root: bool,
        state: &mut ExpansionState,
        output: &mut PreprocessedSource,
    ) -> ShaderResult<()> {
        let contents = self
            .reader
            .read_to_string(path)
            .map_err(|cause| ShaderError::FileNotFound { path: path.to_path_buf(), cause })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

        for (index, raw_line) in split_lines(&contents).enumerate() {
            let line = if index == 0 { raw_line.strip_prefix(UTF8_BOM).unwrap_or(raw_line) } else { raw_line };
            let location = SourceLocation { file: file_name.clone(), line: index + 1 };
            let trimmed = line.trim_start_matches([' ', '\t', '\r']);

            if let Some(include) = parse_include(trimmed) {
                let include_path = self.reader.canonicalize(&base_dir.join(include));
                if state.visited.insert(include_path.clone()) {
                    self.expand(&include_path, false, state, output)?;
                }
                continue;
            }

            let is_version = trimmed.starts_with("#version");
            if is_version && !is_root {
                output.warnings.push(format!(
                    "#version found in an included file, skipping it: {} (line {})",
                    path.display(),
                    location.line
                ));
                continue;
            }

            output.push_line(line, location.clone());

            if is_version && self.capture_tool_attached && !state.bindless_define_emitted {
                output.push_line(BINDLESS_OFF_DEFINE, location);
                state.bindless_define_emitted = true;
            }
        }
        Ok(())
    }
}

/// Physical lines split on `\n`, without a phantom line after a final newline
fn split_lines(contents: &str) -> impl Iterator<Item = &str> {
    let body = contents.strip_suffix('\n').unwrap_or(contents);
    let empty = contents.is_empty();
    body.split('\n').filter(move |_| !empty)
}

/// Path between the first two double quotes of an `#include` line
fn parse_include(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("#include")?;
    let start = rest.find('"')? + 1;
    let len = rest[start..].find('"')?;
    let path = &rest[start..start + len];
    (!path.is_empty()).then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "shaders";

    fn preprocessor(files: &[(&str, &str)], capture: bool) -> ShaderPreprocessor<MemorySourceReader> {
        let mut reader = MemorySourceReader::new();
        for (path, contents) in files {
            reader.insert(Path::new(ROOT).join(path), *contents);
        }
        ShaderPreprocessor::new(reader, ROOT, capture)
    }

    fn provenance(source: &PreprocessedSource) -> Vec<String> {
        source.line_map.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_include_scenario() {
        let pre = preprocessor(
            &[
                ("main.frag", "#version 450\n#include \"lib.glsl\"\nvoid main(){}\n"),
                ("lib.glsl", "// lib\n"),
            ],
            false,
        );
        let out = pre.preprocess("main.frag").unwrap();

        assert_eq!(out.source, "#version 450\n// lib\nvoid main(){}\n");
        assert_eq!(provenance(&out), vec!["main.frag (line 1)", "lib.glsl (line 1)", "main.frag (line 3)"]);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_source_without_includes_is_verbatim() {
        let text = "#version 460 core\n  layout(location = 0) out vec4 color;\r\n\nvoid main() { color = vec4(1); }\n";
        let pre = preprocessor(&[("plain.frag", text)], false);
        let out = pre.preprocess("plain.frag").unwrap();
        assert_eq!(out.source, text);
        assert_eq!(out.line_map.len(), 4);
    }

    #[test]
    fn test_bom_is_stripped_per_file() {
        let pre = preprocessor(
            &[
                ("a.vert", "\u{feff}#version 450\n#include \"b.glsl\"\n"),
                ("b.glsl", "\u{feff}float b;\n"),
            ],
            false,
        );
        let out = pre.preprocess("a.vert").unwrap();
        assert_eq!(out.source, "#version 450\nfloat b;\n");
    }

    #[test]
    fn test_diamond_include_expands_shared_file_once() {
        let pre = preprocessor(
            &[
                ("a.frag", "#version 450\n#include \"b.glsl\"\n#include \"c.glsl\"\n"),
                ("b.glsl", "// b\n#include \"common/d.glsl\"\n"),
                ("c.glsl", "// c\n#include \"./common/../common/d.glsl\"\n"),
                ("common/d.glsl", "// d1\n// d2\n"),
            ],
            false,
        );
        let out = pre.preprocess("a.frag").unwrap();

        assert_eq!(out.source, "#version 450\n// b\n// d1\n// d2\n// c\n");
        assert_eq!(out.source.matches("// d1").count(), 1);
        assert_eq!(
            provenance(&out),
            vec!["a.frag (line 1)", "b.glsl (line 1)", "d.glsl (line 1)", "d.glsl (line 2)", "c.glsl (line 1)"]
        );
    }

    #[test]
    fn test_include_cycle_terminates() {
        let pre = preprocessor(
            &[
                ("loop.frag", "#version 450\n#include \"x.glsl\"\n"),
                ("x.glsl", "// x\n#include \"loop.frag\"\n#include \"x.glsl\"\n"),
            ],
            false,
        );
        let out = pre.preprocess("loop.frag").unwrap();
        assert_eq!(out.source, "#version 450\n// x\n");
    }

    #[test]
    fn test_version_in_include_is_dropped_with_warning() {
        let pre = preprocessor(
            &[
                ("main.vert", "#version 450\n#include \"lib.glsl\"\n"),
                ("lib.glsl", "  #version 330\nvec3 f();\n"),
            ],
            false,
        );
        let out = pre.preprocess("main.vert").unwrap();

        assert_eq!(out.source, "#version 450\nvec3 f();\n");
        assert_eq!(out.source.matches("#version").count(), 1);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("(line 1)"));
    }

    #[test]
    fn test_bindless_define_follows_first_root_version_only() {
        let pre = preprocessor(&[("main.comp", "#version 450\n#version 460\nvoid main(){}\n")], true);
        let out = pre.preprocess("main.comp").unwrap();

        assert_eq!(out.source, "#version 450\n#define ENABLE_BINDLESS 0\n#version 460\nvoid main(){}\n");
        assert_eq!(out.location(1).unwrap().to_string(), "main.comp (line 1)");
    }

    #[test]
    fn test_missing_include_aborts() {
        let pre = preprocessor(&[("main.frag", "#version 450\n#include \"gone.glsl\"\n")], false);
        let err = pre.preprocess("main.frag").unwrap_err();
        match err {
            ShaderError::FileNotFound { path, .. } => assert!(path.ends_with("gone.glsl")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_include_is_copied() {
        let pre = preprocessor(&[("main.frag", "#include <lib.glsl>\n#include \"\"\n")], false);
        let out = pre.preprocess("main.frag").unwrap();
        assert_eq!(out.source, "#include <lib.glsl>\n#include \"\"\n");
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("a/./b/../c.glsl")), PathBuf::from("a/c.glsl"));
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
    }
}
