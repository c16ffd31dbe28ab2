//! Compiler and linker log formatting
//!
//! Compile errors are read from the driver log, which reports lines of the
//! flattened source, and remapped through the preprocessor's line map to
//! `"<file> (line <n>): <message>"`. Link logs are indented and cut off where
//! the driver starts dumping internal assembly.

use std::fmt::Write as _;

use super::preprocessor::SourceLocation;

const SEPARATOR: &str = "-------------------------------------------------------------------------";
const ASSEMBLY_DELIMITER: &str = "-- internal assembly text --";

/// Compile errors of one stage file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDiagnostics {
    /// Stage file as given to the build
    pub file: String,
    /// Remapped `"<location>: <message>"` entries
    pub errors: Vec<String>,
    /// Unmodified compiler log
    pub raw_log: String,
}

impl StageDiagnostics {
    /// Parse a compiler log against the stage's line map
    pub fn from_log(file: impl Into<String>, log: &str, line_map: &[SourceLocation]) -> Self {
        Self {
            file: file.into(),
            errors: remap_compile_log(log, line_map),
            raw_log: log.to_string(),
        }
    }

    fn write_body(&self, out: &mut String) {
        if self.errors.is_empty() {
            for line in self.raw_log.lines() {
                let _ = writeln!(out, "  {}", line);
            }
        } else {
            for error in &self.errors {
                let _ = writeln!(out, "  {}", error);
            }
        }
    }
}

/// Remap every `ERROR: <source>:<line>: <message>` line of a compiler log
pub fn remap_compile_log(log: &str, line_map: &[SourceLocation]) -> Vec<String> {
    log.lines()
        .filter(|line| line.starts_with("ERROR: "))
        .map(|line| {
            let message = error_message(line);
            match error_line_number(line).and_then(|n| line_map.get(n)) {
                Some(location) => format!("{}: {}", location, message),
                None => format!("unknown location: {}", message),
            }
        })
        .collect()
}

/// Line number between the second and third colon
fn error_line_number(line: &str) -> Option<usize> {
    let mut parts = line.splitn(4, ':');
    parts.next()?;
    parts.next()?;
    let number = parts.next()?;
    parts.next()?;
    number.trim().parse().ok()
}

/// Text after the third colon and the following space
fn error_message(line: &str) -> &str {
    let mut parts = line.splitn(4, ':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(_), Some(rest)) => rest.strip_prefix(' ').unwrap_or(rest),
        _ => "",
    }
}

/// Indent a linker log and drop everything after the assembly delimiter
pub fn format_link_log(log: &str) -> String {
    if log.trim().is_empty() {
        return "\n    An unknown linking error occurred (no info log available).\n".to_string();
    }
    let mut out = String::from("\n");
    for line in log.lines() {
        let _ = writeln!(out, "    {}", line);
        if line.contains(ASSEMBLY_DELIMITER) {
            out.push_str("    (Following internal assembly text omitted for brevity)\n");
            break;
        }
    }
    out
}

/// Delimited report for every failing stage of a build
pub fn compile_error_block(stages: &[StageDiagnostics]) -> String {
    let mut out = format!("\n{}\n\n", SEPARATOR);
    for stage in stages {
        let _ = writeln!(out, " COMPILATION ERROR: {}\n", stage.file);
        stage.write_body(&mut out);
        out.push('\n');
    }
    out.push_str(SEPARATOR);
    out
}

/// Delimited report for a build that failed before compiling, naming the
/// error and its underlying cause
pub fn source_error_block(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = format!("\n{}\n\n SHADER SOURCE ERROR: {}\n", SEPARATOR, error);
    let mut cause = error.source();
    while let Some(inner) = cause {
        let _ = writeln!(out, "  caused by: {}", inner);
        cause = inner.source();
    }
    out.push_str(SEPARATOR);
    out
}

/// Delimited report for a failed link
pub fn link_error_block(program: &str, formatted_log: &str) -> String {
    format!("\n{}\n\n LINKING ERROR: {}{}\n{}", SEPARATOR, program, formatted_log, SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shader::ShaderError;

    fn line_map() -> Vec<SourceLocation> {
        vec![
            SourceLocation { file: "main.frag".into(), line: 1 },
            SourceLocation { file: "lib.glsl".into(), line: 4 },
        ]
    }

    #[test]
    fn test_compile_errors_are_remapped() {
        let log = "ERROR: 0:1: 'foo' : undeclared identifier\nWARNING: 0:0: unused\nERROR: 0:9: bad\n";
        let errors = remap_compile_log(log, &line_map());
        assert_eq!(
            errors,
            vec![
                "lib.glsl (line 4): 'foo' : undeclared identifier".to_string(),
                "unknown location: bad".to_string(),
            ]
        );
    }

    #[test]
    fn test_unparseable_log_falls_back_to_raw() {
        let diagnostics = StageDiagnostics::from_log("main.frag", "internal compiler failure", &line_map());
        assert!(diagnostics.errors.is_empty());
        let block = compile_error_block(&[diagnostics]);
        assert!(block.contains(" COMPILATION ERROR: main.frag"));
        assert!(block.contains("  internal compiler failure"));
    }

    #[test]
    fn test_link_log_truncated_at_assembly() {
        let log = "error: varying mismatch\n-- internal assembly text --\nMOV R0, R1;\n";
        let formatted = format_link_log(log);
        assert_eq!(
            formatted,
            "\n    error: varying mismatch\n    -- internal assembly text --\n    (Following internal assembly text omitted for brevity)\n"
        );
        assert!(!formatted.contains("MOV"));
    }

    #[test]
    fn test_source_error_block_includes_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = ShaderError::FileNotFound { path: "r/gone.glsl".into(), cause };
        let block = source_error_block(&error);
        assert!(block.contains(" SHADER SOURCE ERROR: Failed to open shader file: r/gone.glsl\n"));
        assert!(block.contains("  caused by: no such file\n"));
        assert!(block.starts_with(&format!("\n{}", SEPARATOR)));
    }

    #[test]
    fn test_empty_link_log() {
        assert!(format_link_log("").contains("An unknown linking error occurred"));
        let block = link_error_block("a.vert/a.frag", &format_link_log(""));
        assert!(block.contains(" LINKING ERROR: a.vert/a.frag\n"));
    }
}
