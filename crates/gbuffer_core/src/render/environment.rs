//! Debug environment signal
//!
//! A single flag telling the shader preprocessor and the draw passes whether a
//! frame-capture tool is attached. Detected once at startup.

use crate::core::CaptureToolMode;

/// Environment variables a capture tool sets in processes it launches
const CAPTURE_TOOL_VARS: [&str; 3] = [
    "RENDERDOC_CAPFILE",
    "RENDERDOC_CAPOPTS",
    "ENABLE_VULKAN_RENDERDOC_CAPTURE",
];

/// Process-level debug signals consumed by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugEnvironment {
    /// A frame-capture tool is attached
    pub capture_tool_attached: bool,
}

impl DebugEnvironment {
    /// Build from an explicit flag
    pub fn new(capture_tool_attached: bool) -> Self {
        Self { capture_tool_attached }
    }

    /// Resolve the signal for a configured mode
    pub fn detect(mode: CaptureToolMode) -> Self {
        Self::detect_with(mode, |var| std::env::var_os(var).is_some())
    }

    /// Resolve the signal using a custom variable probe
    pub fn detect_with(mode: CaptureToolMode, is_set: impl Fn(&str) -> bool) -> Self {
        let attached = match mode {
            CaptureToolMode::ForceOn => true,
            CaptureToolMode::ForceOff => false,
            CaptureToolMode::Auto => CAPTURE_TOOL_VARS.iter().any(|var| is_set(var)),
        };
        if attached {
            log::info!("[ENV] Frame capture tool attached: bindless disabled, indirect draws split");
        }
        Self::new(attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_detects_from_probe() {
        let env = DebugEnvironment::detect_with(CaptureToolMode::Auto, |var| var == "RENDERDOC_CAPFILE");
        assert!(env.capture_tool_attached);

        let env = DebugEnvironment::detect_with(CaptureToolMode::Auto, |_| false);
        assert!(!env.capture_tool_attached);
    }

    #[test]
    fn test_forced_modes_ignore_probe() {
        assert!(DebugEnvironment::detect_with(CaptureToolMode::ForceOn, |_| false).capture_tool_attached);
        assert!(!DebugEnvironment::detect_with(CaptureToolMode::ForceOff, |_| true).capture_tool_attached);
    }
}
