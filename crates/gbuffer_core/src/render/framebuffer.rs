//! Named framebuffers with semantic color attachments
//!
//! Passes select outputs by semantic name ("BaseColor", "Normal", ...) rather
//! than by slot. [`GBufferTargets`] is the bitflag form of the G-Buffer
//! attachment set used by the geometry and mirror passes.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::render::backend::{DepthAttachment, FramebufferHandle, GraphicsDevice};
use crate::render::{RenderError, RenderResult};

/// Name of the G-Buffer framebuffer
pub const GBUFFER: &str = "GBuffer";

bitflags! {
    /// G-Buffer color attachments a pass writes to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GBufferTargets: u32 {
        /// Albedo and alpha
        const BASE_COLOR = 1 << 0;
        /// World-space normal
        const NORMAL = 1 << 1;
        /// Roughness, metalness, ambient occlusion
        const RMA = 1 << 2;
        /// World-space position
        const WORLD_POSITION = 1 << 3;
        /// Emissive color
        const EMISSIVE = 1 << 4;

        /// Every geometry target
        const ALL = Self::BASE_COLOR.bits()
            | Self::NORMAL.bits()
            | Self::RMA.bits()
            | Self::WORLD_POSITION.bits()
            | Self::EMISSIVE.bits();
    }
}

impl GBufferTargets {
    const NAMED: [(GBufferTargets, &'static str); 5] = [
        (GBufferTargets::BASE_COLOR, "BaseColor"),
        (GBufferTargets::NORMAL, "Normal"),
        (GBufferTargets::RMA, "RMA"),
        (GBufferTargets::WORLD_POSITION, "WorldPosition"),
        (GBufferTargets::EMISSIVE, "Emissive"),
    ];

    /// Attachment names for the set flags, in attachment order
    pub fn attachment_names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Creation parameters for a framebuffer
#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    /// Lookup name
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color attachment names in slot order
    pub color_attachments: Vec<String>,
    /// Allocate a second depth/stencil texture that can be swapped in
    pub backup_depth: bool,
}

impl FramebufferDesc {
    /// The G-Buffer layout at the given resolution
    pub fn gbuffer(width: u32, height: u32) -> Self {
        Self {
            name: GBUFFER.to_string(),
            width,
            height,
            color_attachments: GBufferTargets::ALL
                .attachment_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            backup_depth: true,
        }
    }
}

/// A created framebuffer
#[derive(Debug, Clone)]
pub struct Framebuffer {
    handle: FramebufferHandle,
    desc: FramebufferDesc,
}

impl Framebuffer {
    /// Backend handle
    pub fn handle(&self) -> FramebufferHandle {
        self.handle
    }

    /// Lookup name
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// Size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    /// Slot of a named color attachment
    pub fn attachment_slot(&self, name: &str) -> Option<u32> {
        self.desc
            .color_attachments
            .iter()
            .position(|attachment| attachment == name)
            .map(|slot| slot as u32)
    }

    /// Bind for drawing
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(self.handle);
    }

    /// Route fragment outputs to the named attachments
    ///
    /// Unknown names are skipped with a warning.
    pub fn set_draw_buffers(&self, device: &mut dyn GraphicsDevice, names: &[&str]) {
        let slots: Vec<u32> = names
            .iter()
            .filter_map(|name| {
                let slot = self.attachment_slot(name);
                if slot.is_none() {
                    log::warn!("[FRAMEBUFFER] '{}' has no attachment named '{}'", self.desc.name, name);
                }
                slot
            })
            .collect();
        device.draw_buffers(self.handle, &slots);
    }

    /// Route fragment outputs to a G-Buffer target set
    pub fn set_draw_targets(&self, device: &mut dyn GraphicsDevice, targets: GBufferTargets) {
        self.set_draw_buffers(device, &targets.attachment_names());
    }

    /// Copy the primary depth/stencil into the backup texture
    pub fn backup_depth(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        self.require_backup()?;
        device.copy_depth_to_backup(self.handle);
        Ok(())
    }

    /// Attach the backup depth/stencil texture
    pub fn use_backup_depth(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        self.require_backup()?;
        device.attach_depth(self.handle, DepthAttachment::Backup);
        Ok(())
    }

    /// Reattach the primary depth/stencil texture
    pub fn use_primary_depth(&self, device: &mut dyn GraphicsDevice) {
        device.attach_depth(self.handle, DepthAttachment::Primary);
    }

    /// Clear the currently attached depth
    pub fn clear_depth(&self, device: &mut dyn GraphicsDevice, value: f32) {
        device.clear_depth(self.handle, value);
    }

    /// Clear the currently attached stencil
    pub fn clear_stencil(&self, device: &mut dyn GraphicsDevice, value: i32) {
        device.clear_stencil(self.handle, value);
    }

    fn require_backup(&self) -> RenderResult<()> {
        if self.desc.backup_depth {
            Ok(())
        } else {
            Err(RenderError::missing("backup depth attachment", self.desc.name.clone()))
        }
    }
}

/// Name → framebuffer registry
#[derive(Debug, Default)]
pub struct FramebufferRegistry {
    framebuffers: HashMap<String, Framebuffer>,
}

impl FramebufferRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framebuffer on the device and register it under its name
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, desc: FramebufferDesc) -> RenderResult<&Framebuffer> {
        let handle = device.create_framebuffer(&desc)?;
        log::debug!(
            "[FRAMEBUFFER] Created '{}' {}x{} with {} color attachments",
            desc.name,
            desc.width,
            desc.height,
            desc.color_attachments.len()
        );
        let name = desc.name.clone();
        self.framebuffers.insert(name.clone(), Framebuffer { handle, desc });
        self.get(&name).ok_or_else(|| RenderError::missing("framebuffer", name))
    }

    /// Look up a framebuffer by name
    pub fn get(&self, name: &str) -> Option<&Framebuffer> {
        self.framebuffers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{DeviceCommand, RecordingDevice};

    #[test]
    fn test_target_names_follow_attachment_order() {
        let targets = GBufferTargets::EMISSIVE | GBufferTargets::BASE_COLOR;
        assert_eq!(targets.attachment_names(), vec!["BaseColor", "Emissive"]);
        assert_eq!(GBufferTargets::ALL.attachment_names().len(), 5);
    }

    #[test]
    fn test_draw_targets_resolve_to_slots() {
        let mut device = RecordingDevice::new();
        let mut registry = FramebufferRegistry::new();
        let gbuffer = registry.create(&mut device, FramebufferDesc::gbuffer(64, 64)).unwrap().clone();

        gbuffer.set_draw_targets(&mut device, GBufferTargets::BASE_COLOR);
        gbuffer.set_draw_targets(&mut device, GBufferTargets::ALL);

        let buffers: Vec<Vec<u32>> = device
            .commands()
            .iter()
            .filter_map(|cmd| match cmd {
                DeviceCommand::DrawBuffers { slots, .. } => Some(slots.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(buffers, vec![vec![0], vec![0, 1, 2, 3, 4]]);
    }

    #[test]
    fn test_backup_depth_requires_allocation() {
        let mut device = RecordingDevice::new();
        let mut registry = FramebufferRegistry::new();
        let desc = FramebufferDesc {
            backup_depth: false,
            ..FramebufferDesc::gbuffer(8, 8)
        };
        let fb = registry.create(&mut device, desc).unwrap().clone();
        assert!(matches!(fb.backup_depth(&mut device), Err(RenderError::MissingResource { .. })));
    }
}
