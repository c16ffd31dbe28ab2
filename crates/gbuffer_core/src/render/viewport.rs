//! Split-screen viewports
//!
//! The renderer draws into at most [`VIEWPORT_COUNT`] viewports per frame.
//! Slots are addressed with [`ViewportIndex`], which can only hold a valid
//! slot number, and stored in [`PerViewport`], which owns the only
//! bounds check for raw indices coming from outside the renderer.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Mat4Ext, Vec2};
use crate::render::frustum::Frustum;
use crate::render::mirror::MirrorId;
use crate::render::{RenderError, RenderResult};

/// Number of viewport slots
pub const VIEWPORT_COUNT: usize = 4;

/// Validated viewport slot number in `0..VIEWPORT_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportIndex(u8);

impl ViewportIndex {
    /// Slot 0
    pub const FIRST: ViewportIndex = ViewportIndex(0);

    /// Every slot in ascending order
    pub const ALL: [ViewportIndex; VIEWPORT_COUNT] =
        [ViewportIndex(0), ViewportIndex(1), ViewportIndex(2), ViewportIndex(3)];

    /// Validate a raw slot number
    pub fn new(index: usize) -> Option<Self> {
        (index < VIEWPORT_COUNT).then(|| Self(index as u8))
    }

    /// Raw slot number
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ViewportIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One value per viewport slot
#[derive(Debug, Clone, PartialEq)]
pub struct PerViewport<T>([T; VIEWPORT_COUNT]);

impl<T> PerViewport<T> {
    /// Wrap an array of slot values
    pub fn new(values: [T; VIEWPORT_COUNT]) -> Self {
        Self(values)
    }

    /// Build each slot from its index
    pub fn from_fn(mut f: impl FnMut(ViewportIndex) -> T) -> Self {
        Self(std::array::from_fn(|i| f(ViewportIndex(i as u8))))
    }

    /// Lookup by raw index; `None` when out of range
    pub fn get(&self, index: usize) -> Option<&T> {
        ViewportIndex::new(index).map(|index| &self[index])
    }

    /// Mutable lookup by raw index; `None` when out of range
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        ViewportIndex::new(index).map(move |index| &mut self[index])
    }

    /// Lookup by raw index, reporting out-of-range indices as an error
    pub fn try_get(&self, index: usize) -> RenderResult<&T> {
        self.get(index).ok_or(RenderError::OutOfRangeQuery {
            what: "viewport",
            index,
            capacity: VIEWPORT_COUNT,
        })
    }

    /// Iterate slots in order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Iterate slots mutably in order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.0.iter_mut()
    }

    /// Iterate `(index, value)` pairs in order
    pub fn indexed(&self) -> impl Iterator<Item = (ViewportIndex, &T)> {
        ViewportIndex::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Clone + Default> PerViewport<T> {
    /// Lookup by raw index, returning `T::default()` when out of range
    pub fn get_or_default(&self, index: usize) -> T {
        self.get(index).cloned().unwrap_or_default()
    }
}

impl<T: Default> Default for PerViewport<T> {
    fn default() -> Self {
        Self(std::array::from_fn(|_| T::default()))
    }
}

impl<T> Index<ViewportIndex> for PerViewport<T> {
    type Output = T;

    fn index(&self, index: ViewportIndex) -> &T {
        &self.0[index.get()]
    }
}

impl<T> IndexMut<ViewportIndex> for PerViewport<T> {
    fn index_mut(&mut self, index: ViewportIndex) -> &mut T {
        &mut self.0[index.get()]
    }
}

/// How a viewport's contents are shaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadingMode {
    /// Fully lit
    #[default]
    Shaded,
    /// Wireframe only
    Wireframe,
    /// Lit with wireframe drawn over it
    WireframeOverlay,
}

/// Split-screen layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitscreenMode {
    /// One fullscreen viewport
    #[default]
    Fullscreen,
    /// Two viewports stacked vertically
    TwoPlayer,
    /// Four quadrants
    FourPlayer,
}

/// Framebuffer-space rectangle, origin bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// A camera's view into a region of the screen
#[derive(Debug, Clone)]
pub struct Viewport {
    index: ViewportIndex,
    /// Top-left corner in normalized screen space
    pub position: Vec2,
    /// Width and height in normalized screen space
    pub size: Vec2,
    /// Orthographic instead of perspective projection
    pub orthographic: bool,
    /// Half-height of the orthographic view volume
    pub ortho_size: f32,
    /// Near plane
    pub near: f32,
    /// Far plane
    pub far: f32,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Drawn this frame
    pub visible: bool,
    /// Mouse is over this viewport
    pub hovered: bool,
    /// Shading mode
    pub shading_mode: ShadingMode,
    /// Mirror reflected in this viewport, at most one
    pub mirror_id: Option<MirrorId>,
    frustum: Frustum,
}

impl Viewport {
    /// Fullscreen perspective viewport
    pub fn new(index: ViewportIndex) -> Self {
        Self {
            index,
            position: Vec2::zeros(),
            size: Vec2::new(1.0, 1.0),
            orthographic: false,
            ortho_size: 1.0,
            near: 0.005,
            far: 256.0,
            fov: 1.0,
            visible: true,
            hovered: false,
            shading_mode: ShadingMode::Shaded,
            mirror_id: None,
            frustum: Frustum::default(),
        }
    }

    /// Slot this viewport occupies
    pub fn index(&self) -> ViewportIndex {
        self.index
    }

    /// Switch to a perspective projection
    pub fn set_perspective(&mut self, fov: f32, near: f32, far: f32) {
        self.orthographic = false;
        self.fov = fov;
        self.near = near;
        self.far = far;
    }

    /// Switch to an orthographic projection
    pub fn set_orthographic(&mut self, ortho_size: f32, near: f32, far: f32) {
        self.orthographic = true;
        self.ortho_size = ortho_size;
        self.near = near;
        self.far = far;
    }

    /// Aspect ratio of the viewport's region of a `width` x `height` target
    pub fn aspect_ratio(&self, width: u32, height: u32) -> f32 {
        let w = self.size.x * width as f32;
        let h = self.size.y * height as f32;
        if h > 0.0 { w / h } else { 1.0 }
    }

    /// Region of a `width` x `height` target covered by this viewport
    pub fn pixel_rect(&self, width: u32, height: u32) -> PixelRect {
        let (w, h) = (width as f32, height as f32);
        PixelRect {
            x: (self.position.x * w) as i32,
            y: ((1.0 - self.position.y - self.size.y) * h) as i32,
            width: (self.size.x * w) as u32,
            height: (self.size.y * h) as u32,
        }
    }

    /// Perspective projection for a target of the given size
    pub fn perspective_matrix(&self, width: u32, height: u32) -> Mat4 {
        Mat4::perspective_gl(self.fov, self.aspect_ratio(width, height), self.near, self.far)
    }

    /// Orthographic projection for a target of the given size
    pub fn orthographic_matrix(&self, width: u32, height: u32) -> Mat4 {
        let half_height = self.ortho_size;
        let half_width = half_height * self.aspect_ratio(width, height);
        Mat4::orthographic_gl(-half_width, half_width, -half_height, half_height, self.near, self.far)
    }

    /// Active projection
    pub fn projection_matrix(&self, width: u32, height: u32) -> Mat4 {
        if self.orthographic {
            self.orthographic_matrix(width, height)
        } else {
            self.perspective_matrix(width, height)
        }
    }

    /// Culling frustum of this viewport's camera
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Rebuild the culling frustum from the camera's projection-view matrix
    pub fn update_frustum(&mut self, projection_view: &Mat4) {
        self.frustum.update(projection_view);
    }
}

/// The fixed set of viewports
#[derive(Debug, Clone)]
pub struct ViewportManager {
    viewports: PerViewport<Viewport>,
}

impl ViewportManager {
    /// All four viewports, laid out fullscreen
    pub fn new() -> Self {
        let mut manager = Self {
            viewports: PerViewport::from_fn(Viewport::new),
        };
        manager.set_splitscreen_mode(SplitscreenMode::Fullscreen);
        manager
    }

    /// Position, size and show/hide viewports for a split-screen layout
    pub fn set_splitscreen_mode(&mut self, mode: SplitscreenMode) {
        let layout: &[(f32, f32, f32, f32)] = match mode {
            SplitscreenMode::Fullscreen => &[(0.0, 0.0, 1.0, 1.0)],
            SplitscreenMode::TwoPlayer => &[(0.0, 0.0, 1.0, 0.5), (0.0, 0.5, 1.0, 0.5)],
            SplitscreenMode::FourPlayer => &[
                (0.0, 0.0, 0.5, 0.5),
                (0.5, 0.0, 0.5, 0.5),
                (0.0, 0.5, 0.5, 0.5),
                (0.5, 0.5, 0.5, 0.5),
            ],
        };
        for (i, viewport) in self.viewports.iter_mut().enumerate() {
            match layout.get(i) {
                Some(&(x, y, w, h)) => {
                    viewport.position = Vec2::new(x, y);
                    viewport.size = Vec2::new(w, h);
                    viewport.visible = true;
                }
                None => viewport.visible = false,
            }
        }
    }

    /// Viewport in a slot
    pub fn get(&self, index: ViewportIndex) -> &Viewport {
        &self.viewports[index]
    }

    /// Mutable viewport in a slot
    pub fn get_mut(&mut self, index: ViewportIndex) -> &mut Viewport {
        &mut self.viewports[index]
    }

    /// Viewport by raw index, `None` when out of range
    pub fn get_raw(&self, index: usize) -> Option<&Viewport> {
        self.viewports.get(index)
    }

    /// Mirror reflected in a raw slot, `None` when out of range or unset
    pub fn mirror_id(&self, index: usize) -> Option<MirrorId> {
        self.viewports.get(index).and_then(|viewport| viewport.mirror_id)
    }

    /// Visible viewports in slot order
    pub fn visible(&self) -> impl Iterator<Item = &Viewport> {
        self.viewports.iter().filter(|viewport| viewport.visible)
    }

    /// Every viewport in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Viewport> {
        self.viewports.iter()
    }

    /// Every viewport mutably in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Viewport> {
        self.viewports.iter_mut()
    }
}

impl Default for ViewportManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_index_is_bounded() {
        assert!(ViewportIndex::new(3).is_some());
        assert!(ViewportIndex::new(4).is_none());
        assert_eq!(ViewportIndex::ALL.len(), VIEWPORT_COUNT);
    }

    #[test]
    fn test_out_of_range_returns_safe_default() {
        let flags = PerViewport::new([true, true, false, true]);
        assert!(flags.get_or_default(1));
        assert!(!flags.get_or_default(2));
        assert!(!flags.get_or_default(17));
        assert!(matches!(flags.try_get(4), Err(RenderError::OutOfRangeQuery { index: 4, .. })));
    }

    #[test]
    fn test_pixel_rect_is_bottom_left_origin() {
        let mut manager = ViewportManager::new();
        manager.set_splitscreen_mode(SplitscreenMode::TwoPlayer);

        let top = manager.get(ViewportIndex::FIRST).pixel_rect(1920, 1080);
        let bottom = manager.get(ViewportIndex::ALL[1]).pixel_rect(1920, 1080);
        assert_eq!(top, PixelRect { x: 0, y: 540, width: 1920, height: 540 });
        assert_eq!(bottom, PixelRect { x: 0, y: 0, width: 1920, height: 540 });
    }

    #[test]
    fn test_layout_hides_unused_slots() {
        let mut manager = ViewportManager::new();
        assert_eq!(manager.visible().count(), 1);

        manager.set_splitscreen_mode(SplitscreenMode::FourPlayer);
        assert_eq!(manager.visible().count(), 4);
        assert_relative_eq!(manager.get(ViewportIndex::ALL[3]).aspect_ratio(1920, 1080), 16.0 / 9.0, epsilon = 1e-5);
    }

    #[test]
    fn test_mirror_id_out_of_range_is_none() {
        let manager = ViewportManager::new();
        assert!(manager.mirror_id(0).is_none());
        assert!(manager.mirror_id(9).is_none());
    }
}
