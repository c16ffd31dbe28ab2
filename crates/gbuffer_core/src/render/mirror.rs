//! Planar mirrors
//!
//! A [`Mirror`] is a flat mesh that reflects the scene. Every frame its world
//! placement is refreshed from its parent object, and for each visible
//! viewport it derives the reflected camera: a clip plane, a view and a
//! short-range projection, and a culling frustum. The mirror geometry pass
//! consumes these per viewport.

use slotmap::{new_key_type, SlotMap};

use crate::core::MirrorConfig;
use crate::foundation::math::{utils, Aabb, Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::draw_commands::MeshRange;
use crate::render::frame_data::{CameraPose, ViewportData};
use crate::render::frustum::Frustum;
use crate::render::viewport::{PerViewport, Viewport, ViewportIndex, ViewportManager};

new_key_type! {
    /// Identifies a mirror in the [`MirrorManager`]
    pub struct MirrorId;
}

/// What a level provides to create a mirror
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorDesc {
    /// Object whose transform places the mirror
    pub parent_id: u64,
    /// Mirror mesh in static vertex/index storage
    pub mesh: MeshRange,
    /// Mesh bounds in local space
    pub local_bounds: Aabb,
    /// Surface normal in local space (the mesh's vertex normal)
    pub local_normal: Vec3,
}

/// Reflected camera for one viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorView {
    /// World-space plane `(n, w)`, biased so the surface does not clip itself
    pub clip_plane: Vec4,
    /// Camera forward reflected in the mirror
    pub reflect_vector: Vec3,
    /// Reflected camera position
    pub camera_position: Vec3,
    /// View matrix of the reflected camera
    pub view: Mat4,
    /// Projection with the mirror's shortened far plane
    pub projection: Mat4,
    /// Culling frustum of the reflected camera
    pub frustum: Frustum,
    /// Mirror front faces this viewport's camera
    pub facing_camera: bool,
}

impl Default for MirrorView {
    fn default() -> Self {
        Self {
            clip_plane: Vec4::zeros(),
            reflect_vector: Vec3::zeros(),
            camera_position: Vec3::zeros(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            frustum: Frustum::default(),
            facing_camera: false,
        }
    }
}

/// A planar reflective surface
#[derive(Debug, Clone)]
pub struct Mirror {
    id: MirrorId,
    parent_id: u64,
    mesh: MeshRange,
    local_bounds: Aabb,
    local_corners: [Vec3; 4],
    local_center: Vec3,
    local_normal: Vec3,
    far_distance: f32,
    plane_epsilon: f32,
    world_matrix: Mat4,
    world_center: Vec3,
    world_normal: Vec3,
    world_corners: [Vec3; 4],
    views: PerViewport<MirrorView>,
}

impl Mirror {
    /// Create a mirror from its mesh description
    pub fn new(id: MirrorId, desc: &MirrorDesc, config: &MirrorConfig) -> Self {
        let local_normal = desc.local_normal.try_normalize(f32::EPSILON).unwrap_or_else(|| {
            log::warn!("[MIRROR] Mirror on object {} has a zero normal", desc.parent_id);
            Vec3::zeros()
        });
        let local_corners = thin_axis_corners(&desc.local_bounds);
        Self {
            id,
            parent_id: desc.parent_id,
            mesh: desc.mesh,
            local_bounds: desc.local_bounds,
            local_corners,
            local_center: desc.local_bounds.center(),
            local_normal,
            far_distance: config.far_distance,
            plane_epsilon: config.plane_epsilon,
            world_matrix: Mat4::identity(),
            world_center: desc.local_bounds.center(),
            world_normal: local_normal,
            world_corners: local_corners,
            views: PerViewport::default(),
        }
    }

    /// Registry id
    pub fn id(&self) -> MirrorId {
        self.id
    }

    /// Parent object id
    pub fn parent_id(&self) -> u64 {
        self.parent_id
    }

    /// Mesh drawn for the stencil mask
    pub fn mesh(&self) -> &MeshRange {
        &self.mesh
    }

    /// Local-space bounds
    pub fn local_bounds(&self) -> &Aabb {
        &self.local_bounds
    }

    /// World transform from the last update
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// World-space center
    pub fn world_center(&self) -> Vec3 {
        self.world_center
    }

    /// World-space unit normal
    pub fn world_normal(&self) -> Vec3 {
        self.world_normal
    }

    /// World-space corners of the reflective face
    pub fn world_corners(&self) -> &[Vec3; 4] {
        &self.world_corners
    }

    /// Refresh world placement and every visible viewport's reflected camera
    pub fn update(
        &mut self,
        world_matrix: &Mat4,
        viewports: &ViewportManager,
        viewport_data: &PerViewport<ViewportData>,
        gbuffer_resolution: (u32, u32),
    ) {
        self.world_matrix = *world_matrix;
        self.world_center = utils::transform_point(world_matrix, &self.local_center);
        self.world_normal = utils::transform_vector(world_matrix, &self.local_normal)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros);
        for (world, local) in self.world_corners.iter_mut().zip(&self.local_corners) {
            *world = utils::transform_point(world_matrix, local);
        }

        for index in ViewportIndex::ALL {
            let viewport = viewports.get(index);
            self.views[index] = if viewport.visible {
                self.reflect_camera(viewport, &viewport_data[index].camera, gbuffer_resolution)
            } else {
                MirrorView::default()
            };
        }
    }

    fn reflect_camera(&self, viewport: &Viewport, camera: &CameraPose, resolution: (u32, u32)) -> MirrorView {
        let n = self.world_normal;
        let clip_plane = Vec4::new(n.x, n.y, n.z, -n.dot(&self.world_center) + self.plane_epsilon);

        let signed_distance = n.dot(&camera.position) + clip_plane.w;
        let camera_position = camera.position - 2.0 * signed_distance * n;

        let reflected = utils::reflect(&camera.forward, &n);
        let reflect_vector = if reflected.norm_squared() < 1e-6 {
            camera.forward
        } else {
            reflected.normalize()
        };

        let reflected_up = utils::reflect(&camera.up, &n);
        let right = reflect_vector
            .cross(&reflected_up)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::x);
        let up = right.cross(&reflect_vector).normalize();

        let view = Mat4::look_at(camera_position, camera_position + reflect_vector, up);
        let projection = Mat4::perspective_gl(
            viewport.fov,
            viewport.aspect_ratio(resolution.0, resolution.1),
            viewport.near,
            self.far_distance,
        );

        MirrorView {
            clip_plane,
            reflect_vector,
            camera_position,
            view,
            projection,
            frustum: Frustum::from_matrix(&(projection * view)),
            facing_camera: n.dot(&(camera.position - self.world_center)) > 0.0,
        }
    }

    /// Reflected camera of a viewport slot
    pub fn view(&self, index: ViewportIndex) -> &MirrorView {
        &self.views[index]
    }

    /// Front face points toward the viewport's camera; false when out of range
    pub fn is_facing_viewport_camera(&self, index: usize) -> bool {
        self.views.get(index).is_some_and(|view| view.facing_camera)
    }

    /// Clip plane for a viewport; zero when out of range
    pub fn clip_plane(&self, index: usize) -> Vec4 {
        self.views.get(index).map_or_else(Vec4::zeros, |view| view.clip_plane)
    }

    /// Reflected forward for a viewport; zero when out of range
    pub fn reflect_vector(&self, index: usize) -> Vec3 {
        self.views.get(index).map_or_else(Vec3::zeros, |view| view.reflect_vector)
    }

    /// Reflected view matrix; identity when out of range
    pub fn view_matrix(&self, index: usize) -> Mat4 {
        self.views.get(index).map_or_else(Mat4::identity, |view| view.view)
    }

    /// Reflected projection matrix; identity when out of range
    pub fn projection_matrix(&self, index: usize) -> Mat4 {
        self.views.get(index).map_or_else(Mat4::identity, |view| view.projection)
    }

    /// Reflected culling frustum; `None` when out of range
    pub fn frustum(&self, index: usize) -> Option<&Frustum> {
        self.views.get(index).map(|view| &view.frustum)
    }
}

/// The four corners of the box face perpendicular to its thinnest axis
fn thin_axis_corners(bounds: &Aabb) -> [Vec3; 4] {
    let (min, max) = (bounds.min, bounds.max);
    let size = bounds.size();
    if size.y < size.x && size.y < size.z {
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
        ]
    } else if size.z < size.x && size.z < size.y {
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
        ]
    } else {
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ]
    }
}

/// Every mirror in the loaded level
#[derive(Debug, Default)]
pub struct MirrorManager {
    config: MirrorConfig,
    mirrors: SlotMap<MirrorId, Mirror>,
}

impl MirrorManager {
    /// Empty registry
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            config,
            mirrors: SlotMap::with_key(),
        }
    }

    /// Create a mirror
    pub fn add(&mut self, desc: &MirrorDesc) -> MirrorId {
        let config = self.config;
        self.mirrors.insert_with_key(|id| Mirror::new(id, desc, &config))
    }

    /// Remove a mirror
    pub fn remove(&mut self, id: MirrorId) -> Option<Mirror> {
        self.mirrors.remove(id)
    }

    /// Look up a mirror; `None` for removed or unknown ids
    pub fn get(&self, id: MirrorId) -> Option<&Mirror> {
        self.mirrors.get(id)
    }

    /// Every mirror
    pub fn iter(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.values()
    }

    /// Number of mirrors
    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// No mirrors
    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Drop every mirror (level unload)
    pub fn clear(&mut self) {
        self.mirrors.clear();
    }

    /// Update every mirror whose parent transform can be resolved
    pub fn update(
        &mut self,
        parent_transform: impl Fn(u64) -> Option<Mat4>,
        viewports: &ViewportManager,
        viewport_data: &PerViewport<ViewportData>,
        gbuffer_resolution: (u32, u32),
    ) {
        for mirror in self.mirrors.values_mut() {
            match parent_transform(mirror.parent_id) {
                Some(world_matrix) => mirror.update(&world_matrix, viewports, viewport_data, gbuffer_resolution),
                None => log::trace!("[MIRROR] Parent {} not found, mirror not updated", mirror.parent_id),
            }
        }
    }
}
