//! Entity Model Representation
//!
//! Every parser produces an [`EntityModelData`]: a renderer-agnostic set of
//! frames (poses) and surfaces. A surface owns its skins and one mesh per
//! frame. Meshes are flat vertex buffers whose primitive structure is
//! described by an [`IndexRangeMap`] or a [`MaterialIndexRangeMap`].

pub mod index_range_map;
pub mod material_index_range_map;
pub mod normals;

pub use index_range_map::{IndexRange, IndexRangeMap, IndexRangeMapBuilder, PrimType, Size};
pub use material_index_range_map::{MaterialIndexRangeMap, MaterialIndexRangeMapBuilder};

use glam::{Vec2, Vec3};

use crate::assets::material::Material;
use crate::resources::{ProcessContext, ResourcePayload};

// ============================================================================
// Vertex & Bounds
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EntityModelVertex {
    pub position: Vec3,
    pub uv: Vec2,
}

impl EntityModelVertex {
    #[inline]
    #[must_use]
    pub fn new(position: Vec3, uv: Vec2) -> Self {
        Self { position, uv }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Grows a bounding box point by point. Empty builders yield the zero box.
#[derive(Debug, Clone, Copy, Default)]
pub struct AabbBuilder {
    bounds: Option<Aabb>,
}

impl AabbBuilder {
    pub fn add(&mut self, point: Vec3) {
        self.bounds = Some(match self.bounds {
            Some(b) => Aabb::new(b.min.min(point), b.max.max(point)),
            None => Aabb::new(point, point),
        });
    }

    pub fn add_all(&mut self, points: impl IntoIterator<Item = Vec3>) {
        for point in points {
            self.add(point);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bounds.unwrap_or_default()
    }
}

// ============================================================================
// Model Tags
// ============================================================================

/// How the pitch angle of an entity is applied to its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PitchType {
    #[default]
    Normal,
    /// Quake 1 MDL models pitch in the opposite direction.
    MdlInverted,
}

/// How a model is oriented relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    ViewPlaneParallelUpright,
    FacingUpright,
    ViewPlaneParallel,
    #[default]
    Oriented,
    ViewPlaneParallelOriented,
}

impl Orientation {
    /// Maps the sprite type stored in SPR headers.
    #[must_use]
    pub fn from_sprite_type(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::ViewPlaneParallelUpright),
            1 => Some(Self::FacingUpright),
            2 => Some(Self::ViewPlaneParallel),
            3 => Some(Self::Oriented),
            4 => Some(Self::ViewPlaneParallelOriented),
            _ => None,
        }
    }
}

// ============================================================================
// Frames, Meshes & Surfaces
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EntityModelFrame {
    pub index: usize,
    pub name: String,
    pub bounds: Aabb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshIndices {
    Ranges(IndexRangeMap),
    MaterialRanges(MaterialIndexRangeMap),
}

impl MeshIndices {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Ranges(map) => map.vertex_count(),
            Self::MaterialRanges(map) => map.vertex_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityModelMesh {
    pub vertices: Vec<EntityModelVertex>,
    pub indices: MeshIndices,
}

impl EntityModelMesh {
    /// Range map for single-material meshes.
    #[must_use]
    pub fn ranges(&self) -> Option<&IndexRangeMap> {
        match &self.indices {
            MeshIndices::Ranges(map) => Some(map),
            MeshIndices::MaterialRanges(_) => None,
        }
    }

    #[must_use]
    pub fn material_ranges(&self) -> Option<&MaterialIndexRangeMap> {
        match &self.indices {
            MeshIndices::MaterialRanges(map) => Some(map),
            MeshIndices::Ranges(_) => None,
        }
    }

    /// Raw vertex bytes, ready to be copied into a vertex buffer.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Named group of triangles that share one set of skins.
#[derive(Debug, Clone)]
pub struct EntityModelSurface {
    name: String,
    skins: Vec<Material>,
    meshes: Vec<Option<EntityModelMesh>>,
}

impl EntityModelSurface {
    #[must_use]
    pub fn new(name: impl Into<String>, frame_count: usize) -> Self {
        Self {
            name: name.into(),
            skins: Vec::new(),
            meshes: vec![None; frame_count],
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_skins(&mut self, skins: Vec<Material>) {
        self.skins = skins;
    }

    #[inline]
    #[must_use]
    pub fn skins(&self) -> &[Material] {
        &self.skins
    }

    #[inline]
    #[must_use]
    pub fn skin_count(&self) -> usize {
        self.skins.len()
    }

    #[must_use]
    pub fn skin(&self, index: usize) -> Option<&Material> {
        self.skins.get(index)
    }

    #[must_use]
    pub fn skin_by_name(&self, name: &str) -> Option<&Material> {
        self.skins.iter().find(|skin| skin.name() == name)
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.meshes.len()
    }

    #[must_use]
    pub fn mesh(&self, frame_index: usize) -> Option<&EntityModelMesh> {
        self.meshes.get(frame_index).and_then(Option::as_ref)
    }

    pub fn meshes(&self) -> impl Iterator<Item = &EntityModelMesh> {
        self.meshes.iter().flatten()
    }

    fn set_mesh(&mut self, frame_index: usize, mesh: EntityModelMesh) {
        if frame_index >= self.meshes.len() {
            self.meshes.resize(frame_index + 1, None);
        }
        self.meshes[frame_index] = Some(mesh);
    }

    pub fn add_mesh(
        &mut self,
        frame_index: usize,
        vertices: Vec<EntityModelVertex>,
        ranges: IndexRangeMap,
    ) {
        self.set_mesh(
            frame_index,
            EntityModelMesh {
                vertices,
                indices: MeshIndices::Ranges(ranges),
            },
        );
    }

    pub fn add_material_mesh(
        &mut self,
        frame_index: usize,
        vertices: Vec<EntityModelVertex>,
        ranges: MaterialIndexRangeMap,
    ) {
        self.set_mesh(
            frame_index,
            EntityModelMesh {
                vertices,
                indices: MeshIndices::MaterialRanges(ranges),
            },
        );
    }
}

// ============================================================================
// EntityModelData
// ============================================================================

/// Decoded, renderer-agnostic model.
#[derive(Debug, Clone)]
pub struct EntityModelData {
    pitch_type: PitchType,
    orientation: Orientation,
    frames: Vec<EntityModelFrame>,
    surfaces: Vec<EntityModelSurface>,
}

impl EntityModelData {
    #[must_use]
    pub fn new(pitch_type: PitchType, orientation: Orientation) -> Self {
        Self {
            pitch_type,
            orientation,
            frames: Vec::new(),
            surfaces: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn pitch_type(&self) -> PitchType {
        self.pitch_type
    }

    #[inline]
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Appends a frame and returns its index.
    pub fn add_frame(&mut self, name: impl Into<String>, bounds: Aabb) -> usize {
        let index = self.frames.len();
        self.frames.push(EntityModelFrame {
            index,
            name: name.into(),
            bounds,
        });
        index
    }

    /// Appends an empty surface with room for `frame_count` meshes.
    pub fn add_surface(
        &mut self,
        name: impl Into<String>,
        frame_count: usize,
    ) -> &mut EntityModelSurface {
        self.surfaces
            .push(EntityModelSurface::new(name, frame_count));
        let last = self.surfaces.len() - 1;
        &mut self.surfaces[last]
    }

    #[inline]
    #[must_use]
    pub fn frames(&self) -> &[EntityModelFrame] {
        &self.frames
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// First frame called `name`.
    #[must_use]
    pub fn frame(&self, name: &str) -> Option<&EntityModelFrame> {
        self.frames.iter().find(|frame| frame.name == name)
    }

    #[inline]
    #[must_use]
    pub fn surfaces(&self) -> &[EntityModelSurface] {
        &self.surfaces
    }

    #[inline]
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// First surface called `name`.
    #[must_use]
    pub fn surface(&self, name: &str) -> Option<&EntityModelSurface> {
        self.surfaces.iter().find(|surface| surface.name == name)
    }

    /// Bounds of the first frame, used when no frame is selected.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.frames.first().map(|f| f.bounds).unwrap_or_default()
    }

    /// Skins of every surface, in surface order.
    fn skin_materials(&self) -> impl Iterator<Item = &Material> {
        self.surfaces.iter().flat_map(|surface| surface.skins.iter())
    }
}

impl ResourcePayload for EntityModelData {
    fn upload(&mut self, ctx: &ProcessContext<'_>) {
        for material in self.skin_materials() {
            material.texture().upload_sync(ctx);
        }
    }

    fn release(&mut self, ctx: &ProcessContext<'_>) {
        for material in self.skin_materials() {
            material.texture().drop_sync(ctx);
        }
    }
}
