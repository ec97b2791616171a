//! Quake MDL models.
//!
//! Skins are embedded as palette indices and the triangles are stored as a
//! plain list that indexes both the skin vertices (UVs) and the frame
//! vertices (positions). Skin groups and frame groups are animated; only
//! their first picture or sub-frame is decoded.

use std::path::Path;

use bitflags::bitflags;
use glam::{Vec2, Vec3};

use crate::assets::palette::{Palette, PaletteTransparency};
use crate::assets::skin::load_indexed_skin;
use crate::assets::Material;
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension};
use crate::loaders::{LoadContext, ident};
use crate::model::{
    Aabb, AabbBuilder, EntityModelData, EntityModelVertex, IndexRangeMapBuilder, Orientation,
    PitchType, PrimType, Size,
};

pub const IDENT: i32 = ident(b"IDPO");
pub const VERSION: i32 = 6;

const HEADER_SKIN_COUNT_OFFSET: usize = 0x30;
const SKINS_OFFSET: usize = 0x54;
const SIMPLE_FRAME_NAME_OFFSET: usize = 0x8;
const SIMPLE_FRAME_NAME_LENGTH: usize = 0x10;
// Sub-frame count plus the group's bounding vertices.
const FRAME_GROUP_HEADER_SIZE: usize = 0xC;
const SKIN_VERTEX_SIZE: usize = 3 * 4;
const TRIANGLE_SIZE: usize = 4 * 4;

bitflags! {
    /// Model flags from the MDL header.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MdlFlags: u32 {
        const ROCKET  = 1 << 0;
        const GRENADE = 1 << 1;
        const GIB     = 1 << 2;
        const ROTATE  = 1 << 3;
        const TRACER  = 1 << 4;
        const ZOMGIB  = 1 << 5;
        const TRACER2 = 1 << 6;
        const TRACER3 = 1 << 7;
        /// Palette index 255 is transparent in the skins.
        const HOLEY   = 1 << 14;
    }
}

impl MdlFlags {
    #[must_use]
    pub fn transparency(self) -> PaletteTransparency {
        if self.contains(Self::HOLEY) {
            PaletteTransparency::Index255Transparent
        } else {
            PaletteTransparency::Opaque
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SkinVertex {
    onseam: bool,
    s: i32,
    t: i32,
}

#[derive(Debug, Clone, Copy)]
struct SkinTriangle {
    front: bool,
    vertices: [usize; 3],
}

/// Dimensions and decoding parameters shared by every frame.
struct Geometry<'a> {
    skin_width: usize,
    skin_height: usize,
    scale: Vec3,
    origin: Vec3,
    vertices: &'a [SkinVertex],
    triangles: &'a [SkinTriangle],
}

#[must_use]
pub fn can_load(path: &Path, mut reader: Reader) -> bool {
    has_extension(path, &["mdl"])
        && reader.read_i32().is_ok_and(|i| i == IDENT)
        && reader.read_i32().is_ok_and(|v| v == VERSION)
}

pub fn load(name: &str, mut reader: Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let ident = reader.read_i32()?;
    if ident != IDENT {
        return Err(ForgeError::format(format!("Unknown MDL model ident: {ident}")));
    }
    let version = reader.read_i32()?;
    if version != VERSION {
        return Err(ForgeError::format(format!("Unknown MDL model version: {version}")));
    }
    let palette = ctx.require_palette("MDL")?;

    let scale = reader.read_vec3()?;
    let origin = reader.read_vec3()?;

    reader.seek_from_begin(HEADER_SKIN_COUNT_OFFSET)?;
    let skin_count = reader.read_size()?;
    let skin_width = reader.read_size()?;
    let skin_height = reader.read_size()?;
    let vertex_count = reader.read_size()?;
    let triangle_count = reader.read_size()?;
    let frame_count = reader.read_size()?;
    let _sync_type = reader.read_size()?;
    let flags = MdlFlags::from_bits_retain(reader.read_u32()?);

    let pixel_count = skin_pixel_count(skin_width, skin_height)?;

    reader.seek_from_begin(SKINS_OFFSET)?;
    reader.ensure_count(skin_count, pixel_count.saturating_add(4))?;
    let skins = (0..skin_count)
        .map(|i| {
            parse_skin(
                &mut reader,
                format!("{name}_{i}"),
                skin_width,
                skin_height,
                flags,
                palette,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    reader.ensure_count(vertex_count, SKIN_VERTEX_SIZE)?;
    let vertices = (0..vertex_count)
        .map(|_| {
            Ok(SkinVertex {
                onseam: reader.read_bool()?,
                s: reader.read_i32()?,
                t: reader.read_i32()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    reader.ensure_count(triangle_count, TRIANGLE_SIZE)?;
    let triangles = (0..triangle_count)
        .map(|_| {
            let front = reader.read_bool()?;
            let vertices = [reader.read_size()?, reader.read_size()?, reader.read_size()?];
            if let Some(&invalid) = vertices.iter().find(|&&v| v >= vertex_count) {
                return Err(ForgeError::format(format!(
                    "MDL triangle references vertex {invalid}, but the model has {vertex_count} vertices"
                )));
            }
            Ok(SkinTriangle { front, vertices })
        })
        .collect::<Result<Vec<_>>>()?;

    let geometry = Geometry {
        skin_width,
        skin_height,
        scale,
        origin,
        vertices: &vertices,
        triangles: &triangles,
    };

    let mut model = EntityModelData::new(PitchType::MdlInverted, Orientation::Oriented);
    reader.ensure_count(frame_count, 4 + frame_length(vertex_count))?;
    let mut meshes = Vec::with_capacity(frame_count);
    for _ in 0..frame_count {
        let (frame_name, mesh_vertices, bounds) = parse_frame(&mut reader, &geometry)?;
        let frame_index = model.add_frame(frame_name, bounds);
        meshes.push((frame_index, mesh_vertices));
    }

    let surface = model.add_surface(name, frame_count);
    surface.set_skins(skins);
    for (frame_index, mesh_vertices) in meshes {
        let mut size = Size::default();
        size.inc(PrimType::Triangles);
        let mut builder = IndexRangeMapBuilder::new(mesh_vertices.len(), &size);
        builder.add_triangles(mesh_vertices);
        let (vertices, ranges) = builder.finish();
        surface.add_mesh(frame_index, vertices, ranges);
    }

    Ok(model)
}

fn parse_skin(
    reader: &mut Reader,
    name: String,
    width: usize,
    height: usize,
    flags: MdlFlags,
    palette: &Palette,
) -> Result<Material> {
    let pixel_count = skin_pixel_count(width, height)?;
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(ForgeError::format(format!("MDL skin size {width}x{height} is too large")));
    };

    let group = reader.read_size()?;
    if group == 0 {
        return load_indexed_skin(name, reader, w, h, palette, flags.transparency());
    }

    // Picture times come first, then the pictures themselves.
    let picture_count = reader.read_size()?;
    reader.ensure_count(picture_count, pixel_count + 4)?;
    reader.seek_forward(picture_count * 4)?;
    let material = load_indexed_skin(name, reader, w, h, palette, flags.transparency())?;
    reader.seek_forward(picture_count.saturating_sub(1) * pixel_count)?;
    Ok(material)
}

fn skin_pixel_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or_else(|| ForgeError::format(format!("MDL skin size {width}x{height} is too large")))
}

fn frame_length(vertex_count: usize) -> usize {
    SIMPLE_FRAME_NAME_OFFSET + SIMPLE_FRAME_NAME_LENGTH + vertex_count * 4
}

/// Parses the next frame or frame group and advances `reader` past it.
fn parse_frame(
    reader: &mut Reader,
    geometry: &Geometry<'_>,
) -> Result<(String, Vec<EntityModelVertex>, Aabb)> {
    let frame_length = frame_length(geometry.vertices.len());

    let frame_type = reader.read_i32()?;
    if frame_type == 0 {
        let frame = decode_frame(reader.sub_reader_from_current(frame_length)?, geometry)?;
        reader.seek_forward(frame_length)?;
        return Ok(frame);
    }

    let sub_frame_count = reader.read_size()?;
    reader.ensure_count(sub_frame_count, 4 + frame_length)?;
    reader.seek_backward(4)?;
    let times_length = FRAME_GROUP_HEADER_SIZE + sub_frame_count * 4;
    let frame = decode_frame(
        reader.sub_reader_from_current_at(times_length, frame_length)?,
        geometry,
    )?;
    reader.seek_forward(times_length + sub_frame_count * frame_length)?;
    Ok(frame)
}

fn decode_frame(
    mut reader: Reader,
    geometry: &Geometry<'_>,
) -> Result<(String, Vec<EntityModelVertex>, Aabb)> {
    reader.seek_forward(SIMPLE_FRAME_NAME_OFFSET)?;
    let name = reader.read_string(SIMPLE_FRAME_NAME_LENGTH)?;

    let positions = (0..geometry.vertices.len())
        .map(|_| {
            let packed = reader.read_bytes(4)?;
            Ok(geometry.origin
                + geometry.scale
                    * Vec3::new(f32::from(packed[0]), f32::from(packed[1]), f32::from(packed[2])))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut bounds = AabbBuilder::default();
    bounds.add_all(positions.iter().copied());

    let skin_size = Vec2::new(geometry.skin_width as f32, geometry.skin_height as f32);
    let mut vertices = Vec::with_capacity(geometry.triangles.len() * 3);
    for triangle in geometry.triangles {
        for &index in &triangle.vertices {
            let skin_vertex = geometry.vertices[index];
            let mut uv = Vec2::new(skin_vertex.s as f32, skin_vertex.t as f32) / skin_size;
            if skin_vertex.onseam && !triangle.front {
                uv.x += 0.5;
            }
            vertices.push(EntityModelVertex::new(positions[index], uv));
        }
    }

    Ok((name, vertices, bounds.bounds()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holey_flag_selects_transparency() {
        assert_eq!(
            MdlFlags::from_bits_retain(1 << 14 | 1).transparency(),
            PaletteTransparency::Index255Transparent
        );
        assert_eq!(MdlFlags::ROTATE.transparency(), PaletteTransparency::Opaque);
    }

    #[test]
    fn test_can_load_checks_extension_and_version() {
        let mut bytes = b"IDPO".to_vec();
        bytes.extend(6i32.to_le_bytes());
        assert!(can_load(Path::new("progs/player.MDL"), Reader::from_bytes(bytes.clone())));
        assert!(!can_load(Path::new("progs/player.md2"), Reader::from_bytes(bytes)));

        let mut wrong_version = b"IDPO".to_vec();
        wrong_version.extend(7i32.to_le_bytes());
        assert!(!can_load(Path::new("player.mdl"), Reader::from_bytes(wrong_version)));
    }
}
