//! Quake 3 MD3 models.
//!
//! Unlike the Quake 2 formats, an MD3 file holds several surfaces, each with
//! its own shaders, UVs and per-frame vertex positions. All offsets inside a
//! surface are relative to the start of that surface.

use std::path::Path;

use glam::{Vec2, Vec3};

use crate::assets::skin::{find_skin_with_extensions, load_skin_with};
use crate::assets::Material;
use crate::errors::{ForgeError, Result};
use crate::io::{Reader, has_extension, parse_model_path};
use crate::loaders::{LoadContext, ident};
use crate::model::{
    Aabb, EntityModelData, EntityModelVertex, IndexRangeMapBuilder, Orientation, PitchType,
    PrimType, Size,
};

pub const IDENT: i32 = ident(b"IDP3");
pub const VERSION: i32 = 15;

const NAME_LENGTH: usize = 64;
const FRAME_NAME_LENGTH: usize = 16;
const FRAME_SIZE: usize = 3 * 12 + 4 + FRAME_NAME_LENGTH;
const SHADER_SIZE: usize = NAME_LENGTH + 4;
const TRIANGLE_SIZE: usize = 3 * 4;
const UV_SIZE: usize = 2 * 4;
const VERTEX_SIZE: usize = 4 * 2;
/// Fixed point scale of vertex coordinates.
const VERTEX_SCALE: f32 = 1.0 / 64.0;

#[must_use]
pub fn can_load(path: &Path, mut reader: Reader) -> bool {
    has_extension(path, &["md3"])
        && reader.read_i32().is_ok_and(|i| i == IDENT)
        && reader.read_i32().is_ok_and(|v| v == VERSION)
}

pub fn load(name: &str, mut reader: Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let ident = reader.read_i32()?;
    if ident != IDENT {
        return Err(ForgeError::format(format!("Unknown MD3 model ident: {ident}")));
    }
    let version = reader.read_i32()?;
    if version != VERSION {
        return Err(ForgeError::format(format!("Unknown MD3 model version: {version}")));
    }

    let _name = reader.read_string(NAME_LENGTH)?;
    let _flags = reader.read_i32()?;
    let frame_count = reader.read_size()?;
    let _tag_count = reader.read_size()?;
    let surface_count = reader.read_size()?;
    let _skin_count = reader.read_size()?;
    let frame_offset = reader.read_size()?;
    let _tag_offset = reader.read_size()?;
    let surface_offset = reader.read_size()?;
    let _end_offset = reader.read_size()?;

    let mut model = EntityModelData::new(PitchType::Normal, Orientation::Oriented);

    let mut frames = reader.sub_reader_from_begin(frame_offset, frame_count * FRAME_SIZE)?;
    for _ in 0..frame_count {
        let min = frames.read_vec3()?;
        let max = frames.read_vec3()?;
        let _origin = frames.read_vec3()?;
        let _radius = frames.read_f32()?;
        let frame_name = frames.read_string(FRAME_NAME_LENGTH)?;
        model.add_frame(frame_name, Aabb::new(min, max));
    }

    let mut surface_start = surface_offset;
    for _ in 0..surface_count {
        let surface_reader = reader.sub_reader_from_begin_to_end(surface_start)?;
        surface_start += parse_surface(surface_reader, &mut model, frame_count, ctx)?;
    }

    if model.surface_count() == 0 {
        log::debug!("MD3 model {name} has no surfaces");
    }
    Ok(model)
}

/// Parses one surface and returns its size in bytes.
fn parse_surface(
    mut reader: Reader,
    model: &mut EntityModelData,
    model_frame_count: usize,
    ctx: &LoadContext<'_>,
) -> Result<usize> {
    let ident = reader.read_i32()?;
    if ident != IDENT {
        return Err(ForgeError::format(format!("Unknown MD3 surface ident: {ident}")));
    }
    let surface_name = reader.read_string(NAME_LENGTH)?;
    let _flags = reader.read_i32()?;
    let frame_count = reader.read_size()?;
    let shader_count = reader.read_size()?;
    let vertex_count = reader.read_size()?;
    let triangle_count = reader.read_size()?;
    let triangle_offset = reader.read_size()?;
    let shader_offset = reader.read_size()?;
    let uv_offset = reader.read_size()?;
    let vertex_offset = reader.read_size()?;
    let end_offset = reader.read_size()?;

    if frame_count != model_frame_count {
        return Err(ForgeError::format(format!(
            "MD3 surface '{surface_name}' has {frame_count} frames, but the model has {model_frame_count}"
        )));
    }

    let mut shaders = reader.sub_reader_from_begin(shader_offset, shader_count * SHADER_SIZE)?;
    let mut skins = Vec::with_capacity(shader_count);
    for _ in 0..shader_count {
        let shader_name = shaders.read_string(NAME_LENGTH)?;
        let _shader_index = shaders.read_i32()?;
        skins.push(load_shader(&shader_name, ctx));
    }

    let mut triangle_reader =
        reader.sub_reader_from_begin(triangle_offset, triangle_count * TRIANGLE_SIZE)?;
    let mut triangles = Vec::with_capacity(triangle_count);
    for _ in 0..triangle_count {
        let triangle = [
            triangle_reader.read_size()?,
            triangle_reader.read_size()?,
            triangle_reader.read_size()?,
        ];
        if let Some(&invalid) = triangle.iter().find(|&&i| i >= vertex_count) {
            return Err(ForgeError::format(format!(
                "MD3 surface '{surface_name}' references vertex {invalid}, but has {vertex_count} vertices"
            )));
        }
        triangles.push(triangle);
    }

    let mut uv_reader = reader.sub_reader_from_begin(uv_offset, vertex_count * UV_SIZE)?;
    let uvs = (0..vertex_count)
        .map(|_| uv_reader.read_vec2())
        .collect::<Result<Vec<Vec2>>>()?;

    let positions_size = frame_count
        .checked_mul(vertex_count)
        .and_then(|count| count.checked_mul(VERTEX_SIZE))
        .ok_or_else(|| {
            ForgeError::format(format!(
                "MD3 surface '{surface_name}' has too many vertices: {frame_count} x {vertex_count}"
            ))
        })?;
    let mut position_reader = reader.sub_reader_from_begin(vertex_offset, positions_size)?;

    let surface = model.add_surface(surface_name, frame_count);
    surface.set_skins(skins);

    let mut size = Size::default();
    size.inc(PrimType::Triangles);
    for frame_index in 0..frame_count {
        let positions = (0..vertex_count)
            .map(|_| {
                let x = position_reader.read_i16()?;
                let y = position_reader.read_i16()?;
                let z = position_reader.read_i16()?;
                let _normal = position_reader.read_i16()?;
                Ok(Vec3::new(f32::from(x), f32::from(y), f32::from(z)) * VERTEX_SCALE)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = IndexRangeMapBuilder::new(triangles.len() * 3, &size);
        builder.add_triangles(triangles.iter().flat_map(|&[a, b, c]| {
            [c, b, a].map(|i| EntityModelVertex::new(positions[i], uvs[i]))
        }));
        let (vertices, ranges) = builder.finish();
        surface.add_mesh(frame_index, vertices, ranges);
    }

    Ok(end_offset)
}

fn load_shader(shader_name: &str, ctx: &LoadContext<'_>) -> Material {
    let name = parse_model_path(shader_name);
    let name = name.to_string_lossy();
    match find_skin_with_extensions(&name, ctx.fs, &ctx.settings.skin_extensions) {
        Ok(path) => load_skin_with(&path, ctx.fs, ctx),
        Err(error) => {
            log::warn!("Could not resolve MD3 shader '{name}': {error}");
            Material::default_placeholder(name)
        }
    }
}
