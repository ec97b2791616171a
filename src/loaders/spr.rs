//! Quake and Half-Life SPR sprites.
//!
//! Every frame becomes a textured quad with its own skin. Version 1 sprites
//! are expanded with the configured palette; version 2 sprites carry their
//! own palette after the header.

use std::path::Path;

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

pub const IDENT: i32 = ident(b"IDSP");
pub const VERSION_1: i32 = 1;
pub const VERSION_2: i32 = 2;

const PICTURE_HEADER_SIZE: usize = 4 * 4;

fn is_supported_version(version: i32) -> bool {
    version == VERSION_1 || version == VERSION_2
}

struct Picture {
    skin: Material,
    vertices: [EntityModelVertex; 4],
    bounds: Aabb,
}

#[must_use]
pub fn can_load(path: &Path, mut reader: Reader) -> bool {
    has_extension(path, &["spr"])
        && reader.read_i32().is_ok_and(|i| i == IDENT)
        && reader.read_i32().is_ok_and(is_supported_version)
}

pub fn load(name: &str, mut reader: Reader, ctx: &LoadContext<'_>) -> Result<EntityModelData> {
    let ident = reader.read_i32()?;
    if ident != IDENT {
        return Err(ForgeError::format(format!("Unknown SPR model ident: {ident}")));
    }
    let version = reader.read_i32()?;
    if !is_supported_version(version) {
        return Err(ForgeError::format(format!("Unknown SPR model version: {version}")));
    }

    let sprite_type = reader.read_i32()?;
    let orientation = Orientation::from_sprite_type(sprite_type)
        .ok_or_else(|| ForgeError::format(format!("Unknown SPR sprite type: {sprite_type}")))?;
    if version == VERSION_2 {
        let _texture_format = reader.read_i32()?;
    }
    let _radius = reader.read_f32()?;
    let _max_width = reader.read_size()?;
    let _max_height = reader.read_size()?;
    let frame_count = reader.read_size()?;
    let _beam_length = reader.read_f32()?;
    let _sync_type = reader.read_i32()?;

    let embedded;
    let palette = if version == VERSION_2 {
        let color_count = usize::from(reader.read_u16()?);
        embedded = Palette::from_rgb(reader.read_bytes(color_count * 3)?)?;
        &embedded
    } else {
        ctx.require_palette("SPR")?
    };

    let mut model = EntityModelData::new(PitchType::Normal, orientation);
    reader.ensure_count(frame_count, 4 + PICTURE_HEADER_SIZE)?;
    let mut pictures = Vec::with_capacity(frame_count);
    for frame_index in 0..frame_count {
        let picture = parse_frame(&mut reader, &format!("{name}_{frame_index}"), palette)?;
        model.add_frame(frame_index.to_string(), picture.bounds);
        pictures.push(picture);
    }

    let surface = model.add_surface(name, frame_count);
    let mut size = Size::default();
    size.inc(PrimType::Quads);
    let mut skins = Vec::with_capacity(pictures.len());
    for (frame_index, picture) in pictures.into_iter().enumerate() {
        let [v0, v1, v2, v3] = picture.vertices;
        let mut builder = IndexRangeMapBuilder::new(4, &size);
        builder.add_quad(v0, v1, v2, v3);
        let (vertices, ranges) = builder.finish();
        surface.add_mesh(frame_index, vertices, ranges);
        skins.push(picture.skin);
    }
    surface.set_skins(skins);

    Ok(model)
}

/// Parses a single picture or a picture group. Groups keep only their first picture.
fn parse_frame(reader: &mut Reader, skin_name: &str, palette: &Palette) -> Result<Picture> {
    let frame_type = reader.read_i32()?;
    if frame_type == 0 {
        return parse_picture(reader, skin_name, palette);
    }

    let picture_count = reader.read_size()?;
    reader.ensure_count(picture_count, 4 + PICTURE_HEADER_SIZE)?;
    reader.seek_forward(picture_count * 4)?;
    let picture = parse_picture(reader, skin_name, palette)?;
    for _ in 1..picture_count {
        skip_picture(reader)?;
    }
    Ok(picture)
}

fn parse_picture(reader: &mut Reader, skin_name: &str, palette: &Palette) -> Result<Picture> {
    let origin_x = reader.read_i32()?;
    let origin_y = reader.read_i32()?;
    let width = reader.read_i32()?;
    let height = reader.read_i32()?;
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(ForgeError::format(format!("Invalid SPR picture size {width}x{height}")));
    };

    let skin = load_indexed_skin(
        skin_name,
        reader,
        w,
        h,
        palette,
        PaletteTransparency::Index255Transparent,
    )?;

    let x1 = origin_x as f32;
    let y1 = origin_y as f32 - height as f32;
    let x2 = x1 + width as f32;
    let y2 = origin_y as f32;

    let vertices = [
        EntityModelVertex::new(Vec3::new(x1, y1, 0.0), Vec2::new(0.0, 1.0)),
        EntityModelVertex::new(Vec3::new(x1, y2, 0.0), Vec2::new(0.0, 0.0)),
        EntityModelVertex::new(Vec3::new(x2, y2, 0.0), Vec2::new(1.0, 0.0)),
        EntityModelVertex::new(Vec3::new(x2, y1, 0.0), Vec2::new(1.0, 1.0)),
    ];
    let mut bounds = AabbBuilder::default();
    bounds.add_all(vertices.iter().map(|v| v.position));

    Ok(Picture {
        skin,
        vertices,
        bounds: bounds.bounds(),
    })
}

fn skip_picture(reader: &mut Reader) -> Result<()> {
    let mut header = reader.sub_reader_from_current(PICTURE_HEADER_SIZE)?;
    header.seek_forward(8)?;
    let width = header.read_size()?;
    let height = header.read_size()?;
    let pixel_count = width
        .checked_mul(height)
        .ok_or_else(|| ForgeError::format(format!("Invalid SPR picture size {width}x{height}")))?;
    reader.seek_forward(PICTURE_HEADER_SIZE + pixel_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFileSystem;
    use crate::settings::LoaderSettings;

    fn sprite_v2(frames: &[(i32, i32, i32, i32)]) -> Vec<u8> {
        let mut bytes = b"IDSP".to_vec();
        bytes.extend(2i32.to_le_bytes());
        bytes.extend(2i32.to_le_bytes()); // ViewPlaneParallel
        bytes.extend(0i32.to_le_bytes());
        bytes.extend(8.0f32.to_le_bytes());
        bytes.extend(4i32.to_le_bytes());
        bytes.extend(4i32.to_le_bytes());
        bytes.extend((frames.len() as i32).to_le_bytes());
        bytes.extend(0.0f32.to_le_bytes());
        bytes.extend(0i32.to_le_bytes());
        bytes.extend(256u16.to_le_bytes());
        bytes.extend((0..256).flat_map(|i| [i as u8, 0, 0]));
        for &(x, y, w, h) in frames {
            bytes.extend(0i32.to_le_bytes());
            for value in [x, y, w, h] {
                bytes.extend(value.to_le_bytes());
            }
            bytes.extend(vec![1u8; (w * h) as usize]);
        }
        bytes
    }

    #[test]
    fn test_quad_placed_relative_to_origin() {
        let fs = MemoryFileSystem::new();
        let settings = LoaderSettings::default();
        let ctx = LoadContext::new(&fs, None, &settings);

        let model = load("s.spr", Reader::from_bytes(sprite_v2(&[(-2, 3, 4, 2)])), &ctx).unwrap();

        assert_eq!(model.orientation(), Orientation::ViewPlaneParallel);
        assert_eq!(model.frame_count(), 1);
        let bounds = model.frames()[0].bounds;
        assert_eq!(bounds.min, Vec3::new(-2.0, 1.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 3.0, 0.0));

        let surface = &model.surfaces()[0];
        assert_eq!(surface.skin_count(), 1);
        assert_eq!(surface.skins()[0].size(), Some((4, 2)));
        assert_eq!(surface.mesh(0).unwrap().vertices.len(), 4);
    }

    #[test]
    fn test_version_1_requires_palette() {
        let mut bytes = sprite_v2(&[]);
        bytes[4] = 1;
        let fs = MemoryFileSystem::new();
        let settings = LoaderSettings::default();
        let ctx = LoadContext::new(&fs, None, &settings);
        assert!(matches!(
            load("s.spr", Reader::from_bytes(bytes), &ctx),
            Err(ForgeError::Palette(_))
        ));
    }
}
